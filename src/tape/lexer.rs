use std::sync::OnceLock;

use crate::tape::error::{ParseError, ParseResult};
use crate::tape::token::{Token, TokenKind, KEYWORDS};

const DURATION_UNITS: &[&str] = &["ms", "s", "m", "h"];

/// Result of one matcher at the current position.
struct Scanned {
    kind: TokenKind,
    literal: String,
    len: usize,
}

type Matcher = fn(&[char]) -> Result<Option<Scanned>, String>;

/// Tried in order at every position; the first hit wins. Keywords come before
/// identifiers and only match when followed by a delimiter.
const MATCHERS: &[Matcher] = &[
    match_string,
    match_regex,
    match_json,
    match_duration,
    match_number,
    match_operator,
    match_boolean,
    match_keyword,
    match_identifier,
];

pub fn tokenize(source: &str) -> ParseResult<Vec<Token>> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn run(mut self) -> ParseResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            if self.pos >= self.chars.len() {
                tokens.push(Token::new(TokenKind::Eof, "", self.line, self.column));
                return Ok(tokens);
            }

            let rest = &self.chars[self.pos..];
            let (line, column) = (self.line, self.column);
            let mut scanned = None;
            for matcher in MATCHERS {
                match matcher(rest) {
                    Ok(Some(hit)) => {
                        scanned = Some(hit);
                        break;
                    }
                    Ok(None) => {}
                    Err(message) => return Err(ParseError::lex(message, line, column)),
                }
            }

            let Some(scanned) = scanned else {
                return Err(ParseError::lex(
                    format!("unexpected character '{}'", rest[0]),
                    line,
                    column,
                ));
            };
            self.advance(scanned.len);
            tokens.push(Token::new(scanned.kind, scanned.literal, line, column));
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(&ch) = self.chars.get(self.pos) {
            if ch == '#' {
                while let Some(&next) = self.chars.get(self.pos) {
                    if next == '\n' {
                        break;
                    }
                    self.advance(1);
                }
            } else if ch.is_whitespace() {
                self.advance(1);
            } else {
                break;
            }
        }
    }

    fn advance(&mut self, count: usize) {
        for _ in 0..count {
            let Some(&ch) = self.chars.get(self.pos) else {
                return;
            };
            self.pos += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

pub fn is_identifier_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-' | '/')
}

fn is_delimiter(next: Option<&char>) -> bool {
    next.map_or(true, |ch| !is_identifier_char(*ch))
}

fn starts_with(rest: &[char], word: &str) -> bool {
    let mut index = 0;
    for expected in word.chars() {
        if rest.get(index) != Some(&expected) {
            return false;
        }
        index += 1;
    }
    true
}

fn match_string(rest: &[char]) -> Result<Option<Scanned>, String> {
    let quote = rest[0];
    if !matches!(quote, '"' | '\'' | '`') {
        return Ok(None);
    }

    let mut literal = String::new();
    let mut index = 1;
    while let Some(&ch) = rest.get(index) {
        if ch == quote {
            return Ok(Some(Scanned {
                kind: TokenKind::String,
                literal,
                len: index + 1,
            }));
        }
        if ch == '\\' && quote == '"' {
            let Some(&escaped) = rest.get(index + 1) else {
                break;
            };
            match escaped {
                'n' => literal.push('\n'),
                't' => literal.push('\t'),
                'r' => literal.push('\r'),
                '\\' => literal.push('\\'),
                '"' => literal.push('"'),
                // Unknown escapes stay verbatim so Windows paths survive.
                other => {
                    literal.push('\\');
                    literal.push(other);
                }
            }
            index += 2;
            continue;
        }
        literal.push(ch);
        index += 1;
    }
    Err("unterminated string literal".to_owned())
}

/// `/.../` followed by a delimiter. A slash-led word such as `/tmp/demo.gif`
/// is left to the identifier matcher as a path.
fn match_regex(rest: &[char]) -> Result<Option<Scanned>, String> {
    if rest[0] != '/' {
        return Ok(None);
    }
    let mut index = 1;
    while let Some(&ch) = rest.get(index) {
        if ch == '/' {
            if !is_delimiter(rest.get(index + 1)) {
                return Ok(None);
            }
            return Ok(Some(Scanned {
                kind: TokenKind::Regex,
                literal: rest[1..index].iter().collect(),
                len: index + 1,
            }));
        }
        if ch == '\n' {
            break;
        }
        index += 1;
    }
    if is_path_word(rest) {
        return Ok(None);
    }
    Err("unterminated regex literal".to_owned())
}

fn is_path_word(rest: &[char]) -> bool {
    rest.iter()
        .take_while(|ch| !ch.is_whitespace())
        .all(|ch| is_identifier_char(*ch))
}

fn match_json(rest: &[char]) -> Result<Option<Scanned>, String> {
    if rest[0] != '{' {
        return Ok(None);
    }
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;
    for (index, &ch) in rest.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(Some(Scanned {
                        kind: TokenKind::Json,
                        literal: rest[..=index].iter().collect(),
                        len: index + 1,
                    }));
                }
            }
            _ => {}
        }
    }
    Err("unterminated json object".to_owned())
}

/// Length of a decimal number (`12`, `1.5`) at the start of `rest`.
fn scan_number(rest: &[char]) -> usize {
    let mut index = 0;
    while rest.get(index).is_some_and(char::is_ascii_digit) {
        index += 1;
    }
    if index > 0
        && rest.get(index) == Some(&'.')
        && rest.get(index + 1).is_some_and(char::is_ascii_digit)
    {
        index += 1;
        while rest.get(index).is_some_and(char::is_ascii_digit) {
            index += 1;
        }
    }
    index
}

fn match_duration(rest: &[char]) -> Result<Option<Scanned>, String> {
    let number_len = scan_number(rest);
    if number_len == 0 {
        return Ok(None);
    }
    let tail = &rest[number_len..];
    for unit in DURATION_UNITS {
        let unit_len = unit.len();
        if starts_with(tail, unit) && is_delimiter(tail.get(unit_len)) {
            let len = number_len + unit_len;
            return Ok(Some(Scanned {
                kind: TokenKind::Duration,
                literal: rest[..len].iter().collect(),
                len,
            }));
        }
    }
    Ok(None)
}

fn match_number(rest: &[char]) -> Result<Option<Scanned>, String> {
    let sign = usize::from(rest[0] == '-');
    let digits = scan_number(&rest[sign..]);
    if digits == 0 {
        return Ok(None);
    }
    let len = sign + digits;
    if !is_delimiter(rest.get(len)) {
        let mut end = len;
        while rest.get(end).is_some_and(|ch| is_identifier_char(*ch)) {
            end += 1;
        }
        let text: String = rest[..end].iter().collect();
        return Err(format!(
            "invalid number or duration '{text}' (duration units are ms, s, m, h)"
        ));
    }
    Ok(Some(Scanned {
        kind: TokenKind::Number,
        literal: rest[..len].iter().collect(),
        len,
    }))
}

fn match_operator(rest: &[char]) -> Result<Option<Scanned>, String> {
    let kind = match rest[0] {
        '@' => TokenKind::At,
        '+' => TokenKind::Plus,
        _ => return Ok(None),
    };
    Ok(Some(Scanned {
        kind,
        literal: rest[0].to_string(),
        len: 1,
    }))
}

fn match_boolean(rest: &[char]) -> Result<Option<Scanned>, String> {
    for word in ["true", "false"] {
        if starts_with(rest, word) && is_delimiter(rest.get(word.len())) {
            return Ok(Some(Scanned {
                kind: TokenKind::Boolean,
                literal: word.to_owned(),
                len: word.len(),
            }));
        }
    }
    Ok(None)
}

fn keywords_longest_first() -> &'static [(&'static str, TokenKind)] {
    static SORTED: OnceLock<Vec<(&'static str, TokenKind)>> = OnceLock::new();
    SORTED.get_or_init(|| {
        let mut sorted = KEYWORDS.to_vec();
        sorted.sort_by(|left, right| right.0.len().cmp(&left.0.len()));
        sorted
    })
}

fn match_keyword(rest: &[char]) -> Result<Option<Scanned>, String> {
    for (word, kind) in keywords_longest_first() {
        if starts_with(rest, word) && is_delimiter(rest.get(word.len())) {
            return Ok(Some(Scanned {
                kind: *kind,
                literal: (*word).to_owned(),
                len: word.len(),
            }));
        }
    }
    Ok(None)
}

fn match_identifier(rest: &[char]) -> Result<Option<Scanned>, String> {
    let first = rest[0];
    if !(first.is_ascii_alphabetic() || matches!(first, '_' | '/' | '.')) {
        return Ok(None);
    }
    let mut len = 1;
    while rest.get(len).is_some_and(|ch| is_identifier_char(*ch)) {
        len += 1;
    }
    Ok(Some(Scanned {
        kind: TokenKind::Identifier,
        literal: rest[..len].iter().collect(),
        len,
    }))
}

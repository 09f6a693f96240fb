use std::time::Duration;

use crate::tape::command::{Command, Modifier, Statement, WaitScope};
use crate::tape::error::{ParseError, ParseResult};
use crate::tape::lexer::tokenize;
use crate::tape::token::{Token, TokenKind};
use crate::tape::validate::validate_statements;
use crate::tape::Tape;

/// Tokenizes, parses and validates a tape source.
pub fn parse(source: &str) -> ParseResult<Tape> {
    let tokens = tokenize(source)?;
    let statements = Parser::new(tokens).parse_statements()?;
    validate_statements(&statements)?;
    Ok(Tape { statements })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse_statements(mut self) -> ParseResult<Vec<Statement>> {
        let mut statements = Vec::new();
        while self.peek().kind != TokenKind::Eof {
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    fn peek(&self) -> &Token {
        // The token stream always ends with Eof.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.peek().kind == kind {
            Some(self.next())
        } else {
            None
        }
    }

    fn expect_one_of(&mut self, kinds: &[TokenKind], what: &str) -> ParseResult<Token> {
        let token = self.peek();
        if kinds.contains(&token.kind) {
            return Ok(self.next());
        }
        Err(ParseError::syntax(
            format!("expected {what}, found {token}"),
            token.line,
            token.column,
        ))
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let head = self.next();
        let command = match head.kind {
            TokenKind::Set => self.parse_set()?,
            TokenKind::Output => Command::Output {
                path: self.parse_path("an output path")?,
            },
            TokenKind::Require => Command::Require {
                program: self.parse_path("a program name")?,
            },
            TokenKind::Source => Command::Source {
                path: self.parse_path("a tape path")?,
            },
            TokenKind::Env => self.parse_env()?,
            TokenKind::Type => self.parse_type()?,
            TokenKind::Key => self.parse_key(head.literal.clone())?,
            TokenKind::Modifier => self.parse_modifier(&head)?,
            TokenKind::Sleep => self.parse_sleep()?,
            TokenKind::Wait => self.parse_wait()?,
            TokenKind::Exec => Command::Exec {
                command: self
                    .expect_one_of(&[TokenKind::String], "a command string after Exec")?
                    .literal,
            },
            TokenKind::Hide => Command::Hide,
            TokenKind::Show => Command::Show,
            TokenKind::Paste => Command::Paste,
            TokenKind::Screenshot => Command::Screenshot {
                path: self.parse_path("a screenshot path")?,
            },
            TokenKind::Copy => Command::Copy {
                text: self
                    .expect_one_of(&[TokenKind::String], "a string after Copy")?
                    .literal,
            },
            _ => {
                return Err(ParseError::syntax(
                    format!("expected a command, found {head}"),
                    head.line,
                    head.column,
                ))
            }
        };
        Ok(Statement {
            command,
            line: head.line,
            column: head.column,
        })
    }

    fn parse_set(&mut self) -> ParseResult<Command> {
        let name = self.expect_one_of(&[TokenKind::Identifier], "a setting name after Set")?;
        let value = self.expect_one_of(
            &[
                TokenKind::String,
                TokenKind::Number,
                TokenKind::Duration,
                TokenKind::Boolean,
                TokenKind::Identifier,
                TokenKind::Json,
                TokenKind::Regex,
            ],
            &format!("a value for setting {}", name.literal),
        )?;
        Ok(Command::Set {
            name: name.literal,
            value: value.literal,
        })
    }

    fn parse_path(&mut self, what: &str) -> ParseResult<String> {
        Ok(self
            .expect_one_of(&[TokenKind::String, TokenKind::Identifier], what)?
            .literal)
    }

    fn parse_env(&mut self) -> ParseResult<Command> {
        let key = self.expect_one_of(&[TokenKind::Identifier], "a variable name after Env")?;
        let value = self.expect_one_of(
            &[
                TokenKind::String,
                TokenKind::Identifier,
                TokenKind::Number,
                TokenKind::Boolean,
            ],
            &format!("a value for variable {}", key.literal),
        )?;
        Ok(Command::Env {
            key: key.literal,
            value: value.literal,
        })
    }

    /// Optional `@<duration>` suffix.
    fn parse_speed(&mut self) -> ParseResult<Option<Duration>> {
        if self.eat(TokenKind::At).is_none() {
            return Ok(None);
        }
        let token = self.expect_one_of(&[TokenKind::Duration], "a duration after '@'")?;
        duration_from_token(&token).map(Some)
    }

    fn parse_type(&mut self) -> ParseResult<Command> {
        let speed = self.parse_speed()?;
        let first = self.expect_one_of(&[TokenKind::String], "a string after Type")?;
        let mut text = first.literal;
        while let Some(more) = self.eat(TokenKind::String) {
            text.push_str(&more.literal);
        }
        Ok(Command::Type { text, speed })
    }

    fn parse_key(&mut self, key: String) -> ParseResult<Command> {
        let speed = self.parse_speed()?;
        let repeat = match self.eat(TokenKind::Number) {
            Some(token) => match token.literal.parse::<u32>() {
                Ok(count) if count > 0 => count,
                _ => {
                    return Err(ParseError::syntax(
                        format!("repeat count for {key} must be a positive integer"),
                        token.line,
                        token.column,
                    ))
                }
            },
            None => 1,
        };
        Ok(Command::Key { key, speed, repeat })
    }

    fn parse_modifier(&mut self, head: &Token) -> ParseResult<Command> {
        let mut modifiers = vec![modifier_from_token(head)?];
        loop {
            self.expect_one_of(&[TokenKind::Plus], "'+' after modifier")?;
            let token = self.expect_one_of(
                &[
                    TokenKind::Modifier,
                    TokenKind::Key,
                    TokenKind::Identifier,
                    TokenKind::Number,
                    TokenKind::String,
                ],
                "a key after '+'",
            )?;
            if token.kind == TokenKind::Modifier {
                modifiers.push(modifier_from_token(&token)?);
                continue;
            }
            return Ok(Command::Modifier {
                modifiers,
                key: token.literal,
            });
        }
    }

    fn parse_sleep(&mut self) -> ParseResult<Command> {
        let token = self.expect_one_of(
            &[TokenKind::Duration, TokenKind::Number],
            "a duration after Sleep",
        )?;
        Ok(Command::Sleep {
            duration: duration_from_token(&token)?,
        })
    }

    fn parse_wait(&mut self) -> ParseResult<Command> {
        let mut scope = WaitScope::Line;
        if self.eat(TokenKind::Plus).is_some() {
            let token = self.expect_one_of(&[TokenKind::Scope], "Line or Screen after 'Wait+'")?;
            scope = WaitScope::from_keyword(&token.literal).ok_or_else(|| {
                ParseError::syntax(
                    format!("unknown wait scope '{}'", token.literal),
                    token.line,
                    token.column,
                )
            })?;
        }
        let timeout = self.parse_speed()?;
        let pattern = self.eat(TokenKind::Regex).map(|token| token.literal);
        Ok(Command::Wait {
            scope,
            timeout,
            pattern,
        })
    }
}

fn modifier_from_token(token: &Token) -> ParseResult<Modifier> {
    Modifier::from_keyword(&token.literal).ok_or_else(|| {
        ParseError::syntax(
            format!("unknown modifier '{}'", token.literal),
            token.line,
            token.column,
        )
    })
}

fn duration_from_token(token: &Token) -> ParseResult<Duration> {
    let parsed = match token.kind {
        TokenKind::Duration => parse_duration_literal(&token.literal),
        TokenKind::Number => parse_seconds(&token.literal),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ParseError::syntax(
            format!("invalid duration '{}'", token.literal),
            token.line,
            token.column,
        )
    })
}

/// Parses `500ms`, `1.5s`, `2m` or `1h`.
pub fn parse_duration_literal(text: &str) -> Option<Duration> {
    let split = text.find(|ch: char| ch.is_ascii_alphabetic())?;
    let (number, unit) = text.split_at(split);
    let value = number.parse::<f64>().ok()?;
    let seconds = match unit {
        "ms" => value / 1000.0,
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        _ => return None,
    };
    duration_from_seconds(seconds)
}

/// A bare number is read as seconds.
pub fn parse_seconds(text: &str) -> Option<Duration> {
    duration_from_seconds(text.parse::<f64>().ok()?)
}

// Rounded to the nanosecond so `10ms` is exactly ten milliseconds.
fn duration_from_seconds(seconds: f64) -> Option<Duration> {
    let nanos = (seconds * 1e9).round();
    if !nanos.is_finite() || nanos < 0.0 || nanos >= u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(nanos as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::error::ParseErrorKind;

    fn commands(source: &str) -> Vec<Command> {
        parse(source)
            .expect("tape should parse")
            .statements
            .into_iter()
            .map(|statement| statement.command)
            .collect()
    }

    #[test]
    fn type_enter_sleep_in_order() {
        assert_eq!(
            commands("Type \"echo hi\"\nEnter\nSleep 1s"),
            vec![
                Command::Type {
                    text: "echo hi".to_owned(),
                    speed: None
                },
                Command::Key {
                    key: "Enter".to_owned(),
                    speed: None,
                    repeat: 1
                },
                Command::Sleep {
                    duration: Duration::from_secs(1)
                },
            ]
        );
    }

    #[test]
    fn wait_with_scope_timeout_and_pattern() {
        assert_eq!(
            commands("Wait+Line@10ms /pattern/"),
            vec![Command::Wait {
                scope: WaitScope::Line,
                timeout: Some(Duration::from_millis(10)),
                pattern: Some("pattern".to_owned()),
            }]
        );
    }

    #[test]
    fn bare_wait_defaults_to_line_scope() {
        assert_eq!(
            commands("Wait+Screen\nWait"),
            vec![
                Command::Wait {
                    scope: WaitScope::Screen,
                    timeout: None,
                    pattern: None
                },
                Command::Wait {
                    scope: WaitScope::Line,
                    timeout: None,
                    pattern: None
                },
            ]
        );
    }

    #[test]
    fn minute_duration_is_two_minutes() {
        assert_eq!(
            commands("Sleep 2m"),
            vec![Command::Sleep {
                duration: Duration::from_secs(120)
            }]
        );
    }

    #[test]
    fn bare_sleep_number_is_seconds() {
        assert_eq!(
            commands("Sleep 0.5"),
            vec![Command::Sleep {
                duration: Duration::from_millis(500)
            }]
        );
    }

    #[test]
    fn key_speed_and_repeat() {
        assert_eq!(
            commands("Backspace@100ms 3\nEnd"),
            vec![
                Command::Key {
                    key: "Backspace".to_owned(),
                    speed: Some(Duration::from_millis(100)),
                    repeat: 3
                },
                Command::Key {
                    key: "End".to_owned(),
                    speed: None,
                    repeat: 1
                },
            ]
        );
    }

    #[test]
    fn zero_repeat_is_rejected() {
        let error = parse("Enter 0").expect_err("should fail");
        assert_eq!(error.kind, ParseErrorKind::Syntax);
        assert_eq!(error.column, 7);
    }

    #[test]
    fn modifier_combos() {
        assert_eq!(
            commands("Ctrl+C\nCtrl+Shift+Enter"),
            vec![
                Command::Modifier {
                    modifiers: vec![Modifier::Ctrl],
                    key: "C".to_owned()
                },
                Command::Modifier {
                    modifiers: vec![Modifier::Ctrl, Modifier::Shift],
                    key: "Enter".to_owned()
                },
            ]
        );
    }

    #[test]
    fn dangling_modifier_is_an_error() {
        let error = parse("Ctrl+Alt").expect_err("should fail");
        assert!(error.message.contains("'+'"));
    }

    #[test]
    fn type_with_speed_concatenates_strings() {
        assert_eq!(
            commands("Type@20ms \"ls\" ' -la'"),
            vec![Command::Type {
                text: "ls -la".to_owned(),
                speed: Some(Duration::from_millis(20))
            }]
        );
    }

    #[test]
    fn configuration_commands() {
        assert_eq!(
            commands(
                "Output demo.gif\nRequire git\nSet Theme { \"name\": \"x\" }\nEnv GREETING \"hi there\"\nSource 'base.tape'"
            ),
            vec![
                Command::Output {
                    path: "demo.gif".to_owned()
                },
                Command::Require {
                    program: "git".to_owned()
                },
                Command::Set {
                    name: "Theme".to_owned(),
                    value: "{ \"name\": \"x\" }".to_owned()
                },
                Command::Env {
                    key: "GREETING".to_owned(),
                    value: "hi there".to_owned()
                },
                Command::Source {
                    path: "base.tape".to_owned()
                },
            ]
        );
    }

    #[test]
    fn actions_without_arguments_and_with_strings() {
        assert_eq!(
            commands("Hide\nExec \"git status\"\nShow\nCopy \"x\"\nPaste\nScreenshot shot.png"),
            vec![
                Command::Hide,
                Command::Exec {
                    command: "git status".to_owned()
                },
                Command::Show,
                Command::Copy {
                    text: "x".to_owned()
                },
                Command::Paste,
                Command::Screenshot {
                    path: "shot.png".to_owned()
                },
            ]
        );
    }

    #[test]
    fn statement_must_start_with_command() {
        let error = parse("Hide\n\"stray\"").expect_err("should fail");
        assert_eq!((error.line, error.column), (2, 1));
        assert!(error.message.contains("expected a command"));
    }

    #[test]
    fn missing_argument_reports_eof() {
        let error = parse("Type").expect_err("should fail");
        assert!(error.message.contains("end of file"));
    }

    #[test]
    fn statements_record_positions() {
        let tape = parse("  Hide\n\n\tShow").expect("parse");
        assert_eq!((tape.statements[0].line, tape.statements[0].column), (1, 3));
        assert_eq!((tape.statements[1].line, tape.statements[1].column), (3, 2));
    }

    #[test]
    fn duration_literals() {
        assert_eq!(parse_duration_literal("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration_literal("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration_literal("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration_literal("3d"), None);
    }
}

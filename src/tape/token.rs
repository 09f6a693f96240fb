use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    // Configuration commands
    Set,
    Output,
    Require,
    Source,
    Env,

    // Action commands
    Type,
    Sleep,
    Wait,
    Exec,
    Hide,
    Show,
    Screenshot,
    Copy,
    Paste,

    // Keyword categories; the literal carries the exact name.
    Key,
    Modifier,
    Scope,

    // Literals
    String,
    Number,
    Duration,
    Regex,
    Boolean,
    Json,

    // Operators
    At,
    Plus,

    Identifier,
    Eof,
}

impl TokenKind {
    pub fn is_configuration(self) -> bool {
        matches!(
            self,
            Self::Set | Self::Output | Self::Require | Self::Source | Self::Env
        )
    }

    pub fn starts_statement(self) -> bool {
        self.is_configuration()
            || matches!(
                self,
                Self::Type
                    | Self::Sleep
                    | Self::Wait
                    | Self::Exec
                    | Self::Hide
                    | Self::Show
                    | Self::Screenshot
                    | Self::Copy
                    | Self::Paste
                    | Self::Key
                    | Self::Modifier
            )
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Set => "Set",
            Self::Output => "Output",
            Self::Require => "Require",
            Self::Source => "Source",
            Self::Env => "Env",
            Self::Type => "Type",
            Self::Sleep => "Sleep",
            Self::Wait => "Wait",
            Self::Exec => "Exec",
            Self::Hide => "Hide",
            Self::Show => "Show",
            Self::Screenshot => "Screenshot",
            Self::Copy => "Copy",
            Self::Paste => "Paste",
            Self::Key => "key",
            Self::Modifier => "modifier",
            Self::Scope => "wait scope",
            Self::String => "string",
            Self::Number => "number",
            Self::Duration => "duration",
            Self::Regex => "regex",
            Self::Boolean => "boolean",
            Self::Json => "json",
            Self::At => "'@'",
            Self::Plus => "'+'",
            Self::Identifier => "identifier",
            Self::Eof => "end of file",
        }
    }
}

/// Keywords that must be followed by a delimiter, with the kind they produce.
pub const KEYWORDS: &[(&str, TokenKind)] = &[
    ("Set", TokenKind::Set),
    ("Output", TokenKind::Output),
    ("Require", TokenKind::Require),
    ("Source", TokenKind::Source),
    ("Env", TokenKind::Env),
    ("Type", TokenKind::Type),
    ("Sleep", TokenKind::Sleep),
    ("Wait", TokenKind::Wait),
    ("Exec", TokenKind::Exec),
    ("Hide", TokenKind::Hide),
    ("Show", TokenKind::Show),
    ("Screenshot", TokenKind::Screenshot),
    ("Copy", TokenKind::Copy),
    ("Paste", TokenKind::Paste),
    ("Backspace", TokenKind::Key),
    ("Delete", TokenKind::Key),
    ("Insert", TokenKind::Key),
    ("Enter", TokenKind::Key),
    ("Escape", TokenKind::Key),
    ("Tab", TokenKind::Key),
    ("Space", TokenKind::Key),
    ("Up", TokenKind::Key),
    ("Down", TokenKind::Key),
    ("Left", TokenKind::Key),
    ("Right", TokenKind::Key),
    ("PageUp", TokenKind::Key),
    ("PageDown", TokenKind::Key),
    ("ScrollUp", TokenKind::Key),
    ("ScrollDown", TokenKind::Key),
    ("Home", TokenKind::Key),
    ("End", TokenKind::Key),
    ("Ctrl", TokenKind::Modifier),
    ("Alt", TokenKind::Modifier),
    ("Shift", TokenKind::Modifier),
    ("Screen", TokenKind::Scope),
    ("Line", TokenKind::Scope),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text for keywords and numbers, unescaped contents for strings,
    /// pattern body for regexes.
    pub literal: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            literal: literal.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "end of file"),
            TokenKind::String => write!(f, "string {:?}", self.literal),
            TokenKind::Regex => write!(f, "regex /{}/", self.literal),
            _ => write!(f, "'{}'", self.literal),
        }
    }
}

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    Lex,
    Syntax,
    Duplicate,
    Ordering,
}

/// A tokenizer, parser or validation failure, positioned at the offending line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            line,
            column,
        }
    }

    pub fn lex(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(ParseErrorKind::Lex, message, line, column)
    }

    pub fn syntax(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(ParseErrorKind::Syntax, message, line, column)
    }

    /// Stable machine-readable code for JSON error envelopes.
    pub fn code(&self) -> &'static str {
        match self.kind {
            ParseErrorKind::Lex => "E_TAPE_LEX",
            ParseErrorKind::Syntax => "E_TAPE_SYNTAX",
            ParseErrorKind::Duplicate => "E_TAPE_DUPLICATE_SETTING",
            ParseErrorKind::Ordering => "E_TAPE_SETTING_ORDER",
        }
    }
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;

use anyhow::Error;
use serde::Serialize;

use crate::tape::ParseError;

/// Code for failures that carry no typed error (I/O, options, requirements).
pub const GENERIC_ERROR_CODE: &str = "E_TAPE_INVALID";

/// Exit status for a tape that failed to tokenize, parse or validate.
pub const EXIT_PARSE_ERROR: u8 = 2;
pub const EXIT_FAILURE: u8 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorEnvelopeBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelopeBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    /// The full context chain, outermost first.
    pub causes: Vec<String>,
}

pub fn find_parse_error(error: &Error) -> Option<&ParseError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<ParseError>())
}

pub fn envelope(error: &Error) -> ErrorEnvelope {
    let causes = error.chain().map(ToString::to_string).collect();
    let body = match find_parse_error(error) {
        Some(parse_error) => ErrorEnvelopeBody {
            code: parse_error.code().to_owned(),
            message: parse_error.message.clone(),
            line: Some(parse_error.line),
            column: Some(parse_error.column),
            causes,
        },
        None => ErrorEnvelopeBody {
            code: GENERIC_ERROR_CODE.to_owned(),
            message: error.to_string(),
            line: None,
            column: None,
            causes,
        },
    };
    ErrorEnvelope {
        ok: false,
        error: body,
    }
}

pub fn exit_code(error: &Error) -> u8 {
    if find_parse_error(error).is_some() {
        EXIT_PARSE_ERROR
    } else {
        EXIT_FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn parse_error_is_found_behind_context() {
        let error = Err::<(), _>(ParseError::lex("unterminated string", 3, 7))
            .context("failed to parse tape demo.tape")
            .expect_err("error");
        let envelope = envelope(&error);
        assert_eq!(envelope.error.code, "E_TAPE_LEX");
        assert_eq!(envelope.error.line, Some(3));
        assert_eq!(envelope.error.column, Some(7));
        assert_eq!(envelope.error.causes.len(), 2);
        assert_eq!(exit_code(&error), EXIT_PARSE_ERROR);
    }

    #[test]
    fn untyped_error_uses_generic_code() {
        let error = anyhow::anyhow!("required program 'ttyd' was not found on PATH");
        let json = serde_json::to_value(envelope(&error)).expect("json");
        assert_eq!(json["ok"], serde_json::Value::Bool(false));
        assert_eq!(json["error"]["code"], "E_TAPE_INVALID");
        assert!(json["error"].get("line").is_none());
        assert_eq!(exit_code(&error), EXIT_FAILURE);
    }
}

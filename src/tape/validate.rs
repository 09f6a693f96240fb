use std::collections::HashMap;

use crate::tape::command::{Command, Statement};
use crate::tape::error::{ParseError, ParseErrorKind, ParseResult};

/// File-level rules checked after the flat command list is built. Each pass
/// stops at the first violation.
pub fn validate_statements(statements: &[Statement]) -> ParseResult<()> {
    ensure_unique_settings(statements)?;
    ensure_settings_precede_actions(statements)?;
    Ok(())
}

fn ensure_unique_settings(statements: &[Statement]) -> ParseResult<()> {
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    for statement in statements {
        let Command::Set { name, .. } = &statement.command else {
            continue;
        };
        let key = name.to_ascii_lowercase();
        if let Some(first_line) = first_seen.get(&key) {
            return Err(ParseError::new(
                ParseErrorKind::Duplicate,
                format!("setting {name} is already set on line {first_line}"),
                statement.line,
                statement.column,
            ));
        }
        first_seen.insert(key, statement.line);
    }
    Ok(())
}

fn ensure_settings_precede_actions(statements: &[Statement]) -> ParseResult<()> {
    let mut first_action: Option<&Statement> = None;
    for statement in statements {
        if let Command::Set { name, .. } = &statement.command {
            if let Some(action) = first_action {
                return Err(ParseError::new(
                    ParseErrorKind::Ordering,
                    format!(
                        "Set {name} must come before the first action ({} on line {})",
                        action.command.verb(),
                        action.line
                    ),
                    statement.line,
                    statement.column,
                ));
            }
        } else if !statement.command.is_configuration() && first_action.is_none() {
            first_action = Some(statement);
        }
    }
    Ok(())
}

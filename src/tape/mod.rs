pub mod command;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod validate;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

pub use command::{Command, Modifier, Statement, WaitScope};
pub use error::{ParseError, ParseErrorKind};
pub use lexer::tokenize;
pub use parser::parse;
pub use token::{Token, TokenKind};

/// A parsed and validated tape: a flat, ordered list of statements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tape {
    pub statements: Vec<Statement>,
}

impl Tape {
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.statements.iter().map(|statement| &statement.command)
    }

    pub fn actions(&self) -> impl Iterator<Item = &Command> {
        self.commands().filter(|command| !command.is_configuration())
    }
}

/// Reads, parses and validates a tape file, splicing `Source`d tapes in place.
///
/// Spliced statements take the position of their `Source` line, and the
/// combined list is validated again as one file.
pub fn load_tape(path: &Path) -> Result<Tape> {
    let tape = read_tape(path)?;
    let base_dir = path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    let mut statements = Vec::with_capacity(tape.statements.len());
    for statement in tape.statements {
        let Command::Source { path: source } = &statement.command else {
            statements.push(statement);
            continue;
        };
        let source_path = base_dir.join(source);
        let sourced = read_tape(&source_path).with_context(|| {
            format!(
                "failed to source {} (line {} of {})",
                source_path.display(),
                statement.line,
                path.display()
            )
        })?;
        for inner in sourced.statements {
            match inner.command {
                Command::Source { .. } => bail!(
                    "nested Source in {} (line {}) is not supported",
                    source_path.display(),
                    inner.line
                ),
                Command::Output { .. } => {}
                command => statements.push(Statement {
                    command,
                    line: statement.line,
                    column: statement.column,
                }),
            }
        }
    }
    validate::validate_statements(&statements)
        .with_context(|| format!("invalid tape {} after sourcing", path.display()))?;
    Ok(Tape { statements })
}

fn read_tape(path: &Path) -> Result<Tape> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read tape {}", path.display()))?;
    parse(&source).with_context(|| format!("failed to parse tape {}", path.display()))
}

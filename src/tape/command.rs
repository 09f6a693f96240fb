use std::fmt;
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitScope {
    Line,
    Screen,
}

impl WaitScope {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "Line" => Some(Self::Line),
            "Screen" => Some(Self::Screen),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
}

impl Modifier {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "Ctrl" => Some(Self::Ctrl),
            "Alt" => Some(Self::Alt),
            "Shift" => Some(Self::Shift),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ctrl => "Ctrl",
            Self::Alt => "Alt",
            Self::Shift => "Shift",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verb", rename_all = "snake_case")]
pub enum Command {
    Set {
        name: String,
        value: String,
    },
    Output {
        path: String,
    },
    Require {
        program: String,
    },
    Source {
        path: String,
    },
    Env {
        key: String,
        value: String,
    },
    Type {
        text: String,
        #[serde(serialize_with = "crate::millis::serialize_option")]
        speed: Option<Duration>,
    },
    Key {
        key: String,
        #[serde(serialize_with = "crate::millis::serialize_option")]
        speed: Option<Duration>,
        repeat: u32,
    },
    Modifier {
        modifiers: Vec<Modifier>,
        key: String,
    },
    Sleep {
        #[serde(serialize_with = "crate::millis::serialize")]
        duration: Duration,
    },
    Wait {
        scope: WaitScope,
        #[serde(serialize_with = "crate::millis::serialize_option")]
        timeout: Option<Duration>,
        pattern: Option<String>,
    },
    Exec {
        command: String,
    },
    Hide,
    Show,
    Screenshot {
        path: String,
    },
    Copy {
        text: String,
    },
    Paste,
}

impl Command {
    /// Configuration commands are consumed by option resolution and skipped
    /// by the executor.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Set { .. }
                | Self::Output { .. }
                | Self::Require { .. }
                | Self::Source { .. }
                | Self::Env { .. }
        )
    }

    pub fn is_keyboard(&self) -> bool {
        matches!(self, Self::Type { .. } | Self::Key { .. } | Self::Modifier { .. })
    }

    /// Actions that may leave the visible buffer untouched; the executor
    /// anchors them with an explicit activity mark.
    pub fn needs_activity_mark(&self) -> bool {
        matches!(
            self,
            Self::Sleep { .. } | Self::Hide | Self::Show | Self::Screenshot { .. } | Self::Copy { .. }
        )
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Set { .. } => "Set",
            Self::Output { .. } => "Output",
            Self::Require { .. } => "Require",
            Self::Source { .. } => "Source",
            Self::Env { .. } => "Env",
            Self::Type { .. } => "Type",
            Self::Key { .. } => "Key",
            Self::Modifier { .. } => "Modifier",
            Self::Sleep { .. } => "Sleep",
            Self::Wait { .. } => "Wait",
            Self::Exec { .. } => "Exec",
            Self::Hide => "Hide",
            Self::Show => "Show",
            Self::Screenshot { .. } => "Screenshot",
            Self::Copy { .. } => "Copy",
            Self::Paste => "Paste",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set { name, value } => write!(f, "Set {name} {value}"),
            Self::Output { path } => write!(f, "Output {path}"),
            Self::Require { program } => write!(f, "Require {program}"),
            Self::Source { path } => write!(f, "Source {path}"),
            Self::Env { key, value } => write!(f, "Env {key} {value:?}"),
            Self::Type { text, speed } => {
                write!(f, "Type")?;
                write_speed(f, *speed)?;
                write!(f, " {text:?}")
            }
            Self::Key { key, speed, repeat } => {
                write!(f, "{key}")?;
                write_speed(f, *speed)?;
                if *repeat > 1 {
                    write!(f, " {repeat}")?;
                }
                Ok(())
            }
            Self::Modifier { modifiers, key } => {
                for modifier in modifiers {
                    write!(f, "{}+", modifier.as_str())?;
                }
                write!(f, "{key}")
            }
            Self::Sleep { duration } => write!(f, "Sleep {}ms", duration.as_millis()),
            Self::Wait {
                scope,
                timeout,
                pattern,
            } => {
                let scope = match scope {
                    WaitScope::Line => "Line",
                    WaitScope::Screen => "Screen",
                };
                write!(f, "Wait+{scope}")?;
                write_speed(f, *timeout)?;
                if let Some(pattern) = pattern {
                    write!(f, " /{pattern}/")?;
                }
                Ok(())
            }
            Self::Exec { command } => write!(f, "Exec {command:?}"),
            Self::Hide => write!(f, "Hide"),
            Self::Show => write!(f, "Show"),
            Self::Screenshot { path } => write!(f, "Screenshot {path}"),
            Self::Copy { text } => write!(f, "Copy {text:?}"),
            Self::Paste => write!(f, "Paste"),
        }
    }
}

fn write_speed(f: &mut fmt::Formatter<'_>, speed: Option<Duration>) -> fmt::Result {
    match speed {
        Some(speed) => write!(f, "@{}ms", speed.as_millis()),
        None => Ok(()),
    }
}

/// One parsed command with the position of its leading keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    #[serde(flatten)]
    pub command: Command,
    pub line: usize,
    pub column: usize,
}

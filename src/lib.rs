pub mod cancel;
pub mod config;
pub mod error_codes;
pub mod manifest;
pub mod millis;
pub mod options;
pub mod recorder;
pub mod require;
pub mod tape;
pub mod terminal;
pub mod trim;

use std::path::{Path, PathBuf};

use anyhow::Result;

pub use cancel::CancelToken;
pub use config::{KeyFailurePolicy, RecorderConfig};
pub use options::SessionOptions;
pub use recorder::{Recorder, RecordingOutcome, RecordingSummary};
pub use tape::{load_tape, parse, tokenize, Tape};
pub use terminal::{CapturedFrame, FrameLayer, Terminal};

/// A tape that is ready to record: parsed, validated, options resolved and
/// every required program found.
#[derive(Debug, Clone)]
pub struct PreparedTape {
    pub tape: Tape,
    pub options: SessionOptions,
    pub programs: Vec<PathBuf>,
}

/// Everything that must succeed before a terminal is started.
pub fn prepare_tape(path: &Path) -> Result<PreparedTape> {
    let tape = load_tape(path)?;
    let options = SessionOptions::from_tape(&tape)?;
    let programs = require::check_requirements(&options.requires)?;
    Ok(PreparedTape {
        tape,
        options,
        programs,
    })
}

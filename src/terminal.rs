use std::time::{Duration, Instant};

use anyhow::Result;
use regex::Regex;

use crate::cancel::CancelToken;
use crate::tape::{Modifier, WaitScope};

const PATTERN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One encoded image (PNG) of a captured frame. Renderers that draw the text
/// and cursor separately return one layer each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayer {
    pub name: String,
    pub png: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    pub layers: Vec<FrameLayer>,
}

impl CapturedFrame {
    pub fn single(png: Vec<u8>) -> Self {
        Self {
            layers: vec![FrameLayer {
                name: "frame".to_owned(),
                png,
            }],
        }
    }
}

/// The terminal being recorded: a shell inside a terminal emulator whose
/// screen can be read back as text and captured as images.
///
/// Implementations are shared between the executor (the only writer of input)
/// and the capture loops (readers), so every method takes `&self`.
pub trait Terminal: Send + Sync {
    fn send_text(&self, text: &str) -> Result<()>;

    /// `key` is a tape key name such as `Enter`, `Backspace` or `PageUp`.
    fn send_key(&self, key: &str) -> Result<()>;

    fn send_modifier_combo(&self, modifiers: &[Modifier], key: &str) -> Result<()>;

    /// The visible screen contents.
    fn buffer_text(&self) -> Result<String>;

    /// The last non-empty line of the visible screen.
    fn last_line(&self) -> Result<String>;

    fn capture_frame(&self) -> Result<CapturedFrame>;

    /// Polls the line or screen until `pattern` matches. Returns `false` on
    /// timeout or cancellation.
    fn wait_for_pattern(
        &self,
        pattern: &Regex,
        scope: WaitScope,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            let text = match scope {
                WaitScope::Line => self.last_line()?,
                WaitScope::Screen => self.buffer_text()?,
            };
            if pattern.is_match(&text) {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            if !cancel.sleep(PATTERN_POLL_INTERVAL.min(deadline - now)) {
                return Ok(false);
            }
        }
    }
}

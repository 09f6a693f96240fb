use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use image::{imageops, DynamicImage, ImageFormat};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, error, warn, Span};

use crate::cancel::CancelToken;
use crate::config::KeyFailurePolicy;
use crate::options::SessionOptions;
use crate::tape::{Command, Statement, WaitScope};
use crate::terminal::{CapturedFrame, Terminal};

use super::monitor::ActivityMonitor;
use super::state::SessionState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub executed: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Runs a tape's action commands, in order, against the terminal.
pub struct CommandExecutor<'a> {
    terminal: &'a dyn Terminal,
    options: &'a SessionOptions,
    state: &'a SessionState,
    monitor: &'a ActivityMonitor<'a>,
    cancel: &'a CancelToken,
    key_failure: KeyFailurePolicy,
    poll_interval: Duration,
    clipboard: Option<String>,
    span: Span,
}

impl<'a> CommandExecutor<'a> {
    pub fn new(
        terminal: &'a dyn Terminal,
        options: &'a SessionOptions,
        state: &'a SessionState,
        monitor: &'a ActivityMonitor<'a>,
        cancel: &'a CancelToken,
        key_failure: KeyFailurePolicy,
        poll_interval: Duration,
        span: Span,
    ) -> Self {
        Self {
            terminal,
            options,
            state,
            monitor,
            cancel,
            key_failure,
            poll_interval,
            clipboard: None,
            span,
        }
    }

    /// Returns an error only when a keyboard command fails under
    /// [`KeyFailurePolicy::Abort`].
    pub fn run(&mut self, statements: &[Statement]) -> Result<ExecutionReport> {
        let _entered = self.span.clone().entered();
        let mut report = ExecutionReport::default();
        let mut previous_was_keyboard = false;

        for statement in statements {
            let command = &statement.command;
            if command.is_configuration() {
                continue;
            }
            if self.cancel.is_cancelled() {
                break;
            }

            if previous_was_keyboard && command.is_keyboard() {
                if !self.cancel.sleep(self.options.typing_speed) {
                    break;
                }
            }
            previous_was_keyboard = command.is_keyboard();

            self.state.set_current_command(command.to_string());
            debug!(line = statement.line, command = %command, "executing");

            let result = self.dispatch(command);
            if command.needs_activity_mark() {
                self.monitor.mark_activity();
            }
            report.executed += 1;

            let Err(failure) = result else {
                continue;
            };
            report.failed += 1;
            if command.is_keyboard() {
                error!(
                    line = statement.line,
                    command = %command,
                    error = %format!("{failure:#}"),
                    "keyboard command failed; terminal input may be out of sync"
                );
                if self.key_failure == KeyFailurePolicy::Abort {
                    return Err(failure.context(format!(
                        "line {}: {} failed; aborting recording",
                        statement.line,
                        command.verb()
                    )));
                }
            } else {
                warn!(
                    line = statement.line,
                    command = %command,
                    error = %format!("{failure:#}"),
                    "command failed"
                );
            }
        }

        report.cancelled = self.cancel.is_cancelled();
        Ok(report)
    }

    fn dispatch(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::Type { text, speed } => {
                let delay = speed.unwrap_or(self.options.typing_speed);
                let mut buffer = [0u8; 4];
                for (index, character) in text.chars().enumerate() {
                    if index > 0 && !self.cancel.sleep(delay) {
                        return Ok(());
                    }
                    self.terminal
                        .send_text(character.encode_utf8(&mut buffer))?;
                }
                Ok(())
            }
            Command::Key { key, speed, repeat } => {
                let delay = speed.unwrap_or(self.options.typing_speed);
                for index in 0..*repeat {
                    if index > 0 && !self.cancel.sleep(delay) {
                        return Ok(());
                    }
                    self.terminal.send_key(key)?;
                }
                Ok(())
            }
            Command::Modifier { modifiers, key } => {
                self.terminal.send_modifier_combo(modifiers, key)
            }
            Command::Sleep { duration } => {
                self.cancel.sleep(*duration);
                Ok(())
            }
            Command::Wait {
                scope,
                timeout,
                pattern,
            } => self.wait(*scope, *timeout, pattern.as_deref()),
            Command::Exec { command } => {
                self.terminal.send_text(command)?;
                self.terminal.send_key("Enter")?;
                self.wait_for_inactivity()
            }
            Command::Hide => {
                self.state.set_capturing(false);
                Ok(())
            }
            Command::Show => {
                self.state.set_capturing(true);
                Ok(())
            }
            Command::Screenshot { path } => {
                let frame = self.terminal.capture_frame()?;
                write_screenshot(Path::new(path), &frame)
            }
            Command::Copy { text } => {
                self.clipboard = Some(text.clone());
                Ok(())
            }
            Command::Paste => {
                let text = self
                    .clipboard
                    .as_deref()
                    .ok_or_else(|| anyhow!("clipboard is empty; Copy something first"))?;
                self.terminal.send_text(text)
            }
            Command::Set { .. }
            | Command::Output { .. }
            | Command::Require { .. }
            | Command::Source { .. }
            | Command::Env { .. } => Ok(()),
        }
    }

    fn wait(
        &self,
        scope: WaitScope,
        timeout: Option<Duration>,
        pattern: Option<&str>,
    ) -> Result<()> {
        let source = pattern.unwrap_or(&self.options.wait_pattern);
        let regex =
            Regex::new(source).with_context(|| format!("invalid wait pattern '{source}'"))?;
        let timeout = timeout.unwrap_or(self.options.wait_timeout);
        let matched = self
            .terminal
            .wait_for_pattern(&regex, scope, timeout, self.cancel)?;
        if !matched && !self.cancel.is_cancelled() {
            bail!("timed out after {timeout:?} waiting for /{source}/");
        }
        Ok(())
    }

    /// Waits until the buffer stops changing for the inactivity timeout,
    /// giving up quietly after the wait timeout.
    fn wait_for_inactivity(&self) -> Result<()> {
        let started = Instant::now();
        let mut previous = self.terminal.buffer_text()?;
        let mut quiet_since = started;

        while self.cancel.sleep(self.poll_interval) {
            let now = Instant::now();
            let current = self.terminal.buffer_text()?;
            if current != previous {
                previous = current;
                quiet_since = now;
            } else if now.duration_since(quiet_since) >= self.options.inactivity_timeout {
                return Ok(());
            }
            if now.duration_since(started) >= self.options.wait_timeout {
                warn!(
                    timeout_ms = self.options.wait_timeout.as_millis() as u64,
                    "terminal never went quiet; continuing"
                );
                return Ok(());
            }
        }
        Ok(())
    }
}

/// Writes a captured frame to `path`. A single-layer PNG is written as-is;
/// anything else is composited bottom-up and encoded by extension.
pub fn write_screenshot(path: &Path, frame: &CapturedFrame) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let format = match path.extension().and_then(OsStr::to_str) {
        None => ImageFormat::Png,
        Some(_) => ImageFormat::from_path(path)
            .with_context(|| format!("unsupported screenshot format for {}", path.display()))?,
    };

    if let ([layer], ImageFormat::Png) = (frame.layers.as_slice(), format) {
        return fs::write(path, &layer.png)
            .with_context(|| format!("failed to write screenshot {}", path.display()));
    }

    let mut layers = frame.layers.iter();
    let base = layers
        .next()
        .ok_or_else(|| anyhow!("captured frame has no layers"))?;
    let mut canvas = image::load_from_memory_with_format(&base.png, ImageFormat::Png)
        .with_context(|| format!("failed to decode frame layer '{}'", base.name))?
        .to_rgba8();
    for layer in layers {
        let overlay = image::load_from_memory_with_format(&layer.png, ImageFormat::Png)
            .with_context(|| format!("failed to decode frame layer '{}'", layer.name))?
            .to_rgba8();
        imageops::overlay(&mut canvas, &overlay, 0, 0);
    }

    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8()),
        _ => DynamicImage::ImageRgba8(canvas),
    };
    image
        .save_with_format(path, format)
        .with_context(|| format!("failed to write screenshot {}", path.display()))
}

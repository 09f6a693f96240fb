use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use serde::Serialize;

use crate::tape::parser::{parse_duration_literal, parse_seconds};
use crate::tape::{Command, Tape};

pub const DEFAULT_FRAMERATE: u32 = 50;
pub const DEFAULT_START_BUFFER: Duration = Duration::from_millis(500);
pub const DEFAULT_END_BUFFER: Duration = Duration::from_millis(100);
pub const DEFAULT_TYPING_SPEED: Duration = Duration::from_millis(50);
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_WAIT_PATTERN: &str = ">$";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ThemeSetting {
    Named(String),
    Inline(serde_json::Value),
}

/// Session configuration resolved from `Set`, `Output`, `Env` and `Require`
/// before recording starts. Read-only while recording.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOptions {
    pub shell: String,
    pub font_size: f64,
    pub font_family: Option<String>,
    pub theme: Option<ThemeSetting>,
    pub framerate: u32,
    #[serde(serialize_with = "crate::millis::serialize")]
    pub start_buffer: Duration,
    #[serde(serialize_with = "crate::millis::serialize")]
    pub end_buffer: Duration,
    #[serde(serialize_with = "crate::millis::serialize")]
    pub typing_speed: Duration,
    #[serde(serialize_with = "crate::millis::serialize")]
    pub wait_timeout: Duration,
    #[serde(serialize_with = "crate::millis::serialize")]
    pub inactivity_timeout: Duration,
    /// Validated regex source; compiled where it is used.
    pub wait_pattern: String,
    pub cursor_blink: bool,
    pub width: u32,
    pub height: u32,
    pub playback_speed: f64,
    pub padding: Option<f64>,
    pub letter_spacing: Option<f64>,
    pub line_height: Option<f64>,
    pub outputs: Vec<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub requires: Vec<String>,
    /// Settings this crate does not interpret, passed through verbatim.
    pub extra: BTreeMap<String, String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            shell: "bash".to_owned(),
            font_size: 22.0,
            font_family: None,
            theme: None,
            framerate: DEFAULT_FRAMERATE,
            start_buffer: DEFAULT_START_BUFFER,
            end_buffer: DEFAULT_END_BUFFER,
            typing_speed: DEFAULT_TYPING_SPEED,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            wait_pattern: DEFAULT_WAIT_PATTERN.to_owned(),
            cursor_blink: true,
            width: 1200,
            height: 600,
            playback_speed: 1.0,
            padding: None,
            letter_spacing: None,
            line_height: None,
            outputs: Vec::new(),
            env: BTreeMap::new(),
            requires: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl SessionOptions {
    pub fn from_tape(tape: &Tape) -> Result<Self> {
        let mut options = Self::default();
        for statement in &tape.statements {
            match &statement.command {
                Command::Set { name, value } => options
                    .apply_setting(name, value)
                    .with_context(|| format!("line {}: invalid Set {}", statement.line, name))?,
                Command::Output { path } => options.outputs.push(PathBuf::from(path)),
                Command::Env { key, value } => {
                    options.env.insert(key.clone(), value.clone());
                }
                Command::Require { program } => options.requires.push(program.clone()),
                _ => {}
            }
        }
        Ok(options)
    }

    fn apply_setting(&mut self, name: &str, value: &str) -> Result<()> {
        match name.to_ascii_lowercase().as_str() {
            "shell" => self.shell = value.to_owned(),
            "fontsize" => self.font_size = parse_positive(value)?,
            "fontfamily" => self.font_family = Some(value.to_owned()),
            "theme" => self.theme = Some(parse_theme(value)?),
            "framerate" => {
                self.framerate = value
                    .parse::<u32>()
                    .ok()
                    .filter(|rate| *rate > 0)
                    .ok_or_else(|| anyhow!("framerate must be a positive integer, got '{value}'"))?
            }
            "startbuffer" => self.start_buffer = parse_setting_duration(value)?,
            "endbuffer" => self.end_buffer = parse_setting_duration(value)?,
            "typingspeed" => self.typing_speed = parse_setting_duration(value)?,
            "waittimeout" => self.wait_timeout = parse_setting_duration(value)?,
            "inactivitytimeout" => self.inactivity_timeout = parse_setting_duration(value)?,
            "waitpattern" => {
                Regex::new(value).with_context(|| format!("invalid wait pattern '{value}'"))?;
                self.wait_pattern = value.to_owned();
            }
            "cursorblink" => {
                self.cursor_blink = match value {
                    "true" => true,
                    "false" => false,
                    other => bail!("expected true or false, got '{other}'"),
                }
            }
            "width" => self.width = parse_dimension(value)?,
            "height" => self.height = parse_dimension(value)?,
            "playbackspeed" => self.playback_speed = parse_positive(value)?,
            "padding" => self.padding = Some(parse_non_negative(value)?),
            "letterspacing" => self.letter_spacing = Some(parse_number(value)?),
            "lineheight" => self.line_height = Some(parse_positive(value)?),
            _ => {
                self.extra.insert(name.to_owned(), value.to_owned());
            }
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.framerate))
    }

    pub fn start_buffer_frames(&self) -> u64 {
        duration_to_frames(self.start_buffer, self.framerate)
    }

    pub fn end_buffer_frames(&self) -> u64 {
        duration_to_frames(self.end_buffer, self.framerate)
    }
}

pub fn duration_to_frames(duration: Duration, framerate: u32) -> u64 {
    (duration.as_secs_f64() * f64::from(framerate)).round() as u64
}

fn parse_setting_duration(value: &str) -> Result<Duration> {
    parse_duration_literal(value)
        .or_else(|| parse_seconds(value))
        .ok_or_else(|| anyhow!("expected a duration like 500ms or 1.5s, got '{value}'"))
}

fn parse_number(value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .ok_or_else(|| anyhow!("expected a number, got '{value}'"))
}

fn parse_positive(value: &str) -> Result<f64> {
    let number = parse_number(value)?;
    if number <= 0.0 {
        bail!("expected a value > 0, got '{value}'");
    }
    Ok(number)
}

fn parse_non_negative(value: &str) -> Result<f64> {
    let number = parse_number(value)?;
    if number < 0.0 {
        bail!("expected a value >= 0, got '{value}'");
    }
    Ok(number)
}

fn parse_dimension(value: &str) -> Result<u32> {
    value
        .parse::<u32>()
        .ok()
        .filter(|pixels| *pixels > 0)
        .ok_or_else(|| anyhow!("expected a positive pixel count, got '{value}'"))
}

fn parse_theme(value: &str) -> Result<ThemeSetting> {
    if value.trim_start().starts_with('{') {
        let parsed = serde_json::from_str(value).context("inline theme is not valid JSON")?;
        return Ok(ThemeSetting::Inline(parsed));
    }
    Ok(ThemeSetting::Named(value.to_owned()))
}

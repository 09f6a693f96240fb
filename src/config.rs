use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_FRAMES_DIR: &str = "frames";
const DEFAULT_MANIFEST_NAME: &str = "manifest.json";
const DEFAULT_ACTIVITY_POLL_MS: u64 = 15;
const DEFAULT_WRITE_QUEUE_CAPACITY: usize = 64;

/// What the executor does after a keyboard command fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFailurePolicy {
    /// Log at error level and keep going.
    #[default]
    Continue,
    /// Stop the script; remaining commands would type into an unknown state.
    Abort,
}

/// On-disk engine configuration. Tape `Set` commands describe the session;
/// this file describes how the recorder runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderConfigFile {
    #[serde(default)]
    pub frames_dir: Option<String>,
    #[serde(default)]
    pub manifest_name: Option<String>,
    #[serde(default)]
    pub activity_poll_ms: Option<u64>,
    #[serde(default)]
    pub write_queue_capacity: Option<usize>,
    #[serde(default)]
    pub key_failure: Option<KeyFailurePolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecorderConfig {
    pub frames_dir: PathBuf,
    pub manifest_name: String,
    pub activity_poll_interval: Duration,
    pub write_queue_capacity: usize,
    pub key_failure: KeyFailurePolicy,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from(DEFAULT_FRAMES_DIR),
            manifest_name: DEFAULT_MANIFEST_NAME.to_owned(),
            activity_poll_interval: Duration::from_millis(DEFAULT_ACTIVITY_POLL_MS),
            write_queue_capacity: DEFAULT_WRITE_QUEUE_CAPACITY,
            key_failure: KeyFailurePolicy::default(),
        }
    }
}

pub fn load_config_file(config_path: &Path) -> Result<RecorderConfigFile> {
    let config_text = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read recorder config at {}", config_path.display()))?;
    if config_text.trim().is_empty() {
        return Ok(RecorderConfigFile::default());
    }
    serde_yaml::from_str(&config_text).with_context(|| {
        format!(
            "failed to parse recorder config yaml at {}",
            config_path.display()
        )
    })
}

/// Applies defaults and resolves a relative `frames_dir` against `base_dir`.
pub fn resolve_config(file: RecorderConfigFile, base_dir: &Path) -> Result<RecorderConfig> {
    let defaults = RecorderConfig::default();

    let frames_dir = file
        .frames_dir
        .map(PathBuf::from)
        .unwrap_or(defaults.frames_dir);
    let frames_dir = if frames_dir.is_absolute() {
        frames_dir
    } else {
        base_dir.join(frames_dir)
    };

    let activity_poll_ms = file.activity_poll_ms.unwrap_or(DEFAULT_ACTIVITY_POLL_MS);
    if activity_poll_ms == 0 {
        bail!("activity_poll_ms must be > 0");
    }
    let write_queue_capacity = file
        .write_queue_capacity
        .unwrap_or(defaults.write_queue_capacity);
    if write_queue_capacity == 0 {
        bail!("write_queue_capacity must be > 0");
    }
    let manifest_name = file.manifest_name.unwrap_or(defaults.manifest_name);
    if manifest_name.trim().is_empty() || manifest_name.contains(['/', '\\']) {
        bail!("manifest_name must be a plain file name, got '{manifest_name}'");
    }

    Ok(RecorderConfig {
        frames_dir,
        manifest_name,
        activity_poll_interval: Duration::from_millis(activity_poll_ms),
        write_queue_capacity,
        key_failure: file.key_failure.unwrap_or(defaults.key_failure),
    })
}

/// Loads `config_path` when given, otherwise uses defaults rooted at `base_dir`.
pub fn load_config(config_path: Option<&Path>, base_dir: &Path) -> Result<RecorderConfig> {
    match config_path {
        Some(path) => {
            let file = load_config_file(path)?;
            let config_dir = path
                .parent()
                .map_or_else(|| base_dir.to_path_buf(), Path::to_path_buf);
            resolve_config(file, &config_dir)
        }
        None => resolve_config(RecorderConfigFile::default(), base_dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_against_base_dir() {
        let config = load_config(None, Path::new("/work")).expect("defaults");
        assert_eq!(config.frames_dir, PathBuf::from("/work/frames"));
        assert_eq!(config.manifest_name, "manifest.json");
        assert_eq!(config.key_failure, KeyFailurePolicy::Continue);
    }

    #[test]
    fn yaml_overrides_and_relative_frames_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config_path = temp.path().join("termtape.yaml");
        fs::write(
            &config_path,
            "frames_dir: out/frames\nactivity_poll_ms: 5\nwrite_queue_capacity: 8\nkey_failure: abort\n",
        )
        .expect("write config");

        let config = load_config(Some(&config_path), Path::new("/unused")).expect("load");
        assert_eq!(config.frames_dir, temp.path().join("out/frames"));
        assert_eq!(config.activity_poll_interval, Duration::from_millis(5));
        assert_eq!(config.write_queue_capacity, 8);
        assert_eq!(config.key_failure, KeyFailurePolicy::Abort);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config_path = temp.path().join("empty.yaml");
        fs::write(&config_path, "\n").expect("write config");
        let config = load_config(Some(&config_path), temp.path()).expect("load");
        assert_eq!(config.write_queue_capacity, 64);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let file = RecorderConfigFile {
            write_queue_capacity: Some(0),
            ..RecorderConfigFile::default()
        };
        assert!(resolve_config(file, Path::new(".")).is_err());
    }
}

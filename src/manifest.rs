use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::millis::as_millis_f64;
use crate::options::SessionOptions;
use crate::recorder::FrameMetadata;
use crate::trim::frame_file_name;

pub const MANIFEST_VERSION: u32 = 1;

/// Frame listing handed to the external encoder after trimming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameManifest {
    pub version: u32,
    pub created_at: String,
    pub framerate: u32,
    pub frame_interval_ms: f64,
    pub playback_speed: f64,
    pub width: u32,
    pub height: u32,
    pub outputs: Vec<PathBuf>,
    pub layers: Vec<String>,
    pub frames: Vec<ManifestFrame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestFrame {
    pub number: u64,
    pub timestamp_ms: f64,
    pub duration_ms: f64,
    /// Layer name to file name, relative to the frames directory.
    pub files: BTreeMap<String, String>,
}

/// How long each frame stays on screen: the gap to the next frame's
/// timestamp, and one nominal interval for the last frame.
pub fn frame_durations(frames: &[FrameMetadata], nominal: Duration) -> Vec<Duration> {
    frames
        .iter()
        .enumerate()
        .map(|(index, frame)| match frames.get(index + 1) {
            Some(next) => next.timestamp.saturating_sub(frame.timestamp),
            None => nominal,
        })
        .collect()
}

pub fn build_manifest(
    frames: &[FrameMetadata],
    layers: &[String],
    options: &SessionOptions,
) -> FrameManifest {
    let interval = options.frame_interval();
    let entries = frames
        .iter()
        .zip(frame_durations(frames, interval))
        .map(|(frame, duration)| ManifestFrame {
            number: frame.frame_number,
            timestamp_ms: as_millis_f64(frame.timestamp),
            duration_ms: as_millis_f64(duration),
            files: layers
                .iter()
                .map(|layer| (layer.clone(), frame_file_name(layer, frame.frame_number)))
                .collect(),
        })
        .collect();

    FrameManifest {
        version: MANIFEST_VERSION,
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        framerate: options.framerate,
        frame_interval_ms: as_millis_f64(interval),
        playback_speed: options.playback_speed,
        width: options.width,
        height: options.height,
        outputs: options.outputs.clone(),
        layers: layers.to_vec(),
        frames: entries,
    }
}

pub fn write_manifest(dir: &Path, file_name: &str, manifest: &FrameManifest) -> Result<PathBuf> {
    let path = dir.join(file_name);
    let json = serde_json::to_string_pretty(manifest).context("failed to serialize manifest")?;
    fs::write(&path, json)
        .with_context(|| format!("failed to write manifest {}", path.display()))?;
    Ok(path)
}

pub fn load_manifest(path: &Path) -> Result<FrameManifest> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    serde_json::from_str(&contents).map_err(|error| {
        anyhow!(
            "failed to parse manifest {} at line {}, column {}: {}",
            path.display(),
            error.line(),
            error.column(),
            error
        )
    })
}

/// Renders a concat-demuxer script for one layer. The last file is listed
/// twice so its duration is honored.
pub fn concat_script(manifest: &FrameManifest, layer: &str) -> String {
    let mut script = String::from("ffconcat version 1.0\n");
    let mut last_file = None;
    for frame in &manifest.frames {
        let Some(file) = frame.files.get(layer) else {
            continue;
        };
        let _ = writeln!(script, "file '{file}'");
        let _ = writeln!(script, "duration {:.6}", frame.duration_ms / 1000.0);
        last_file = Some(file);
    }
    if let Some(file) = last_file {
        let _ = writeln!(script, "file '{file}'");
    }
    script
}

/// Writes `<layer>.ffconcat` next to the frames for every layer.
pub fn write_concat_scripts(dir: &Path, manifest: &FrameManifest) -> Result<Vec<PathBuf>> {
    manifest
        .layers
        .iter()
        .map(|layer| {
            let path = dir.join(format!("{layer}.ffconcat"));
            fs::write(&path, concat_script(manifest, layer))
                .with_context(|| format!("failed to write concat script {}", path.display()))?;
            Ok(path)
        })
        .collect()
}

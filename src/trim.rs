use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::recorder::FrameMetadata;

/// Number given to the first frame on disk after trimming.
pub const FRAME_BASE_INDEX: u64 = 1;

/// Inclusive range of original frame numbers that survive trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeepWindow {
    pub first: u64,
    pub last: u64,
}

impl KeepWindow {
    pub fn contains(&self, frame_number: u64) -> bool {
        (self.first..=self.last).contains(&frame_number)
    }
}

/// `None` when no activity was observed; every captured frame is kept then.
pub fn keep_window(
    first_activity: Option<u64>,
    last_activity: Option<u64>,
    start_buffer_frames: u64,
    end_buffer_frames: u64,
) -> Option<KeepWindow> {
    let (first, last) = first_activity.zip(last_activity)?;
    Some(KeepWindow {
        first: first.saturating_sub(start_buffer_frames).max(FRAME_BASE_INDEX),
        last: last.saturating_add(end_buffer_frames),
    })
}

pub fn frame_file_name(layer: &str, frame_number: u64) -> String {
    format!("{layer}-{frame_number:05}.png")
}

/// Splits `text-00042.png` into `("text", 42)`.
pub fn parse_frame_file_name(file_name: &str) -> Option<(String, u64)> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"^(?P<layer>.+)-(?P<number>\d{5,})\.png$").ok())
        .as_ref()?;
    let captures = pattern.captures(file_name)?;
    let number = captures.name("number")?.as_str().parse().ok()?;
    Some((captures.name("layer")?.as_str().to_owned(), number))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrimReport {
    pub window: Option<KeepWindow>,
    pub removed_files: usize,
    pub layers: BTreeSet<String>,
    /// Surviving frames, renumbered from [`FRAME_BASE_INDEX`].
    pub frames: Vec<FrameMetadata>,
}

/// Deletes frame files outside `window` or whose frame is not visible, then
/// renames the survivors in ascending order to a contiguous sequence.
pub fn trim_frames(
    frames_dir: &Path,
    frames: &[FrameMetadata],
    window: Option<KeepWindow>,
) -> Result<TrimReport> {
    let on_disk = scan_frame_files(frames_dir)?;

    let mut kept = frames
        .iter()
        .filter(|frame| frame.is_visible)
        .filter(|frame| window.map_or(true, |window| window.contains(frame.frame_number)))
        .filter(|frame| on_disk.contains_key(&frame.frame_number))
        .copied()
        .collect::<Vec<_>>();
    kept.sort_by_key(|frame| frame.frame_number);
    let kept_numbers = kept
        .iter()
        .map(|frame| frame.frame_number)
        .collect::<BTreeSet<_>>();

    let mut removed_files = 0;
    for (frame_number, files) in &on_disk {
        if kept_numbers.contains(frame_number) {
            continue;
        }
        for (_, path) in files {
            fs::remove_file(path)
                .with_context(|| format!("failed to delete trimmed frame {}", path.display()))?;
            removed_files += 1;
        }
    }

    let mut layers = BTreeSet::new();
    let mut renumbered = Vec::with_capacity(kept.len());
    for (new_number, frame) in (FRAME_BASE_INDEX..).zip(kept) {
        for (layer, path) in on_disk.get(&frame.frame_number).into_iter().flatten() {
            layers.insert(layer.clone());
            if new_number != frame.frame_number {
                let target = frames_dir.join(frame_file_name(layer, new_number));
                fs::rename(path, &target).with_context(|| {
                    format!(
                        "failed to rename frame {} to {}",
                        path.display(),
                        target.display()
                    )
                })?;
            }
        }
        renumbered.push(FrameMetadata {
            frame_number: new_number,
            ..frame
        });
    }

    info!(
        kept = renumbered.len(),
        removed_files,
        window = ?window,
        "trimmed frames"
    );

    Ok(TrimReport {
        window,
        removed_files,
        layers,
        frames: renumbered,
    })
}

/// Deletes frame files left behind by an earlier recording.
pub fn remove_frame_files(frames_dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for files in scan_frame_files(frames_dir)?.into_values() {
        for (_, path) in files {
            fs::remove_file(&path)
                .with_context(|| format!("failed to delete stale frame {}", path.display()))?;
            removed += 1;
        }
    }
    if removed > 0 {
        debug!(removed, dir = %frames_dir.display(), "removed stale frames");
    }
    Ok(removed)
}

fn scan_frame_files(frames_dir: &Path) -> Result<BTreeMap<u64, Vec<(String, PathBuf)>>> {
    let mut by_frame: BTreeMap<u64, Vec<(String, PathBuf)>> = BTreeMap::new();
    let entries = fs::read_dir(frames_dir)
        .with_context(|| format!("failed to list frames in {}", frames_dir.display()))?;
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to list frames in {}", frames_dir.display()))?;
        let file_name = entry.file_name();
        let Some((layer, frame_number)) = file_name.to_str().and_then(parse_frame_file_name)
        else {
            continue;
        };
        by_frame
            .entry(frame_number)
            .or_default()
            .push((layer, entry.path()));
    }
    Ok(by_frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn metadata(count: u64) -> Vec<FrameMetadata> {
        (1..=count)
            .map(|frame_number| FrameMetadata {
                frame_number,
                timestamp: Duration::from_millis(frame_number * 20),
                is_visible: true,
            })
            .collect()
    }

    fn write_frames(dir: &Path, layers: &[&str], count: u64) {
        for frame_number in 1..=count {
            for layer in layers {
                fs::write(
                    dir.join(frame_file_name(layer, frame_number)),
                    frame_number.to_string(),
                )
                .expect("write frame");
            }
        }
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names = fs::read_dir(dir)
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn window_adds_buffers_around_activity() {
        // 500ms start and 100ms end at 50fps.
        assert_eq!(
            keep_window(Some(30), Some(200), 25, 5),
            Some(KeepWindow {
                first: 5,
                last: 205
            })
        );
    }

    #[test]
    fn window_start_clamps_to_first_frame() {
        assert_eq!(
            keep_window(Some(10), Some(12), 25, 0),
            Some(KeepWindow { first: 1, last: 12 })
        );
    }

    #[test]
    fn no_activity_means_no_window() {
        assert_eq!(keep_window(None, None, 25, 5), None);
    }

    #[test]
    fn file_names_round_trip() {
        assert_eq!(frame_file_name("text", 42), "text-00042.png");
        assert_eq!(
            parse_frame_file_name("cursor-layer-123456.png"),
            Some(("cursor-layer".to_owned(), 123456))
        );
        assert_eq!(parse_frame_file_name("manifest.json"), None);
        assert_eq!(parse_frame_file_name("text-12.png"), None);
    }

    #[test]
    fn survivors_are_renumbered_contiguously() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_frames(temp.path(), &["text", "cursor"], 10);

        let report = trim_frames(
            temp.path(),
            &metadata(10),
            Some(KeepWindow { first: 4, last: 7 }),
        )
        .expect("trim");

        assert_eq!(report.removed_files, 12);
        assert_eq!(
            listing(temp.path()),
            vec![
                "cursor-00001.png",
                "cursor-00002.png",
                "cursor-00003.png",
                "cursor-00004.png",
                "text-00001.png",
                "text-00002.png",
                "text-00003.png",
                "text-00004.png",
            ]
        );
        let contents = fs::read_to_string(temp.path().join("text-00001.png")).expect("read");
        assert_eq!(contents, "4");
        let numbers = report
            .frames
            .iter()
            .map(|frame| frame.frame_number)
            .collect::<Vec<_>>();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(report.frames[0].timestamp, Duration::from_millis(80));
        assert_eq!(
            report.layers.into_iter().collect::<Vec<_>>(),
            vec!["cursor".to_owned(), "text".to_owned()]
        );
    }

    #[test]
    fn invisible_frames_are_dropped_and_gaps_closed() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_frames(temp.path(), &["frame"], 5);
        let mut frames = metadata(5);
        frames[1].is_visible = false;

        let report = trim_frames(temp.path(), &frames, None).expect("trim");

        assert_eq!(
            listing(temp.path()),
            vec![
                "frame-00001.png",
                "frame-00002.png",
                "frame-00003.png",
                "frame-00004.png",
            ]
        );
        let contents = fs::read_to_string(temp.path().join("frame-00002.png")).expect("read");
        assert_eq!(contents, "3");
        assert_eq!(report.frames.len(), 4);
    }

    #[test]
    fn window_past_the_last_frame_keeps_the_tail() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_frames(temp.path(), &["frame"], 6);
        let report = trim_frames(
            temp.path(),
            &metadata(6),
            Some(KeepWindow { first: 3, last: 60 }),
        )
        .expect("trim");
        assert_eq!(report.frames.len(), 4);
        assert_eq!(listing(temp.path()).last().map(String::as_str), Some("frame-00004.png"));
    }

    #[test]
    fn unrelated_files_are_left_alone() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_frames(temp.path(), &["frame"], 2);
        fs::write(temp.path().join("notes.txt"), "keep").expect("write");
        assert_eq!(remove_frame_files(temp.path()).expect("remove"), 2);
        assert_eq!(listing(temp.path()), vec!["notes.txt"]);
    }
}

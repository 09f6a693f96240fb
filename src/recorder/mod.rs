pub mod executor;
pub mod monitor;
pub mod scheduler;
pub mod state;
pub mod writer;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::cancel::CancelToken;
use crate::config::RecorderConfig;
use crate::manifest::{build_manifest, write_concat_scripts, write_manifest};
use crate::options::SessionOptions;
use crate::tape::Tape;
use crate::terminal::Terminal;
use crate::trim::{
    keep_window, parse_frame_file_name, remove_frame_files, trim_frames, KeepWindow,
};

pub use executor::{write_screenshot, CommandExecutor, ExecutionReport};
pub use monitor::ActivityMonitor;
pub use scheduler::{FrameScheduler, TickSchedule};
pub use state::{ActivityMark, ActivityWindow, FrameMetadata, SessionState};
pub use writer::{FailedWrite, WriteBehindQueue, WriteReport};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingSummary {
    pub frames_captured: u64,
    pub frames_kept: usize,
    pub failed_writes: usize,
    pub window: Option<KeepWindow>,
    pub activity: ActivityWindow,
    pub execution: ExecutionReport,
    pub manifest_path: PathBuf,
    pub concat_scripts: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordingOutcome {
    Completed(RecordingSummary),
    /// Frames captured so far stay on disk untrimmed; no manifest is written.
    Cancelled { frames_captured: u64 },
}

/// Drives one recording: executes the tape while capturing frames at a fixed
/// rate, then trims the frames to the active window and writes the manifest.
pub struct Recorder {
    terminal: Arc<dyn Terminal>,
    options: SessionOptions,
    config: RecorderConfig,
}

impl Recorder {
    pub fn new(
        terminal: Arc<dyn Terminal>,
        options: SessionOptions,
        config: RecorderConfig,
    ) -> Self {
        Self {
            terminal,
            options,
            config,
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn record(&self, tape: &Tape, cancel: &CancelToken) -> Result<RecordingOutcome> {
        let span = info_span!(
            "recording",
            frames_dir = %self.config.frames_dir.display(),
            framerate = self.options.framerate
        );
        let _entered = span.enter();

        let frames_dir = self.config.frames_dir.as_path();
        fs::create_dir_all(frames_dir)
            .with_context(|| format!("failed to create frames dir {}", frames_dir.display()))?;
        remove_frame_files(frames_dir)?;

        let terminal = self.terminal.as_ref();
        let state = SessionState::new();
        let queue = WriteBehindQueue::spawn(self.config.write_queue_capacity, span.clone())?;
        let monitor = ActivityMonitor::new(
            terminal,
            &state,
            self.config.activity_poll_interval,
            span.clone(),
        );
        monitor.snapshot_baseline();
        let scheduler = FrameScheduler::new(
            terminal,
            &state,
            &monitor,
            &queue,
            frames_dir,
            self.options.frame_interval(),
            span.clone(),
        );
        let mut executor = CommandExecutor::new(
            terminal,
            &self.options,
            &state,
            &monitor,
            cancel,
            self.config.key_failure,
            self.config.activity_poll_interval,
            span.clone(),
        );

        info!(statements = tape.statements.len(), "recording started");
        let stop = CancelToken::new();
        let execution = thread::scope(|scope| -> Result<ExecutionReport> {
            let scheduler_handle = thread::Builder::new()
                .name("termtape-frame-scheduler".to_owned())
                .spawn_scoped(scope, || scheduler.run(&stop))
                .context("failed to spawn frame scheduler thread")?;
            let monitor_handle = match thread::Builder::new()
                .name("termtape-activity-monitor".to_owned())
                .spawn_scoped(scope, || monitor.run(&stop))
            {
                Ok(handle) => handle,
                Err(error) => {
                    stop.cancel();
                    return Err(error).context("failed to spawn activity monitor thread");
                }
            };

            let result = {
                let _stop_observers = StopOnDrop(&stop);
                executor.run(&tape.statements)
            };

            let scheduler_joined = scheduler_handle.join();
            let monitor_joined = monitor_handle.join();
            scheduler_joined.map_err(|_| anyhow!("frame scheduler thread panicked"))?;
            monitor_joined.map_err(|_| anyhow!("activity monitor thread panicked"))?;
            result
        });
        drop(scheduler);

        let writes = queue.finish()?;
        let execution = execution?;
        for failed in &writes.failed {
            let frame_number = failed
                .path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(parse_frame_file_name)
                .map(|(_, frame_number)| frame_number);
            if let Some(frame_number) = frame_number {
                state.hide_frame(frame_number);
            }
        }

        let frames_captured = state.frames_captured();
        if cancel.is_cancelled() {
            warn!(frames_captured, "recording cancelled; frames left untrimmed");
            return Ok(RecordingOutcome::Cancelled { frames_captured });
        }

        let activity = state.activity();
        let window = keep_window(
            activity.first.map(|mark| mark.frame_number),
            activity.last.map(|mark| mark.frame_number),
            self.options.start_buffer_frames(),
            self.options.end_buffer_frames(),
        );
        let trimmed = trim_frames(frames_dir, &state.frames(), window)?;

        let layers = trimmed.layers.iter().cloned().collect::<Vec<_>>();
        let manifest = build_manifest(&trimmed.frames, &layers, &self.options);
        let manifest_path = write_manifest(frames_dir, &self.config.manifest_name, &manifest)?;
        let concat_scripts = write_concat_scripts(frames_dir, &manifest)?;

        info!(
            frames_captured,
            frames_kept = trimmed.frames.len(),
            failed_writes = writes.failed.len(),
            manifest = %manifest_path.display(),
            "recording finished"
        );

        Ok(RecordingOutcome::Completed(RecordingSummary {
            frames_captured,
            frames_kept: trimmed.frames.len(),
            failed_writes: writes.failed.len(),
            window,
            activity,
            execution,
            manifest_path,
            concat_scripts,
        }))
    }
}

/// Stops the capture loops even if the executor unwinds, so the thread scope
/// can join them.
struct StopOnDrop<'a>(&'a CancelToken);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

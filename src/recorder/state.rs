use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

/// A moment when the terminal changed (or was declared active), attributed to
/// the most recently captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActivityMark {
    #[serde(rename = "timestamp_ms", serialize_with = "crate::millis::serialize")]
    pub timestamp: Duration,
    pub frame_number: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActivityWindow {
    pub first: Option<ActivityMark>,
    pub last: Option<ActivityMark>,
}

impl ActivityWindow {
    fn record(&mut self, mark: ActivityMark) {
        if self.first.is_none() {
            self.first = Some(mark);
        }
        self.last = Some(mark);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameMetadata {
    pub frame_number: u64,
    /// Offset from the start of the recording.
    #[serde(rename = "timestamp_ms", serialize_with = "crate::millis::serialize")]
    pub timestamp: Duration,
    /// Cleared when the frame never reached disk.
    pub is_visible: bool,
}

/// Mutable state of one recording, shared by the executor, the frame
/// scheduler and the activity monitor. All of them read the same clock.
#[derive(Debug)]
pub struct SessionState {
    clock: Instant,
    frames_captured: AtomicU64,
    capturing: AtomicBool,
    current_command: Mutex<String>,
    activity: Mutex<ActivityWindow>,
    frames: Mutex<Vec<FrameMetadata>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            clock: Instant::now(),
            frames_captured: AtomicU64::new(0),
            capturing: AtomicBool::new(true),
            current_command: Mutex::new(String::new()),
            activity: Mutex::new(ActivityWindow::default()),
            frames: Mutex::new(Vec::new()),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Acquire)
    }

    pub fn set_capturing(&self, capturing: bool) {
        self.capturing.store(capturing, Ordering::Release);
    }

    pub fn set_current_command(&self, description: String) {
        *lock(&self.current_command) = description;
    }

    pub fn current_command(&self) -> String {
        lock(&self.current_command).clone()
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured.load(Ordering::Acquire)
    }

    /// Assigns the next dense, 1-based frame number and records its timestamp.
    pub fn record_frame(&self) -> FrameMetadata {
        let mut frames = lock(&self.frames);
        let frame = FrameMetadata {
            frame_number: self.frames_captured.load(Ordering::Acquire) + 1,
            timestamp: self.elapsed(),
            is_visible: true,
        };
        frames.push(frame);
        self.frames_captured
            .store(frame.frame_number, Ordering::Release);
        frame
    }

    pub fn mark_activity(&self, frame_number: u64) -> ActivityMark {
        let mark = ActivityMark {
            timestamp: self.elapsed(),
            frame_number,
        };
        lock(&self.activity).record(mark);
        mark
    }

    pub fn activity(&self) -> ActivityWindow {
        *lock(&self.activity)
    }

    pub fn frames(&self) -> Vec<FrameMetadata> {
        lock(&self.frames).clone()
    }

    pub fn hide_frame(&self, frame_number: u64) {
        let mut frames = lock(&self.frames);
        if let Some(frame) = frames
            .iter_mut()
            .find(|frame| frame.frame_number == frame_number)
        {
            frame.is_visible = false;
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn, Span};

use crate::cancel::CancelToken;
use crate::terminal::Terminal;
use crate::trim::frame_file_name;

use super::monitor::ActivityMonitor;
use super::state::SessionState;
use super::writer::WriteBehindQueue;

/// Fixed-rate tick schedule measured against the session clock.
///
/// Each tick is one interval after the previous one. When the loop falls
/// behind, the schedule restarts from the current time instead of firing a
/// burst of catch-up ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSchedule {
    interval: Duration,
    next_tick: Duration,
}

impl TickSchedule {
    pub fn new(interval: Duration, start: Duration) -> Self {
        Self {
            interval,
            next_tick: start,
        }
    }

    pub fn next_tick(&self) -> Duration {
        self.next_tick
    }

    /// Moves to the next tick. Returns how long to wait for it, or `None` when
    /// `now` is already past it and the schedule was resynchronized.
    pub fn advance(&mut self, now: Duration) -> Option<Duration> {
        self.next_tick += self.interval;
        if now >= self.next_tick {
            self.next_tick = now;
            None
        } else {
            Some(self.next_tick - now)
        }
    }
}

pub struct FrameScheduler<'a> {
    terminal: &'a dyn Terminal,
    state: &'a SessionState,
    monitor: &'a ActivityMonitor<'a>,
    queue: &'a WriteBehindQueue,
    frames_dir: &'a Path,
    interval: Duration,
    span: Span,
}

impl<'a> FrameScheduler<'a> {
    pub fn new(
        terminal: &'a dyn Terminal,
        state: &'a SessionState,
        monitor: &'a ActivityMonitor<'a>,
        queue: &'a WriteBehindQueue,
        frames_dir: &'a Path,
        interval: Duration,
        span: Span,
    ) -> Self {
        Self {
            terminal,
            state,
            monitor,
            queue,
            frames_dir,
            interval,
            span,
        }
    }

    /// Captures a frame on every tick while capturing is enabled, until `stop`
    /// is cancelled. Ticks keep advancing while capture is hidden.
    pub fn run(&self, stop: &CancelToken) {
        let _entered = self.span.enter();
        debug!(interval_us = self.interval.as_micros() as u64, "frame scheduler started");

        let mut schedule = TickSchedule::new(self.interval, self.state.elapsed());
        while !stop.is_cancelled() {
            if self.state.is_capturing() {
                if let Err(error) = self.capture_one() {
                    warn!(
                        error = %format!("{error:#}"),
                        command = %self.state.current_command(),
                        "frame capture failed"
                    );
                }
            }

            match schedule.advance(self.state.elapsed()) {
                Some(wait) => {
                    if !stop.sleep(wait) {
                        break;
                    }
                }
                None => {
                    debug!(
                        next_tick_ms = schedule.next_tick().as_millis() as u64,
                        "frame scheduler fell behind; resynchronized"
                    );
                }
            }
        }

        debug!(frames = self.state.frames_captured(), "frame scheduler stopped");
    }

    fn capture_one(&self) -> Result<u64> {
        let frame = self.terminal.capture_frame()?;
        let metadata = self.state.record_frame();
        for layer in frame.layers {
            let path = self
                .frames_dir
                .join(frame_file_name(&layer.name, metadata.frame_number));
            self.queue.enqueue(path, layer.png)?;
        }
        self.monitor.frame_captured(metadata.frame_number);
        Ok(metadata.frame_number)
    }
}

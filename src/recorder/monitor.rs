use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, trace, warn, Span};

use crate::cancel::CancelToken;
use crate::terminal::Terminal;
use crate::trim::FRAME_BASE_INDEX;

use super::state::{ActivityMark, SessionState};

/// Watches the terminal buffer and records the first and last frame at which
/// it changed. Activity is attributed to the latest captured frame.
pub struct ActivityMonitor<'a> {
    terminal: &'a dyn Terminal,
    state: &'a SessionState,
    poll_interval: Duration,
    latest_frame: AtomicU64,
    baseline: Mutex<Option<String>>,
    span: Span,
}

impl<'a> ActivityMonitor<'a> {
    pub fn new(
        terminal: &'a dyn Terminal,
        state: &'a SessionState,
        poll_interval: Duration,
        span: Span,
    ) -> Self {
        Self {
            terminal,
            state,
            poll_interval,
            latest_frame: AtomicU64::new(0),
            baseline: Mutex::new(None),
            span,
        }
    }

    /// Reads the buffer once so the shell's initial prompt is not counted as
    /// activity.
    pub fn snapshot_baseline(&self) {
        match self.terminal.buffer_text() {
            Ok(text) => {
                *self.baseline.lock().unwrap_or_else(PoisonError::into_inner) = Some(text);
            }
            Err(error) => {
                warn!(error = %format!("{error:#}"), "failed to read baseline buffer");
            }
        }
    }

    /// Called by the frame scheduler after each successful capture.
    pub fn frame_captured(&self, frame_number: u64) {
        self.latest_frame.fetch_max(frame_number, Ordering::AcqRel);
    }

    pub fn latest_frame(&self) -> u64 {
        self.latest_frame.load(Ordering::Acquire)
    }

    /// Records activity at the current frame without looking at the buffer.
    /// Before the first capture the mark lands on the first frame.
    pub fn mark_activity(&self) -> ActivityMark {
        let frame_number = self.latest_frame().max(FRAME_BASE_INDEX);
        let mark = self.state.mark_activity(frame_number);
        trace!(frame = mark.frame_number, "activity marked");
        mark
    }

    pub fn run(&self, stop: &CancelToken) {
        let _entered = self.span.enter();
        let mut previous = self
            .baseline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        debug!(interval_ms = self.poll_interval.as_millis() as u64, "activity monitor started");

        while stop.sleep(self.poll_interval) {
            let current = match self.terminal.buffer_text() {
                Ok(text) => text,
                Err(error) => {
                    warn!(error = %format!("{error:#}"), "failed to poll terminal buffer");
                    continue;
                }
            };
            match previous.as_deref() {
                Some(text) if text == current => {}
                Some(_) => {
                    self.mark_activity();
                    previous = Some(current);
                }
                None => previous = Some(current),
            }
        }

        debug!("activity monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use anyhow::{anyhow, Result};

    use crate::tape::Modifier;
    use crate::terminal::CapturedFrame;

    #[derive(Default)]
    struct ScriptedBuffer {
        text: Mutex<String>,
    }

    impl ScriptedBuffer {
        fn set(&self, text: &str) {
            *self.text.lock().expect("buffer") = text.to_owned();
        }
    }

    impl Terminal for ScriptedBuffer {
        fn send_text(&self, _text: &str) -> Result<()> {
            Ok(())
        }
        fn send_key(&self, _key: &str) -> Result<()> {
            Ok(())
        }
        fn send_modifier_combo(&self, _modifiers: &[Modifier], _key: &str) -> Result<()> {
            Ok(())
        }
        fn buffer_text(&self) -> Result<String> {
            Ok(self.text.lock().expect("buffer").clone())
        }
        fn last_line(&self) -> Result<String> {
            self.buffer_text()
        }
        fn capture_frame(&self) -> Result<CapturedFrame> {
            Err(anyhow!("not used"))
        }
    }

    #[test]
    fn forced_mark_uses_latest_frame() {
        let terminal = ScriptedBuffer::default();
        let state = SessionState::new();
        let monitor =
            ActivityMonitor::new(&terminal, &state, Duration::from_millis(5), Span::none());
        monitor.frame_captured(7);
        monitor.frame_captured(3);
        assert_eq!(monitor.mark_activity().frame_number, 7);
        assert_eq!(state.activity().first.map(|mark| mark.frame_number), Some(7));
    }

    #[test]
    fn mark_before_first_capture_lands_on_first_frame() {
        let terminal = ScriptedBuffer::default();
        let state = SessionState::new();
        let monitor =
            ActivityMonitor::new(&terminal, &state, Duration::from_millis(5), Span::none());
        assert_eq!(monitor.latest_frame(), 0);
        assert_eq!(monitor.mark_activity().frame_number, 1);
        assert_eq!(state.activity().first.map(|mark| mark.frame_number), Some(1));
    }

    #[test]
    fn unchanged_baseline_is_not_activity() {
        let terminal = ScriptedBuffer::default();
        terminal.set("$ ");
        let state = SessionState::new();
        let monitor =
            ActivityMonitor::new(&terminal, &state, Duration::from_millis(2), Span::none());
        monitor.snapshot_baseline();
        let stop = CancelToken::new();

        thread::scope(|scope| {
            scope.spawn(|| monitor.run(&stop));
            thread::sleep(Duration::from_millis(30));
            assert_eq!(state.activity().first, None);

            monitor.frame_captured(4);
            terminal.set("$ ls");
            thread::sleep(Duration::from_millis(30));
            stop.cancel();
        });

        let window = state.activity();
        assert_eq!(window.first.map(|mark| mark.frame_number), Some(4));
        assert_eq!(window.last.map(|mark| mark.frame_number), Some(4));
    }
}

use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, error, Span};

struct WriteRequest {
    path: PathBuf,
    bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedWrite {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: usize,
    pub failed: Vec<FailedWrite>,
}

/// Bounded FIFO of pending file writes drained by one background thread.
/// `enqueue` blocks while the queue is full, so a slow disk slows capture
/// down instead of growing memory.
pub struct WriteBehindQueue {
    sender: Option<mpsc::SyncSender<WriteRequest>>,
    worker: Option<JoinHandle<WriteReport>>,
}

impl WriteBehindQueue {
    pub fn spawn(capacity: usize, span: Span) -> Result<Self> {
        let (sender, receiver) = mpsc::sync_channel::<WriteRequest>(capacity);

        let worker = thread::Builder::new()
            .name("termtape-frame-writer".to_owned())
            .spawn(move || {
                let _entered = span.enter();
                drain(receiver)
            })
            .context("failed to spawn frame writer thread")?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    pub fn enqueue(&self, path: PathBuf, bytes: Vec<u8>) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("frame writer has already been finished"))?;
        sender
            .send(WriteRequest { path, bytes })
            .map_err(|_| anyhow!("failed to enqueue frame write; writer thread is gone"))
    }

    /// Closes the queue and waits until every pending write has been attempted.
    pub fn finish(mut self) -> Result<WriteReport> {
        drop(self.sender.take());

        let handle = self
            .worker
            .take()
            .ok_or_else(|| anyhow!("frame writer thread missing"))?;
        handle
            .join()
            .map_err(|_| anyhow!("frame writer thread panicked"))
    }
}

fn drain(receiver: mpsc::Receiver<WriteRequest>) -> WriteReport {
    let mut report = WriteReport::default();
    for request in receiver {
        match fs::write(&request.path, &request.bytes) {
            Ok(()) => {
                debug!(path = %request.path.display(), bytes = request.bytes.len(), "frame written");
                report.written += 1;
            }
            Err(io_error) => {
                error!(path = %request.path.display(), error = %io_error, "frame write failed");
                report.failed.push(FailedWrite {
                    path: request.path,
                    error: io_error.to_string(),
                });
            }
        }
    }
    report
}

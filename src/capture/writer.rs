//! Append-only capture writer.
//!
//! The relay holds a [`CaptureWriter`] and hands records over without
//! waiting. A [`CaptureSink`] task owns the file and writes one line per
//! record.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::capture::{CaptureError, CaptureRecord};

/// Records queued before new ones are dropped.
pub const DEFAULT_QUEUE: usize = 1024;

/// Sending half, cheap to clone.
#[derive(Debug, Clone)]
pub struct CaptureWriter {
    tx: mpsc::Sender<CaptureRecord>,
}

/// Background half: drains the queue into the capture file.
#[derive(Debug)]
pub struct CaptureSink {
    rx: mpsc::Receiver<CaptureRecord>,
    file: File,
    path: PathBuf,
}

/// Open (or create) the capture file for appending.
pub fn open(path: &Path, queue: usize) -> Result<(CaptureWriter, CaptureSink), CaptureError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let (tx, rx) = mpsc::channel(queue.max(1));
    Ok((
        CaptureWriter { tx },
        CaptureSink {
            rx,
            file: File::from_std(file),
            path: path.to_path_buf(),
        },
    ))
}

impl CaptureWriter {
    /// Queue a record. Never waits; drops the record if the queue is full.
    pub fn record(&self, record: CaptureRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                tracing::warn!(path = %record.path, "Capture queue full, record dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Capture writer closed, record dropped");
            }
        }
    }
}

impl CaptureSink {
    /// Write records until every writer is dropped. Returns the number written.
    pub async fn run(mut self) -> Result<u64, CaptureError> {
        tracing::info!(path = %self.path.display(), "Capturing target requests");
        let mut written = 0;
        while let Some(record) = self.rx.recv().await {
            let mut line = serde_json::to_vec(&record)?;
            line.push(b'\n');
            self.file.write_all(&line).await?;
            self.file.flush().await?;
            written += 1;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::read_capture;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("capture-{}.jsonl", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn writes_one_line_per_record() {
        let path = temp_path();
        let (writer, sink) = open(&path, 8).unwrap();
        let task = tokio::spawn(sink.run());

        writer.record(CaptureRecord::new("POST", "/v1/responses", br#"{"a":1}"#));
        writer.record(CaptureRecord::new("POST", "/v1/chat/completions", b"raw"));
        drop(writer);

        assert_eq!(task.await.unwrap().unwrap(), 2);
        let log = read_capture(&path).unwrap();
        assert_eq!(log.records.len(), 2);
        assert_eq!(log.records[1].raw_body.as_deref(), Some("raw"));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let path = temp_path();
        let (writer, sink) = open(&path, 1).unwrap();

        // Sink not running yet: the second record has nowhere to go.
        writer.record(CaptureRecord::new("POST", "/a", b"{}"));
        writer.record(CaptureRecord::new("POST", "/b", b"{}"));
        drop(writer);

        assert_eq!(sink.run().await.unwrap(), 1);
        let log = read_capture(&path).unwrap();
        assert_eq!(log.records[0].path, "/a");
        let _ = std::fs::remove_file(path);
    }
}

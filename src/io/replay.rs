//! JSON Lines detection source
//!
//! Each non-empty line is one frame's batch, in the same shape the detector
//! publishes over MQTT. Lines that fail to parse are skipped with a warning.

use crate::domain::types::DetectionBatch;
use crate::infra::metrics::Metrics;
use crate::io::mqtt::parse_detection_payload;
use anyhow::Context;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Iterator over detection batches in a JSONL stream
pub struct DetectionReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
    skipped: usize,
}

impl DetectionReader<BufReader<File>> {
    /// Open a JSONL detections file
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open detections file {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> DetectionReader<R> {
    pub fn new(reader: R) -> Self {
        Self { lines: reader.lines(), line_no: 0, skipped: 0 }
    }

    /// Lines skipped so far (unreadable or unparsable)
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<R: BufRead> Iterator for DetectionReader<R> {
    type Item = DetectionBatch;

    fn next(&mut self) -> Option<DetectionBatch> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                // Invalid UTF-8 consumes the line; any other read error ends the stream
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    self.line_no += 1;
                    self.skipped += 1;
                    warn!(line = %self.line_no, error = %e, "detections_line_unreadable");
                    continue;
                }
                Err(e) => {
                    warn!(line = %(self.line_no + 1), error = %e, "detections_read_failed");
                    return None;
                }
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match parse_detection_payload(trimmed.as_bytes()) {
                Ok(batch) => return Some(batch),
                Err(e) => {
                    self.skipped += 1;
                    warn!(line = %self.line_no, error = %e, "detections_line_malformed");
                }
            }
        }
    }
}

/// Feed a detections file into the cycle channel, then close it
///
/// Uses a blocking send so a file replay never drops frames; the monitor
/// loop ends when the channel closes.
pub async fn start_file_source(
    path: String,
    batch_tx: mpsc::Sender<DetectionBatch>,
    metrics: Arc<Metrics>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let reader = DetectionReader::open(&path)?;
    info!(file = %path, "file_source_started");

    let sent = tokio::task::spawn_blocking(move || {
        let mut reader = reader;
        let mut sent = 0usize;
        for batch in reader.by_ref() {
            metrics.record_frame_received();
            if batch_tx.blocking_send(batch).is_err() {
                break;
            }
            sent += 1;
        }
        for _ in 0..reader.skipped() {
            metrics.record_frame_malformed();
        }
        sent
    })
    .await?;

    info!(file = %path, frames = %sent, "file_source_finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    #[test]
    fn test_reader_skips_blank_and_malformed_lines() {
        let input = concat!(
            "{\"frame\": 1, \"boxes\": [[0, 0, 10, 10]]}\n",
            "\n",
            "garbage\n",
            "{\"frame\": 2, \"boxes\": []}\n",
            "   \n",
            "[[5, 5, 15, 15]]\n",
        );
        let mut reader = DetectionReader::new(Cursor::new(input));

        let batches: Vec<DetectionBatch> = reader.by_ref().collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].frame, Some(1));
        assert_eq!(batches[1].frame, Some(2));
        assert_eq!(batches[2].boxes.len(), 1);
        assert_eq!(reader.skipped(), 1);
    }

    #[test]
    fn test_reader_skips_invalid_utf8_line() {
        let input: &[u8] = b"{\"frame\": 1, \"boxes\": []}\n\xff\xfe\n{\"frame\": 3, \"boxes\": []}\n";
        let mut reader = DetectionReader::new(Cursor::new(input));

        let frames: Vec<Option<u64>> = reader.by_ref().map(|b| b.frame).collect();
        assert_eq!(frames, vec![Some(1), Some(3)]);
        assert_eq!(reader.skipped(), 1);
    }

    /// Reader whose every read fails without making progress
    struct FailingRead;

    impl std::io::Read for FailingRead {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(ErrorKind::Other, "device error"))
        }
    }

    #[test]
    fn test_reader_stops_on_io_error() {
        let mut reader = DetectionReader::new(BufReader::new(FailingRead));
        assert!(reader.next().is_none());
        assert_eq!(reader.skipped(), 0);
    }

    #[test]
    fn test_open_missing_file() {
        assert!(DetectionReader::open("/nonexistent/detections.jsonl").is_err());
    }

    #[tokio::test]
    async fn test_file_source_feeds_channel() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{\"frame\": 1, \"boxes\": [[0, 0, 10, 10]]}}").unwrap();
        writeln!(file, "{{\"frame\": 2, \"boxes\": []}}").unwrap();
        writeln!(file, "not json").unwrap();
        file.flush().unwrap();

        let metrics = Arc::new(Metrics::new());
        let (tx, mut rx) = mpsc::channel(8);
        let path = file.path().to_str().unwrap().to_string();

        start_file_source(path, tx, metrics.clone()).await.unwrap();

        let mut frames = Vec::new();
        while let Some(batch) = rx.recv().await {
            frames.push(batch.frame);
        }
        assert_eq!(frames, vec![Some(1), Some(2)]);
        assert_eq!(metrics.frames_received(), 2);
        assert_eq!(metrics.frames_malformed(), 1);
    }
}

//! Report egress to file
//!
//! Cycle reports are written in JSONL format (one JSON object per line)
//! to the file named in `[sink] file`.

use crate::domain::report::ReportEnvelope;
use crate::io::sink::ReportSink;
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// JSONL writer for cycle reports
pub struct FileSink {
    file_path: String,
}

impl FileSink {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "file_sink_initialized");
        Self { file_path: file_path.to_string() }
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Append a line to the egress file
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        debug!(file = %self.file_path, bytes = %line.len(), "report_written");

        Ok(())
    }
}

#[async_trait]
impl ReportSink for FileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn deliver(&self, envelope: &ReportEnvelope) -> anyhow::Result<()> {
        self.append_line(&envelope.to_json())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::{CycleReport, IllegalCar, ILLEGAL_PARKING_MSG};
    use chrono::Utc;
    use std::fs;
    use tempfile::tempdir;

    fn envelope(cycle: u64, illegal: usize) -> ReportEnvelope {
        let illegal_cars: Vec<IllegalCar> = (0..illegal)
            .map(|i| IllegalCar { id: i as u64, duration: 30, x: 10, y: 20, msg: ILLEGAL_PARKING_MSG })
            .collect();
        ReportEnvelope {
            site: "lot-a".to_string(),
            session: "session".to_string(),
            cycle,
            frame: Some(cycle * 30),
            timestamp: Utc::now(),
            report: CycleReport { slots: vec![], illegal_count: illegal_cars.len(), illegal_cars },
            alerts: vec![],
        }
    }

    #[tokio::test]
    async fn test_write_reports_as_jsonl() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("reports.jsonl");
        let sink = FileSink::new(file_path.to_str().unwrap());

        sink.deliver(&envelope(1, 0)).await.unwrap();
        sink.deliver(&envelope(2, 2)).await.unwrap();

        let content = fs::read_to_string(&file_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(content.ends_with('\n'));

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["cycle"], 2);
        assert_eq!(second["frame"], 60);
        assert_eq!(second["illegal_count"], 2);
        assert_eq!(second["illegal_cars"][1]["msg"], "Illegal Parking");
    }

    #[tokio::test]
    async fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("nested").join("deeper").join("reports.jsonl");
        let sink = FileSink::new(file_path.to_str().unwrap());

        sink.deliver(&envelope(1, 0)).await.unwrap();
        assert!(file_path.exists());
    }

    #[tokio::test]
    async fn test_unwritable_path_is_error() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened for append
        let sink = FileSink::new(dir.path().to_str().unwrap());
        assert!(sink.deliver(&envelope(1, 0)).await.is_err());
    }
}

//! Append-only JSON Lines file sink.
//!
//! One [`StoredRecord`] per line. Writes are serialized through a mutex so
//! concurrent uploads never interleave partial lines. A line left torn by a
//! failed write is terminated before the next record, so it costs only itself.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

use civic_models::{DetectionClass, DetectionRecord, StoredRecord};

use crate::error::{StoreError, StoreResult};
use crate::sink::DetectionSink;

pub struct JsonlSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlSink {
    /// Open (creating parent directories if needed) a records file.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        OpenOptions::new().create(true).append(true).open(&path).await?;

        info!(path = %path.display(), "Records file ready");
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every parseable record, newest first.
    async fn load_newest_first(&self) -> StoreResult<Vec<StoredRecord>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = line_no + 1, error = %e, "Skipping malformed record"),
            }
        }
        records.reverse();
        Ok(records)
    }
}

/// Whether the file's last byte is something other than a newline.
async fn ends_mid_line(file: &mut File) -> std::io::Result<bool> {
    if file.metadata().await?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}

#[async_trait]
impl DetectionSink for JsonlSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn append(&self, record: &DetectionRecord) -> StoreResult<StoredRecord> {
        let stored = StoredRecord::new(record.clone());
        let json = serde_json::to_string(&stored)?;

        let _guard = self.write_lock.lock().await;

        // Nothing is written until the file is open and its tail checked
        let unavailable = |e: std::io::Error| {
            StoreError::unavailable(format!("{}: {}", self.path.display(), e))
        };
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(unavailable)?;
        let torn = ends_mid_line(&mut file).await.map_err(unavailable)?;
        if torn {
            warn!(path = %self.path.display(), "Records file ends mid-line, starting a new line");
        }

        let mut line = String::with_capacity(json.len() + 2);
        if torn {
            line.push('\n');
        }
        line.push_str(&json);
        line.push('\n');

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(stored)
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<StoredRecord>> {
        let mut records = self.load_newest_first().await?;
        records.truncate(limit);
        Ok(records)
    }

    async fn by_class(&self, class: DetectionClass, limit: usize) -> StoreResult<Vec<StoredRecord>> {
        Ok(self
            .load_newest_first()
            .await?
            .into_iter()
            .filter(|r| r.record.contains_class(class))
            .take(limit)
            .collect())
    }

    async fn check_ready(&self) -> StoreResult<()> {
        fs::metadata(&self.path)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::unavailable(format!("{}: {}", self.path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_models::{BoundingBox, Detection, OperatingMode, UploadProvenance};
    use std::sync::Arc;

    fn record(name: &str, class: DetectionClass) -> DetectionRecord {
        DetectionRecord::new(
            UploadProvenance::new(name),
            OperatingMode::Normal,
            vec![Detection::new(class, 0.8, BoundingBox::new(1.0, 1.0, 4.0, 4.0))],
        )
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::open(dir.path().join("nested/records.jsonl")).await.unwrap();

        let first = sink.append(&record("a.jpg", DetectionClass::Fire)).await.unwrap();
        sink.append(&record("b.jpg", DetectionClass::Garbage)).await.unwrap();

        let recent = sink.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].record.filename(), "b.jpg");
        assert_eq!(recent[1], first);

        let fires = sink.by_class(DetectionClass::Fire, 10).await.unwrap();
        assert_eq!(fires.len(), 1);
        assert_eq!(fires[0].id, first.id);
    }

    #[tokio::test]
    async fn test_survives_reopen_and_skips_garbage_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        {
            let sink = JsonlSink::open(&path).await.unwrap();
            sink.append(&record("a.jpg", DetectionClass::Pothole)).await.unwrap();
        }
        tokio::fs::write(
            &path,
            format!("{}not json\n", tokio::fs::read_to_string(&path).await.unwrap()),
        )
        .await
        .unwrap();

        let sink = JsonlSink::open(&path).await.unwrap();
        sink.append(&record("b.jpg", DetectionClass::Pothole)).await.unwrap();
        let recent = sink.recent(10).await.unwrap();
        let names: Vec<_> = recent.iter().map(|r| r.record.filename()).collect();
        assert_eq!(names, vec!["b.jpg", "a.jpg"]);
    }

    #[tokio::test]
    async fn test_append_after_torn_write_starts_new_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let sink = JsonlSink::open(&path).await.unwrap();
        let first = sink.append(&record("a.jpg", DetectionClass::Fire)).await.unwrap();

        // Half of a record with no trailing newline, as a failed write leaves it
        let mut file = OpenOptions::new().append(true).open(&path).await.unwrap();
        file.write_all(b"{\"id\":\"half-writ").await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        let second = sink.append(&record("b.jpg", DetectionClass::Fire)).await.unwrap();

        let recent = sink.recent(10).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert!(contents.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_open_failure_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let sink = JsonlSink::open(&path).await.unwrap();

        tokio::fs::remove_file(&path).await.unwrap();
        tokio::fs::create_dir(&path).await.unwrap();

        let err = sink.append(&record("a.jpg", DetectionClass::Fire)).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(err.is_retryable_append());
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(JsonlSink::open(dir.path().join("records.jsonl")).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..20 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                sink.append(&record(&format!("{}.jpg", i), DetectionClass::Garbage))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(sink.recent(100).await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_check_ready_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let sink = JsonlSink::open(&path).await.unwrap();
        assert!(sink.check_ready().await.is_ok());

        tokio::fs::remove_file(&path).await.unwrap();
        assert!(matches!(sink.check_ready().await, Err(StoreError::Unavailable(_))));
    }
}

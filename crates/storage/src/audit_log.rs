use std::io::ErrorKind;
use std::path::PathBuf;

use common::config::Settings;
use common::errors::ServiceResult;
use common::models::AuditRecord;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Append-only JSONL trail of served predictions.
pub struct AuditLogger {
    path: PathBuf,
    limit: usize,
    lock: Mutex<()>,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            path: path.into(),
            limit: limit.max(1),
            lock: Mutex::new(()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.audit_log_file, settings.audit_log_limit)
    }

    pub async fn log_prediction(&self, record: &AuditRecord) -> ServiceResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        debug!("Audited prediction {}", record.request_id);
        Ok(())
    }

    /// Most recent records, oldest first, capped at the configured limit.
    /// `None` or zero means the configured limit.
    pub async fn get_recent(&self, limit: Option<usize>) -> ServiceResult<Vec<AuditRecord>> {
        let limit = limit.filter(|&n| n > 0).unwrap_or(self.limit).min(self.limit);
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(limit);
        let mut records = Vec::with_capacity(lines.len() - start);
        for line in &lines[start..] {
            match serde_json::from_str::<AuditRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable audit line in {}: {}", self.path.display(), e),
            }
        }
        Ok(records)
    }

    pub async fn clear(&self) -> ServiceResult<()> {
        let _guard = self.lock.lock().await;
        match fs::metadata(&self.path).await {
            Ok(_) => fs::write(&self.path, b"").await?,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

//! Audit log implementations.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::AuditResult;
use crate::record::AuditRecord;

/// Trait implemented by append-only audit stores.
///
/// `append` must only return `Ok` once the record is durable; callers rely on
/// that to gate transfer authorization.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Appends a record to the log.
    async fn append(&self, record: &AuditRecord) -> AuditResult<()>;

    /// Returns the most recent `limit` records, ordered oldest to newest.
    async fn tail(&self, limit: usize) -> AuditResult<Vec<AuditRecord>>;
}

/// File-backed log writing newline-delimited JSON entries.
///
/// A write that fails partway is cut back to the last whole line. Lines that
/// still fail to parse (for example after a crash) are skipped by `tail`.
pub struct FileAuditLog {
    path: PathBuf,
    writer: Mutex<Writer>,
}

struct Writer {
    file: File,
    // The file ends in a partial line; the next record starts on a new one.
    torn: bool,
}

impl FileAuditLog {
    /// Opens (or creates) an audit log file at the provided path.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors encountered while preparing the file.
    pub async fn open(path: impl Into<PathBuf>) -> AuditResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let torn = ends_mid_line(&path).await?;
        if torn {
            warn!(path = %path.display(), "audit log ends in a partial line");
        }

        Ok(Self {
            path,
            writer: Mutex::new(Writer { file, torn }),
        })
    }

    /// Returns the underlying path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for FileAuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAuditLog")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AuditLog for FileAuditLog {
    async fn append(&self, record: &AuditRecord) -> AuditResult<()> {
        // One buffer per record so a line is never split across writes.
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        if writer.torn {
            line.insert(0, b'\n');
        }
        let committed = writer.file.metadata().await?.len();
        if let Err(err) = write_line(&mut writer.file, &line).await {
            if let Err(truncate) = writer.file.set_len(committed).await {
                warn!(
                    path = %self.path.display(),
                    error = %truncate,
                    "could not cut back a partial audit line"
                );
                writer.torn = true;
            }
            return Err(err.into());
        }
        writer.torn = false;
        writer.file.sync_data().await?;
        debug!(
            request_id = %record.request_id(),
            outcome = %record.outcome(),
            path = %self.path.display(),
            "audit record persisted"
        );
        Ok(())
    }

    async fn tail(&self, limit: usize) -> AuditResult<Vec<AuditRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let data = {
            let _guard = self.writer.lock().await;
            fs::read(&self.path).await?
        };

        let mut records = Vec::new();
        for (index, chunk) in data.split(|byte| *byte == b'\n').enumerate() {
            if chunk.is_empty() {
                continue;
            }
            match serde_json::from_slice::<AuditRecord>(chunk) {
                Ok(record) => records.push(record),
                Err(err) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %err,
                    "skipping unreadable audit line"
                ),
            }
        }

        let skip = records.len().saturating_sub(limit);
        Ok(records.into_iter().skip(skip).collect())
    }
}

async fn write_line(file: &mut File, line: &[u8]) -> std::io::Result<()> {
    file.write_all(line).await?;
    file.flush().await
}

async fn ends_mid_line(path: &Path) -> std::io::Result<bool> {
    let mut file = File::open(path).await?;
    if file.metadata().await?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0_u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}

/// Volatile audit log for dry runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record appended so far.
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, record: &AuditRecord) -> AuditResult<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn tail(&self, limit: usize) -> AuditResult<Vec<AuditRecord>> {
        let guard = self.records.lock().await;
        let skip = guard.len().saturating_sub(limit);
        Ok(guard.iter().skip(skip).cloned().collect())
    }
}

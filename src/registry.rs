//! Persisted alias ownership records.
//!
//! The first owner recorded for an alias keeps the short DNS name for good.
//! Records are never mutated once written.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::DnsError;

/// Ownership claim on a short alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasOwner {
    /// The alias.
    pub alias: String,
    /// User that first published it.
    pub owner_uuid: String,
}

/// Durable alias → owner registry.
#[async_trait]
pub trait AliasRegistry: Send + Sync {
    /// Current owner record for `alias`.
    async fn find(&self, alias: &str) -> Result<Option<AliasOwner>, DnsError>;

    /// Record a new owner. Existing records are left untouched.
    async fn insert(&self, record: AliasOwner) -> Result<(), DnsError>;
}

/// Registry kept only in memory.
#[derive(Debug, Default)]
pub struct MemoryAliasRegistry {
    records: Mutex<HashMap<String, AliasOwner>>,
}

impl MemoryAliasRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded aliases.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// True when nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AliasRegistry for MemoryAliasRegistry {
    async fn find(&self, alias: &str) -> Result<Option<AliasOwner>, DnsError> {
        Ok(self.records.lock().get(alias).cloned())
    }

    async fn insert(&self, record: AliasOwner) -> Result<(), DnsError> {
        self.records
            .lock()
            .entry(record.alias.clone())
            .or_insert(record);
        Ok(())
    }
}

/// Registry persisted as one JSON document per line.
#[derive(Debug)]
pub struct FileAliasRegistry {
    path: PathBuf,
    inner: Arc<Mutex<FileRegistryInner>>,
}

#[derive(Debug)]
struct FileRegistryInner {
    records: HashMap<String, AliasOwner>,
    file: File,
}

impl FileRegistryInner {
    /// Append `record` as one line. A failed write is truncated away so the
    /// file always ends on a record boundary.
    fn append(&mut self, record: AliasOwner) -> Result<bool, DnsError> {
        if self.records.contains_key(&record.alias) {
            return Ok(false);
        }

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        let end = self.file.metadata()?.len();
        if let Err(e) = self
            .file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.sync_data())
        {
            self.file.set_len(end)?;
            return Err(e.into());
        }

        self.records.insert(record.alias.clone(), record);
        Ok(true)
    }
}

impl FileAliasRegistry {
    /// Open (creating if needed) the registry at `path`.
    pub fn open(path: &Path) -> Result<Self, DnsError> {
        let mut records = HashMap::new();

        if path.exists() {
            let data = std::fs::read(path)?;
            // A crash mid-append leaves a line without its newline.
            let complete = data.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
            if complete < data.len() {
                warn!(path = %path.display(), bytes = data.len() - complete, "discarding torn alias record");
                OpenOptions::new()
                    .write(true)
                    .open(path)?
                    .set_len(complete as u64)?;
            }

            let text = String::from_utf8_lossy(&data[..complete]);
            for (idx, line) in text.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<AliasOwner>(line) {
                    Ok(record) => {
                        records.entry(record.alias.clone()).or_insert(record);
                    }
                    Err(e) => {
                        warn!(path = %path.display(), line = idx + 1, error = %e, "skipping malformed alias record");
                    }
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!(path = %path.display(), aliases = records.len(), "alias registry loaded");

        Ok(Self {
            path: path.to_path_buf(),
            inner: Arc::new(Mutex::new(FileRegistryInner { records, file })),
        })
    }

    /// Number of recorded aliases.
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// True when nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AliasRegistry for FileAliasRegistry {
    async fn find(&self, alias: &str) -> Result<Option<AliasOwner>, DnsError> {
        Ok(self.inner.lock().records.get(alias).cloned())
    }

    async fn insert(&self, record: AliasOwner) -> Result<(), DnsError> {
        let alias = record.alias.clone();
        let owner = record.owner_uuid.clone();
        let inner = self.inner.clone();

        let written = tokio::task::spawn_blocking(move || inner.lock().append(record))
            .await
            .map_err(std::io::Error::other)??;

        if written {
            debug!(
                path = %self.path.display(),
                alias = %alias,
                owner = %owner,
                "recorded alias owner"
            );
        }
        Ok(())
    }
}

//! Cache of parsed TrueType metrics
//!
//! Parsing a large font program for every document is slow, so metrics are
//! kept behind a lookup/populate interface keyed by the identity of the font
//! file. A missing or stale entry only costs a fresh parse.

use super::truetype::TrueTypeMetrics;
use crate::Result;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Identity of a font file: path, byte size and modification time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub path: String,
    pub size: u64,
    /// Seconds since the Unix epoch, when the platform reports it
    pub modified: Option<u64>,
}

impl CacheKey {
    /// Build the key from the file system entry at `path`
    pub fn for_file(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path)?;
        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs());
        Ok(Self {
            path: canonical.to_string_lossy().into_owned(),
            size: meta.len(),
            modified,
        })
    }

    /// Stable file-name-safe digest of the key
    pub fn digest(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.path.as_bytes());
        hasher.update(self.size.to_le_bytes());
        hasher.update(self.modified.unwrap_or(0).to_le_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

/// Key-value store for parsed metrics
pub trait MetricsCache {
    /// Cached metrics for `key`, if present and valid
    fn lookup(&self, key: &CacheKey) -> Option<TrueTypeMetrics>;

    /// Store metrics for `key`
    fn populate(&mut self, key: &CacheKey, metrics: &TrueTypeMetrics) -> Result<()>;
}

/// In-process cache
#[derive(Debug, Default)]
pub struct MemoryMetricsCache {
    entries: HashMap<CacheKey, TrueTypeMetrics>,
}

impl MemoryMetricsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MetricsCache for MemoryMetricsCache {
    fn lookup(&self, key: &CacheKey) -> Option<TrueTypeMetrics> {
        self.entries.get(key).cloned()
    }

    fn populate(&mut self, key: &CacheKey, metrics: &TrueTypeMetrics) -> Result<()> {
        self.entries.insert(key.clone(), metrics.clone());
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    key: CacheKey,
    metrics: TrueTypeMetrics,
}

/// JSON files in a directory, one per font file
#[derive(Debug, Clone)]
pub struct FileMetricsCache {
    dir: PathBuf,
}

impl FileMetricsCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.digest()))
    }
}

impl MetricsCache for FileMetricsCache {
    fn lookup(&self, key: &CacheKey) -> Option<TrueTypeMetrics> {
        let path = self.entry_path(key);
        let json = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<CacheEntry>(&json) {
            Ok(entry) if entry.key == *key => Some(entry.metrics),
            Ok(_) => None,
            Err(e) => {
                log::warn!("ignoring unreadable metrics cache {}: {e}", path.display());
                None
            }
        }
    }

    fn populate(&mut self, key: &CacheKey, metrics: &TrueTypeMetrics) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let entry = CacheEntry {
            key: key.clone(),
            metrics: metrics.clone(),
        };
        fs::write(self.entry_path(key), serde_json::to_vec(&entry)?)?;
        Ok(())
    }
}

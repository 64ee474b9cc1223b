//! Storage backends for persisted records.

use crate::error::{Result, StoreError};
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Abstract key-value storage for persisted records.
///
/// Implementations must be shareable across threads: writes happen on the
/// persistence writer thread. Errors from a backend are logged and swallowed
/// by the adapter, never surfaced to store callers.
pub trait StorageBackend: Send + Sync {
    /// Read a record. `Ok(None)` when the key has never been written (or
    /// the stored record is unreadable, at the backend's discretion).
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a record, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory backend for tests and ephemeral stores.
#[derive(Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<String, String>>,
    writes: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls so far. Tests use this to observe debounce
    /// coalescing.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.records.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.records.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-per-key backend with crc32-framed records.
///
/// Each record lives in `<dir>/<key>.rec` as `<crc32 hex>\n<value>`, written
/// via a temp file and rename. A record whose frame or checksum does not
/// match reads as missing, so torn writes degrade to the in-memory initial
/// state rather than an error. The directory is held under an exclusive
/// lock for the backend's lifetime.
pub struct FileBackend {
    dir: PathBuf,
    _lock_file: File,
}

impl FileBackend {
    /// Open or create a backend directory, taking an exclusive lock.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let lock_file = File::create(dir.join("LOCK"))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        Ok(Self {
            dir,
            _lock_file: lock_file,
        })
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.rec", key))
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.record_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&path)?;
        let (stored, value) = match raw.split_once('\n') {
            Some(parts) => parts,
            // Truncated frame reads as missing.
            None => return Ok(None),
        };

        let expected = match u32::from_str_radix(stored, 16) {
            Ok(crc) => crc,
            Err(_) => return Ok(None),
        };
        if crc32fast::hash(value.as_bytes()) != expected {
            tracing::warn!(key, "record failed checksum, treating as missing");
            return Ok(None);
        }

        Ok(Some(value.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let crc = crc32fast::hash(value.as_bytes());
        let framed = format!("{:08x}\n{}", crc, value);

        let tmp = self.dir.join(format!("{}.tmp", key));
        fs::write(&tmp, framed)?;
        fs::rename(&tmp, self.record_path(key))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_roundtrip() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("missing").unwrap(), None);

        backend.set("key", "value").unwrap();
        assert_eq!(backend.get("key").unwrap().as_deref(), Some("value"));
        assert_eq!(backend.write_count(), 1);

        backend.set("key", "replaced").unwrap();
        assert_eq!(backend.get("key").unwrap().as_deref(), Some("replaced"));
        assert_eq!(backend.write_count(), 2);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path().join("store")).unwrap();

        assert_eq!(backend.get("missing").unwrap(), None);

        backend.set("snapshot", "{\"text\":\"A\"}").unwrap();
        assert_eq!(
            backend.get("snapshot").unwrap().as_deref(),
            Some("{\"text\":\"A\"}")
        );

        // Values with embedded newlines survive the frame.
        backend.set("multi", "line one\nline two").unwrap();
        assert_eq!(
            backend.get("multi").unwrap().as_deref(),
            Some("line one\nline two")
        );
    }

    #[test]
    fn test_file_corrupt_checksum_reads_as_missing() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path().join("store")).unwrap();

        backend.set("snapshot", "payload").unwrap();
        fs::write(dir.path().join("store/snapshot.rec"), "00000000\npayload").unwrap();

        assert_eq!(backend.get("snapshot").unwrap(), None);
    }

    #[test]
    fn test_file_truncated_frame_reads_as_missing() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path().join("store")).unwrap();

        fs::write(dir.path().join("store/snapshot.rec"), "no-newline-here").unwrap();
        assert_eq!(backend.get("snapshot").unwrap(), None);
    }

    #[test]
    fn test_exclusive_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store");

        let _held = FileBackend::open(&path).unwrap();
        match FileBackend::open(&path) {
            Err(StoreError::Locked) => {}
            other => panic!("expected Locked, got {:?}", other.map(|_| ())),
        }
    }
}

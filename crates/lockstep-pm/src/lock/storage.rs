use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::json::LockFile;
use crate::{InvariantViolation, Result};

/// Where a lock record lives.
pub trait LockStorage {
    /// Whether a record has been stored
    fn exists(&self) -> bool;

    /// Read the stored record. Fails with `NotLocked` when there is none.
    fn read(&self) -> Result<LockFile>;

    /// Replace the stored record as a whole
    fn write(&mut self, lock: &LockFile) -> Result<()>;

    /// Enter the read-then-write critical section. The section ends when
    /// the guard is dropped.
    fn lock_guard(&self) -> Result<LockGuard>;
}

/// Held for the duration of a read-then-write cycle on a lock record.
#[derive(Debug)]
pub struct LockGuard {
    file: Option<File>,
    path: Option<PathBuf>,
}

impl LockGuard {
    /// A guard that holds nothing, for storages that are not shared
    pub fn noop() -> Self {
        Self { file: None, path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Leave the critical section now. Releasing twice is a no-op.
    pub fn release(&mut self) -> std::io::Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        file.unlock()?;
        if let Some(path) = &self.path {
            log::debug!("Released lock on {}", path.display());
        }
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            let path = self.path.as_deref().unwrap_or_else(|| Path::new("lock file"));
            log::warn!("Failed to release lock on {}: {}", path.display(), e);
        }
    }
}

/// Lock record stored as a JSON file on disk.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so readers see either the old or the new record.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<path>.lock`, the advisory lock taken by `lock_guard`
    pub fn guard_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

/// Pretty JSON with 4-space indentation and a trailing newline.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    buf.push(b'\n');
    String::from_utf8(buf).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e).into())
}

impl LockStorage for JsonFile {
    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn read(&self) -> Result<LockFile> {
        if !self.exists() {
            return Err(InvariantViolation::NotLocked.into());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(LockFile::from_str(&content)?)
    }

    fn write(&mut self, lock: &LockFile) -> Result<()> {
        let content = to_pretty_json(lock)?;

        let dir = self.directory();
        fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(content.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        log::debug!("Wrote {}", self.path.display());
        Ok(())
    }

    fn lock_guard(&self) -> Result<LockGuard> {
        let path = self.guard_path();
        fs::create_dir_all(self.directory())?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        file.lock_exclusive()?;

        log::debug!("Acquired lock on {}", path.display());
        Ok(LockGuard {
            file: Some(file),
            path: Some(path),
        })
    }
}

/// Lock record kept in memory, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    lock: Option<LockFile>,
    writes: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that already holds `lock`
    pub fn with_lock(lock: LockFile) -> Self {
        Self {
            lock: Some(lock),
            writes: 0,
        }
    }

    /// Number of successful writes
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn get(&self) -> Option<&LockFile> {
        self.lock.as_ref()
    }
}

impl LockStorage for MemoryStorage {
    fn exists(&self) -> bool {
        self.lock.is_some()
    }

    fn read(&self) -> Result<LockFile> {
        self.lock
            .clone()
            .ok_or_else(|| InvariantViolation::NotLocked.into())
    }

    fn write(&mut self, lock: &LockFile) -> Result<()> {
        self.lock = Some(lock.clone());
        self.writes += 1;
        Ok(())
    }

    fn lock_guard(&self) -> Result<LockGuard> {
        Ok(LockGuard::noop())
    }
}

//! File destination backend (component C6).
//!
//! Open policy, buffered writer, rotation chain and disk-full recovery
//! follow spec §4.7. Rotation file-shifting is grounded in the teacher's
//! `backend/file.rs` `SimpleRollingWriter`/`prune_old_files` (rename and
//! prune logic reworked here around a fixed-width numeric suffix chain
//! instead of a date-period suffix), generalized to the `P, P.1 … P.N`
//! invariant the data model names instead of the teacher's time-period
//! naming.

use super::Backend;
use crate::compression::CompressionPool;
use crate::error::{classify_io_error, LogForgeError, Result, WriteFailureKind};
use crate::metrics::Metrics;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_BUFFER_SIZE: usize = 4096;
const MAX_WRITE_RETRIES: u32 = 3;

/// Options controlling one file destination, mirroring spec §4.7's
/// parameters.
pub struct FileOptions {
    pub max_size: u64,
    pub max_files: usize,
    /// Acquire an advisory exclusive lock around each write (spec §4.7
    /// "locked file" backend), coordinating cooperating processes sharing
    /// one path.
    pub locked: bool,
    pub compress: bool,
    pub buffer_size: usize,
}

impl Default for FileOptions {
    fn default() -> Self {
        FileOptions { max_size: 10 * 1024 * 1024, max_files: 5, locked: false, compress: false, buffer_size: DEFAULT_BUFFER_SIZE }
    }
}

pub struct FileBackend {
    path: PathBuf,
    options: FileOptions,
    writer: BufWriter<File>,
    current_size: u64,
    compression: Option<Arc<CompressionPool>>,
    metrics: Option<Arc<Metrics>>,
}

impl FileBackend {
    pub fn open(
        path: impl Into<PathBuf>,
        options: FileOptions,
        compression: Option<Arc<CompressionPool>>,
        metrics: Option<Arc<Metrics>>,
    ) -> Result<Self> {
        let path = path.into();
        let file = open_for_append(&path)?;
        let current_size = file.metadata().map_err(|e| io_err(&path, e))?.len();
        Ok(FileBackend {
            writer: BufWriter::with_capacity(options.buffer_size.max(1), file),
            path,
            options,
            current_size,
            compression,
            metrics,
        })
    }

    /// `max_files == 0` disables rotation entirely — the file grows
    /// without bound (spec §8 boundary behavior) — so the size check
    /// never fires in that case.
    fn would_exceed(&self, len: usize) -> bool {
        self.options.max_files > 0
            && self.options.max_size > 0
            && self.current_size + len as u64 > self.options.max_size
    }

    fn rotate(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| io_err(&self.path, e))?;

        let max_files = self.options.max_files;
        let oldest = numbered_path(&self.path, max_files);
        if oldest.exists() {
            let _ = fs::remove_file(&oldest);
            let _ = fs::remove_file(with_gz_suffix(&oldest));
        }
        for index in (1..max_files).rev() {
            let from = numbered_path(&self.path, index);
            let to = numbered_path(&self.path, index + 1);
            if from.exists() {
                fs::rename(&from, &to).map_err(|e| io_err(&from, e))?;
            }
        }
        let first = numbered_path(&self.path, 1);
        fs::rename(&self.path, &first).map_err(|e| io_err(&self.path, e))?;

        let file = open_for_append(&self.path)?;
        self.writer = BufWriter::with_capacity(self.options.buffer_size.max(1), file);
        self.current_size = 0;

        if self.options.compress {
            if let Some(pool) = &self.compression {
                pool.submit(first);
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_rotation();
        }
        Ok(())
    }

    /// Disk-full recovery (spec §4.7): force a rotation, drop the oldest
    /// file if one still exists, then retry the write a bounded number of
    /// times.
    fn recover_from_disk_full(&mut self, bytes: &[u8]) -> Result<()> {
        for _ in 0..MAX_WRITE_RETRIES {
            if self.rotate().is_err() {
                continue;
            }
            match self.write_locked(bytes) {
                Ok(()) => return Ok(()),
                Err(LogForgeError::DiskFull(_)) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(LogForgeError::DiskFull(self.path.display().to_string()))
    }

    fn write_locked(&mut self, bytes: &[u8]) -> Result<()> {
        if self.options.locked {
            self.writer.get_ref().lock_exclusive().map_err(|e| io_err(&self.path, e))?;
            let result = self.writer.write_all(bytes);
            let _ = self.writer.flush();
            let _ = self.writer.get_ref().unlock();
            result.map_err(|e| classify_write_err(&self.path, e))?;
        } else {
            self.writer.write_all(bytes).map_err(|e| classify_write_err(&self.path, e))?;
        }
        self.current_size += bytes.len() as u64;
        Ok(())
    }
}

impl Backend for FileBackend {
    fn write(&mut self, _level: crate::level::Level, bytes: &[u8]) -> Result<()> {
        if self.would_exceed(bytes.len()) {
            self.rotate()?;
        }
        match self.write_locked(bytes) {
            Ok(()) => Ok(()),
            Err(LogForgeError::DiskFull(_)) => self.recover_from_disk_full(bytes),
            Err(other) => Err(other),
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| io_err(&self.path, e))
    }

    fn close(&mut self) -> Result<()> {
        self.flush()
    }
}

fn open_for_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| io_err(path, e))?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path).map_err(|e| io_err(path, e))
}

fn numbered_path(base: &Path, index: usize) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn with_gz_suffix(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

fn io_err(path: &Path, err: std::io::Error) -> LogForgeError {
    LogForgeError::BackendUnavailable(format!("{}: {err}", path.display()))
}

fn classify_write_err(path: &Path, err: std::io::Error) -> LogForgeError {
    match classify_io_error(&err) {
        WriteFailureKind::DiskFull => LogForgeError::DiskFull(path.display().to_string()),
        WriteFailureKind::Transient | WriteFailureKind::ConnectionClosed => {
            LogForgeError::TransientIo(format!("{}: {err}", path.display()))
        }
    }
}

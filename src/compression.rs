//! Background gzip compression of rotated files (component C8).
//!
//! Grounded in the teacher's `backend/async.rs` background-thread/channel
//! pattern (`crossbeam_channel` + `thread::spawn`, drain-until-disconnect
//! loop), retargeted from buffered-line writing to compressing one file
//! per job.

use crate::diagnostics::{report, ErrorEvent, ErrorHandler, ErrorKind};
use crate::metrics::Metrics;
use crossbeam_channel::{Sender, TrySendError};
use flate2::write::GzEncoder;
use flate2::Compression as GzCompression;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Default bound on the compression job channel (spec §4.9).
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

struct Job {
    source: PathBuf,
}

/// A running pool of compression workers plus the sender half of their
/// shared job channel.
pub struct CompressionPool {
    sender: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl CompressionPool {
    /// Spawn `worker_count` threads sharing one bounded job channel.
    pub fn start(
        worker_count: usize,
        queue_capacity: usize,
        metrics: Arc<Metrics>,
        error_handler: Option<ErrorHandler>,
    ) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded::<Job>(queue_capacity);
        let worker_count = worker_count.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let receiver = receiver.clone();
            let metrics = Arc::clone(&metrics);
            let error_handler = error_handler.clone();
            workers.push(thread::spawn(move || {
                while let Ok(job) = receiver.recv() {
                    match compress_file(&job.source) {
                        Ok(()) => metrics.record_compression(),
                        Err(err) => {
                            metrics.record_compression_error();
                            report(
                                error_handler.as_ref(),
                                ErrorEvent::new(ErrorKind::Compression, err.to_string())
                                    .with_destination(job.source.display().to_string()),
                            );
                        }
                    }
                }
            }));
        }
        CompressionPool { sender, workers }
    }

    /// Enqueue a rotated file for compression. If the channel is full the
    /// job is dropped and a warning is printed to stderr — the file stays
    /// uncompressed but intact, per spec §4.9.
    pub fn submit(&self, source: PathBuf) {
        if let Err(TrySendError::Full(job)) = self.sender.try_send(Job { source }) {
            eprintln!(
                "logforge: compression queue full, leaving {} uncompressed",
                job.source.display()
            );
        }
    }
}

impl Drop for CompressionPool {
    /// Rust drops struct fields only after a custom `drop` body returns,
    /// so the real sender is still alive here; swap it for a throwaway one
    /// first to actually close the channel, then join every worker, which
    /// lets each drain whatever was already queued before its `recv`
    /// returns `Err`.
    fn drop(&mut self) {
        let (closed, _unused_receiver) = crossbeam_channel::bounded::<Job>(0);
        drop(std::mem::replace(&mut self.sender, closed));
        for worker in std::mem::take(&mut self.workers) {
            let _ = worker.join();
        }
    }
}

/// Compress `source` to `<source>.gz`, fsync it, then unlink `source`. On
/// any failure the partial `.gz` is removed and the original is left
/// intact (spec §4.9).
fn compress_file(source: &Path) -> io::Result<()> {
    let target = with_gz_suffix(source);
    match compress_file_inner(source, &target) {
        Ok(()) => {
            std::fs::remove_file(source)?;
            Ok(())
        }
        Err(err) => {
            let _ = std::fs::remove_file(&target);
            Err(err)
        }
    }
}

fn compress_file_inner(source: &Path, target: &Path) -> io::Result<()> {
    let mut input = File::open(source)?;
    let output = File::create(target)?;
    let mut encoder = GzEncoder::new(output, GzCompression::default());
    io::copy(&mut input, &mut encoder)?;
    let output = encoder.finish()?;
    output.sync_all()
}

fn with_gz_suffix(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn compresses_and_removes_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log.1");
        std::fs::write(&path, b"line one\nline two\n").unwrap();

        let metrics = Arc::new(Metrics::new());
        let pool = CompressionPool::start(1, DEFAULT_QUEUE_CAPACITY, metrics.clone(), None);
        pool.submit(path.clone());
        drop(pool);

        assert!(!path.exists());
        let gz_path = with_gz_suffix(&path);
        assert!(gz_path.exists());

        let mut decoder = flate2::read::GzDecoder::new(File::open(&gz_path).unwrap());
        let mut contents = String::new();
        decoder.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "line one\nline two\n");
        assert_eq!(metrics.snapshot().compressions_total, 1);
    }

    #[test]
    fn missing_source_is_reported_as_an_error_not_a_panic() {
        let metrics = Arc::new(Metrics::new());
        let pool = CompressionPool::start(1, DEFAULT_QUEUE_CAPACITY, metrics.clone(), None);
        pool.submit(PathBuf::from("/nonexistent/does-not-exist.log"));
        drop(pool);
        assert_eq!(metrics.snapshot().compression_errors_total, 1);
    }

    #[test]
    fn compression_failure_is_reported_to_the_error_handler() {
        use crate::diagnostics::ErrorKind;
        use std::sync::Mutex;

        let metrics = Arc::new(Metrics::new());
        let events: Arc<Mutex<Vec<ErrorKind>>> = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&events);
        let handler: ErrorHandler = Arc::new(move |event| captured.lock().unwrap().push(event.kind));

        let pool = CompressionPool::start(1, DEFAULT_QUEUE_CAPACITY, metrics, Some(handler));
        pool.submit(PathBuf::from("/nonexistent/does-not-exist.log"));
        drop(pool);

        assert_eq!(events.lock().unwrap().as_slice(), [ErrorKind::Compression]);
    }
}

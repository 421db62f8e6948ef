//! Buffered daily file appender
//!
//! Producers only push formatted lines into a ring buffer. The scheduler (or
//! an explicit flush) drains the buffer into `<directory>/<name>_<YYYY-MM-DD>.log`.

use crate::core::{
    Appender, LogEntry, LogManagerConfig, LoggerError, PressureNotifier, Result, RingBuffer,
};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

const DEFAULT_QUEUE_CAPACITY: usize = 32;
const DEFAULT_MAX_QUEUE_SIZE: usize = 100;

/// Open file state, guarded separately from the record queue so that the
/// queue lock is never held across I/O.
#[derive(Default)]
struct FileBackend {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl FileBackend {
    /// Flush and drop the current writer, returning the path it wrote to
    fn close(&mut self) -> (Option<PathBuf>, Result<()>) {
        let mut result = Ok(());
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                result = Err(LoggerError::io_operation(
                    "closing log file",
                    format!("Failed to flush '{}'", self.display_path()),
                    e,
                ));
            }
        }
        (self.path.clone(), result)
    }

    fn display_path(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unopened>".to_string())
    }
}

/// File appender with an in-memory queue and daily file rotation
///
/// # Examples
///
/// ```no_run
/// use rust_log_dispatch::appenders::FileAppender;
/// use rust_log_dispatch::core::{Appender, LogEntry, LogLevel};
///
/// let appender = FileAppender::new("Server", "/var/log/server").with_max_queue_size(500);
/// appender.prepare_logging(chrono::Local::now()).unwrap();
///
/// appender.enqueue(&LogEntry::new(LogLevel::Info, "Server", "listening")).unwrap();
/// appender.flush(true).unwrap();
/// ```
pub struct FileAppender {
    name: String,
    directory: PathBuf,
    max_queue_size: usize,
    compress_rotated: bool,
    queue: Mutex<RingBuffer<String>>,
    backend: Mutex<FileBackend>,
    pressure: Option<PressureNotifier>,
    disposed: AtomicBool,
    written: AtomicU64,
    dropped: AtomicU64,
}

impl FileAppender {
    /// Create an appender for logger `name` writing into `directory`
    ///
    /// No file is opened until [`prepare_logging`](Appender::prepare_logging).
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            compress_rotated: false,
            queue: Mutex::new(RingBuffer::new(DEFAULT_QUEUE_CAPACITY)),
            backend: Mutex::new(FileBackend::default()),
            pressure: None,
            disposed: AtomicBool::new(false),
            written: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Create an appender using the manager's tunables
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the buffer capacities are invalid.
    pub fn from_config(name: impl Into<String>, config: &LogManagerConfig) -> Result<Self> {
        let queue =
            RingBuffer::with_max_capacity(config.initial_buffer_capacity, config.max_buffer_capacity)?;
        let mut appender = Self::new(name, config.log_directory.clone())
            .with_max_queue_size(config.max_queue_size)
            .with_compression(config.compress_rotated);
        appender.queue = Mutex::new(queue);
        Ok(appender)
    }

    /// Set the queued record count at which a non-forced flush writes
    #[must_use]
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size.max(1);
        self
    }

    /// Gzip the previous day's file when rotating to a new day
    #[must_use]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress_rotated = enabled;
        self
    }

    /// Signal `notifier` whenever the queue reaches its size threshold
    #[must_use]
    pub fn with_pressure_notifier(mut self, notifier: PressureNotifier) -> Self {
        self.pressure = Some(notifier);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    /// Path of the file the appender currently writes to
    pub fn current_path(&self) -> Option<PathBuf> {
        self.backend.lock().path.clone()
    }

    /// Records successfully handed to the OS
    pub fn written_count(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Records lost because the backend was unavailable
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// File name for `name` on the day of `date`
    pub fn file_name_for(name: &str, date: DateTime<Local>) -> String {
        format!("{}_{}.log", sanitize_file_stem(name), date.format("%Y-%m-%d"))
    }

    fn flush_inner(&self, force: bool) -> Result<()> {
        // Backend first, then queue: concurrent flushers cannot interleave
        // their snapshots out of order.
        let mut backend = self.backend.lock();
        let records = {
            let mut queue = self.queue.lock();
            if queue.is_empty() || (!force && queue.len() < self.max_queue_size) {
                return Ok(());
            }
            if backend.path.is_none() {
                // Not prepared yet; keep records until a file is chosen.
                return Ok(());
            }
            queue.snapshot_and_clear()
        };

        self.write_records(&mut backend, records)
    }

    fn write_records(&self, backend: &mut FileBackend, records: Vec<String>) -> Result<()> {
        if backend.writer.is_none() {
            if let Err(e) = self.reopen(backend) {
                self.drop_records(records.len());
                return Err(e);
            }
        }

        let path = backend.display_path();
        let Some(writer) = backend.writer.as_mut() else {
            self.drop_records(records.len());
            return Err(LoggerError::file_appender(path, "Log file is not open"));
        };

        let total = records.len();
        for (idx, record) in records.iter().enumerate() {
            let result = writer
                .write_all(record.as_bytes())
                .and_then(|()| writer.write_all(b"\n"));
            if let Err(e) = result {
                self.drop_records(total - idx);
                // The handle is suspect after a failed write; reopen next time.
                backend.writer = None;
                return Err(LoggerError::io_operation(
                    "writing log file",
                    format!("Failed to write to '{}'", path),
                    e,
                ));
            }
            self.written.fetch_add(1, Ordering::Relaxed);
        }

        writer.flush().map_err(|e| {
            LoggerError::io_operation(
                "flushing log file",
                format!("Failed to flush '{}'", path),
                e,
            )
        })
    }

    fn drop_records(&self, count: usize) {
        if count > 0 {
            self.dropped.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    /// Reopen the current day's file after an earlier open or write failure
    fn reopen(&self, backend: &mut FileBackend) -> Result<()> {
        let path = backend
            .path
            .clone()
            .ok_or_else(|| LoggerError::file_appender(self.name.clone(), "No log file chosen"))?;
        backend.writer = Some(BufWriter::new(self.open(&path)?));
        Ok(())
    }

    fn open(&self, path: &Path) -> Result<File> {
        fs::create_dir_all(&self.directory).map_err(|e| {
            LoggerError::io_operation(
                "create log directory",
                format!("Failed to create directory '{}'", self.directory.display()),
                e,
            )
        })?;

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                LoggerError::file_appender(
                    path.display().to_string(),
                    format!("Failed to open: {}", e),
                )
            })
    }
}

impl Appender for FileAppender {
    fn enqueue(&self, entry: &LogEntry) -> Result<()> {
        let line = entry.to_string();
        let reached_threshold = {
            let mut queue = self.queue.lock();
            if self.disposed.load(Ordering::Acquire) {
                return Err(LoggerError::disposed(self.name.clone()));
            }
            queue.enqueue(line)?;
            queue.len() == self.max_queue_size
        };

        if reached_threshold {
            if let Some(ref pressure) = self.pressure {
                pressure.notify();
            }
        }
        Ok(())
    }

    fn flush(&self, force: bool) -> Result<()> {
        self.flush_inner(force)
    }

    fn prepare_logging(&self, now: DateTime<Local>) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Ok(());
        }

        let path = self.directory.join(Self::file_name_for(&self.name, now));
        let mut backend = self.backend.lock();
        let (previous, close_result) = backend.close();
        if let Err(e) = close_result {
            eprintln!("[LOGGER WARNING] {}", e);
        }

        backend.path = Some(path.clone());
        let file = self.open(&path).map_err(|e| {
            LoggerError::file_rotation(path.display().to_string(), e.to_string())
        })?;
        backend.writer = Some(BufWriter::new(file));
        drop(backend);

        if self.compress_rotated {
            if let Some(previous) = previous.filter(|p| *p != path) {
                if let Err(e) = compress_file(&previous) {
                    eprintln!(
                        "[LOGGER WARNING] Failed to compress rotated log '{}': {}",
                        previous.display(),
                        e
                    );
                }
            }
        }
        Ok(())
    }

    fn dispose(&self) -> Result<()> {
        {
            let _queue = self.queue.lock();
            if self.disposed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
        }

        let flush_result = self.flush_inner(true);

        let leftover = {
            let mut queue = self.queue.lock();
            let leftover = queue.len();
            queue.clear();
            leftover
        };
        self.drop_records(leftover);

        let (_, close_result) = self.backend.lock().close();
        flush_result.and(close_result)
    }

    fn name(&self) -> &str {
        "file"
    }

    fn queued(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Drop for FileAppender {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            eprintln!("[LOGGER ERROR] Failed to dispose file appender '{}': {}", self.name, e);
        }
    }
}

/// Replace characters that are not safe in a file name
fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Gzip `path` into `<path>.gz` (or `<path>.N.gz` if that exists) using
/// streaming I/O. The original is removed only after the archive is complete.
fn compress_file(path: &Path) -> Result<()> {
    use std::io::{BufReader, Read};

    let gz_path = (0..)
        .map(|n| {
            let mut name = path.as_os_str().to_owned();
            if n == 0 {
                name.push(".gz");
            } else {
                name.push(format!(".{}.gz", n));
            }
            PathBuf::from(name)
        })
        .find(|candidate| !candidate.exists())
        .ok_or_else(|| LoggerError::other("no free archive name"))?;
    let mut temp_name = gz_path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_gz_path = PathBuf::from(temp_name);

    let input = File::open(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to open file for compression: {}", path.display()),
            e,
        )
    })?;
    let mut reader = BufReader::with_capacity(64 * 1024, input);

    let output = File::create(&temp_gz_path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to create temporary compressed file: {}", temp_gz_path.display()),
            e,
        )
    })?;
    let mut encoder = flate2::write::GzEncoder::new(
        BufWriter::with_capacity(64 * 1024, output),
        flate2::Compression::default(),
    );

    let mut buffer = vec![0u8; 64 * 1024];
    let streamed: std::io::Result<()> = (|| {
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            encoder.write_all(&buffer[..bytes_read])?;
        }
        encoder.finish()?.flush()
    })();

    if let Err(e) = streamed {
        let _ = fs::remove_file(&temp_gz_path);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress {}", path.display()),
            e,
        ));
    }

    fs::rename(&temp_gz_path, &gz_path).map_err(|e| {
        let _ = fs::remove_file(&temp_gz_path);
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to rename compressed file to: {}", gz_path.display()),
            e,
        )
    })?;

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compression succeeded but failed to remove original file {}: {}",
            path.display(),
            e
        );
    }
    Ok(())
}

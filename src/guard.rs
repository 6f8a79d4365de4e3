//! Serialized, paced access to the switchd fuse.
//!
//! switchd exposes its ASIC counters as a fuse filesystem that does not cope
//! with overlapping or bursty reads: a buffered `read_to_end` or two readers
//! at once can crash the daemon and take the data plane with it. Every read
//! therefore goes through a [`ResourceGuard`], which
//!
//! 1. takes one exclusive lock shared by all callers (not per path),
//! 2. sleeps for the settle delay while holding it,
//! 3. performs exactly one `open`/`read`/`close` into a 128 byte buffer,
//! 4. releases the lock and parses the trimmed text as `f64`.
//!
//! The guard is an ordinary value owned by whoever constructs it and shared
//! behind an [`Arc`]; tests swap the [`Backend`] for a fake.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{IntoRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;

/// Delay observed before every read while the lock is held.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(10);

/// Maximum bytes read per file. Values are always short ASCII numbers.
pub const READ_BUFFER_SIZE: usize = 128;

/// Failure of a single guarded read. Every variant carries the path.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The file could not be opened.
    #[error("could not open file {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    /// The read syscall failed.
    #[error("could not read from file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    /// The value was read but closing the descriptor failed.
    #[error("could not close file {}: {source}", path.display())]
    Close { path: PathBuf, source: io::Error },

    /// The content is not a number.
    #[error("could not parse {text:?} from file {} as a number: {source}", path.display())]
    Parse {
        path: PathBuf,
        text: String,
        source: std::num::ParseFloatError,
    },
}

impl ReadError {
    /// Path of the file that failed.
    pub fn path(&self) -> &Path {
        match self {
            Self::Open { path, .. }
            | Self::Read { path, .. }
            | Self::Close { path, .. }
            | Self::Parse { path, .. } => path,
        }
    }
}

/// Raw access to the backing store.
///
/// Implementations perform one open/read/close cycle and return the number
/// of bytes placed in `buf`. They are called from a blocking thread with the
/// guard's lock held.
pub trait Backend: Send + Sync + 'static {
    fn read(&self, path: &Path, buf: &mut [u8]) -> Result<usize, ReadError>;
}

/// Backend issuing plain syscalls against the real filesystem.
///
/// The descriptor is closed explicitly so a failing `close(2)` is reported
/// instead of being swallowed by `Drop`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsBackend;

impl Backend for FsBackend {
    fn read(&self, path: &Path, buf: &mut [u8]) -> Result<usize, ReadError> {
        let file = File::open(path).map_err(|source| ReadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let read = (&file).read(buf);
        let closed = close_fd(file.into_raw_fd());

        let count = read.map_err(|source| ReadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        closed.map_err(|source| ReadError::Close {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(count)
    }
}

fn close_fd(fd: RawFd) -> io::Result<()> {
    // SAFETY: `fd` was released from an owned `File` and is closed once here.
    if unsafe { libc::close(fd) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Exclusive, paced reader for a fragile backing store.
pub struct ResourceGuard {
    root: PathBuf,
    settle_delay: Duration,
    lock: Arc<Mutex<()>>,
    backend: Arc<dyn Backend>,
}

impl ResourceGuard {
    /// Guard over `root` using the real filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_backend(root, Arc::new(FsBackend))
    }

    /// Guard over `root` using a custom backend.
    pub fn with_backend(root: impl Into<PathBuf>, backend: Arc<dyn Backend>) -> Self {
        Self {
            root: root.into(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            lock: Arc::new(Mutex::new(())),
            backend,
        }
    }

    /// Override the settle delay.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Root every relative path is resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Configured settle delay.
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Read one numeric value from `relative` below the root.
    ///
    /// The lock is held for exactly one read. It is moved into the blocking
    /// read so that a caller abandoning this future mid-read cannot let a
    /// second read start before the first one has returned.
    pub async fn read(&self, relative: impl AsRef<Path>) -> Result<f64, ReadError> {
        let path = self.root.join(relative);

        let permit = Arc::clone(&self.lock).lock_owned().await;
        tokio::time::sleep(self.settle_delay).await;

        let backend = Arc::clone(&self.backend);
        let read_path = path.clone();
        let raw = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let mut buf = [0u8; READ_BUFFER_SIZE];
            let count = backend.read(&read_path, &mut buf)?;
            Ok::<_, ReadError>(buf[..count].to_vec())
        })
        .await
        .map_err(|e| ReadError::Read {
            path: path.clone(),
            source: io::Error::other(e),
        })??;

        tracing::trace!(path = %path.display(), bytes = raw.len(), "switchd read");
        parse_reading(path, &raw)
    }
}

impl std::fmt::Debug for ResourceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("root", &self.root)
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}

/// Parse a raw reading, tolerating surrounding whitespace and the trailing
/// newline every fuse/sysfs value carries.
pub fn parse_reading(path: PathBuf, raw: &[u8]) -> Result<f64, ReadError> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    trimmed.parse::<f64>().map_err(|source| ReadError::Parse {
        text: trimmed.to_string(),
        path,
        source,
    })
}

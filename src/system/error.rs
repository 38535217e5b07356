use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// `ESRCH`: procfs returns this when a process exits between `open` and `read`.
const ESRCH: i32 = 3;

/// Failures reading the kernel metrics interface.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("process {0} no longer exists")]
    ProcessNotFound(u32),
    #[error("permission denied reading {} for process {pid}", path.display())]
    PermissionDenied { pid: u32, path: PathBuf },
    #[error("malformed {}: {detail}", path.display())]
    Parse { path: PathBuf, detail: String },
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MetricsError {
    /// Classify an I/O error raised while reading a per-process file.
    pub fn from_process_io(pid: u32, path: PathBuf, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => MetricsError::ProcessNotFound(pid),
            io::ErrorKind::PermissionDenied => MetricsError::PermissionDenied { pid, path },
            _ if err.raw_os_error() == Some(ESRCH) => MetricsError::ProcessNotFound(pid),
            _ => MetricsError::Io { path, source: err },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MetricsError::ProcessNotFound(_))
    }
}

/// Failures that end a sampling run.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("Process {0} doesn't exist!")]
    RootNotFound(u32),
    #[error("You don't have permission to access the smap data of process {0}!")]
    PermissionDenied(u32),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

pub const EXIT_ROOT_NOT_FOUND: u8 = 3;
pub const EXIT_PERMISSION_DENIED: u8 = 4;

impl SampleError {
    /// Process exit status for a run that ended with this error, or `None`
    /// when it is not one of the fatal conditions with a reserved status.
    /// JSON consumers see a missing root as an empty, successful run.
    pub fn exit_code(&self, json: bool) -> Option<u8> {
        match self {
            SampleError::RootNotFound(_) if json => Some(0),
            SampleError::RootNotFound(_) => Some(EXIT_ROOT_NOT_FOUND),
            SampleError::PermissionDenied(_) => Some(EXIT_PERMISSION_DENIED),
            SampleError::Metrics(_) => None,
        }
    }
}

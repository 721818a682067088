use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SizeError {
    #[error("Path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure reported by a non-filesystem tree implementation
    #[error("{0}")]
    Collaborator(String),

    /// Total size or file count no longer fits in a `u64`
    #[error("Size total overflowed")]
    Overflow,

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Failed to spawn worker {id}: {source}")]
    WorkerSpawn {
        id: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker {id} panicked")]
    WorkerPanicked { id: usize },
}

impl SizeError {
    /// Map an I/O error on `path` to the most specific variant
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => SizeError::PathNotFound(path),
            std::io::ErrorKind::PermissionDenied => SizeError::PermissionDenied(path),
            _ => SizeError::Io { path, source: err },
        }
    }

    /// True for errors caused by the caller stopping the operation,
    /// as opposed to something failing during traversal.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SizeError::Cancelled | SizeError::DeadlineExceeded)
    }
}

pub type Result<T> = std::result::Result<T, SizeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_from_io_maps_kind() {
        let err = SizeError::from_io("/a", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, SizeError::PathNotFound(p) if p == PathBuf::from("/a")));

        let err = SizeError::from_io("/b", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, SizeError::PermissionDenied(_)));

        let err = SizeError::from_io("/c", io::Error::other("boom"));
        assert!(matches!(err, SizeError::Io { .. }));
        assert_eq!(err.to_string(), "IO error at /c: boom");
    }

    #[test]
    fn test_is_cancellation() {
        assert!(SizeError::Cancelled.is_cancellation());
        assert!(SizeError::DeadlineExceeded.is_cancellation());
        assert!(!SizeError::Collaborator("x".into()).is_cancellation());
        assert!(!SizeError::WorkerPanicked { id: 0 }.is_cancellation());
        assert!(!SizeError::Overflow.is_cancellation());
    }
}

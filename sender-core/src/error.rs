// ABOUTME: Error taxonomy for loading inputs and running the dispatch loop.
// ABOUTME: Per-recipient failures live in dispatch::SendFailure and never abort a run.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to load one of the run inputs (recipient list or message body).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{} not found", path.display())]
    NotFound { path: PathBuf },

    #[error("{} is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("{} is empty", path.display())]
    Empty { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    pub(crate) fn from_io(path: &std::path::Path, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound {
                path: path.to_path_buf(),
            },
            // read_to_string reports invalid UTF-8 this way
            std::io::ErrorKind::InvalidData => LoadError::Malformed {
                path: path.to_path_buf(),
                reason: source.to_string(),
            },
            _ => LoadError::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// Failure that aborts a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Missing or empty input; nothing was dispatched.
    #[error("precondition failed: {0}")]
    Precondition(#[from] LoadError),

    /// Unexpected failure outside the per-recipient scope.
    #[error("run aborted: {0}")]
    Fatal(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_missing_file_maps_to_not_found() {
        let err = LoadError::from_io(
            Path::new("numbers.json"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, LoadError::NotFound { .. }));
        assert_eq!(err.to_string(), "numbers.json not found");
    }

    #[test]
    fn test_invalid_data_is_malformed() {
        let err = LoadError::from_io(
            Path::new("numbers.json"),
            std::io::Error::new(std::io::ErrorKind::InvalidData, "stream did not contain valid UTF-8"),
        );
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[test]
    fn test_other_io_errors_keep_source() {
        let err = LoadError::from_io(
            Path::new("numbers.json"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_precondition_wraps_load_error() {
        let err: RunError = LoadError::Empty {
            path: PathBuf::from("first.txt"),
        }
        .into();
        assert_eq!(err.to_string(), "precondition failed: first.txt is empty");
    }
}

//! Shared types used by the ledger, the lister, and the thumbnail cache.
//!
//! Every module has its own `thiserror` enum, but callers that sit in front
//! of the library (the CLI today, an HTTP layer tomorrow) only care about the
//! coarse category. [`ErrorKind`] is that category, and each module error
//! exposes a `kind()` that maps onto it.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Coarse error category shared by all module errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The path does not exist.
    NotFound,
    /// The path exists but has the wrong type or extension, or an argument is malformed.
    InvalidArgument,
    /// The OS refused access.
    PermissionDenied,
    /// Create, copy, delete, decode or encode failure not covered above.
    Io,
}

impl ErrorKind {
    /// HTTP-style status code for this category.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::InvalidArgument => 400,
            ErrorKind::PermissionDenied => 403,
            ErrorKind::Io => 500,
        }
    }

    /// Classify an OS error. Anything that is not "missing" or "denied" is `Io`.
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::Io,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::Io => "i/o error",
        };
        f.write_str(label)
    }
}

/// A non-fatal failure that happened while the primary action succeeded.
///
/// Produced by best-effort cleanup: removing stale duplicates during
/// classify, or sweeping the thumbnail cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub path: PathBuf,
    pub message: String,
}

impl Warning {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

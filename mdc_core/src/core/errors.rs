use std::fmt::{self, Display};

/// Result kind reported by every fallible manager call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fault,
    NotFound,
    Timeout,
    Busy,
    Unsupported,
    Io,
}

/// A central error enum for the data connection manager.
///
/// State-guard violations are detected locally and surface as `Fault`.
/// Radio-layer failures keep whatever kind the radio reported.
#[derive(Debug)]
pub enum MdcError {
    Fault(String),
    NotFound(String),
    Timeout,
    Busy,
    Unsupported,
    Io(std::io::Error),
}

impl MdcError {
    pub fn fault(msg: impl Into<String>) -> Self {
        MdcError::Fault(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        MdcError::NotFound(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MdcError::Fault(_) => ErrorKind::Fault,
            MdcError::NotFound(_) => ErrorKind::NotFound,
            MdcError::Timeout => ErrorKind::Timeout,
            MdcError::Busy => ErrorKind::Busy,
            MdcError::Unsupported => ErrorKind::Unsupported,
            MdcError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Convert from std::io::Error (thread spawn, config file access).
impl From<std::io::Error> for MdcError {
    fn from(err: std::io::Error) -> MdcError {
        MdcError::Io(err)
    }
}

/// A radio RPC that outlives its bound is reported as `Timeout`.
/// Without this, `?` on `tokio::time::timeout(..)` would need a manual map.
impl From<tokio::time::error::Elapsed> for MdcError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        MdcError::Timeout
    }
}

impl From<serde_json::Error> for MdcError {
    fn from(err: serde_json::Error) -> Self {
        MdcError::Fault(format!("malformed config: {}", err))
    }
}

impl Display for MdcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MdcError::Fault(msg) => write!(f, "Fault: {}", msg),
            MdcError::NotFound(msg) => write!(f, "Not found: {}", msg),
            MdcError::Timeout => write!(f, "Timeout: radio did not answer in time"),
            MdcError::Busy => write!(f, "Busy: radio declined the request"),
            MdcError::Unsupported => write!(f, "Unsupported by the radio"),
            MdcError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for MdcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MdcError::Io(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MdcError>;

use std::fmt;

use crate::stream::IoOperation;

#[derive(Debug)]
pub enum ReconError {
    /// A required collaborator (collection, comparator) was never supplied.
    Config(String),
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Job config validation error (duplicate party id, bad source, etc.).
    ConfigValidation(String),
    /// Underlying stream failure.
    Io {
        operation: IoOperation,
        resource: String,
        message: String,
        not_found: bool,
    },
    /// Read or write attempted before `open`.
    NotOpened { resource: String },
    /// Stream bytes could not be decoded into records.
    BadFormat { resource: String, message: String },
    /// Remote resource answered with a non-success status.
    HttpStatus { resource: String, status: u16 },
    /// A field transformer rejected a value.
    Transform { column: String, message: String },
    /// Execution context was cancelled or its deadline passed.
    Cancelled,
    /// A collaborator received a transaction of a concrete type it cannot handle.
    UnexpectedType { expected: String, found: String },
    /// A filter failed to evaluate.
    Filter(String),
    /// A comparator failed to evaluate.
    Compare(String),
}

impl ReconError {
    pub fn io(operation: IoOperation, resource: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            operation,
            resource: resource.into(),
            message: err.to_string(),
            not_found: err.kind() == std::io::ErrorKind::NotFound,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True when the resource behind an open failure does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { not_found: true, .. })
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Io { operation, resource, message, .. } => {
                write!(f, "unable to {operation} {resource}: {message}")
            }
            Self::NotOpened { resource } => write!(f, "resource '{resource}' is not opened"),
            Self::BadFormat { resource, message } => {
                write!(f, "resource '{resource}' has bad format: {message}")
            }
            Self::HttpStatus { resource, status } => {
                write!(f, "resource '{resource}' answered with status {status}")
            }
            Self::Transform { column, message } => {
                write!(f, "cannot transform column '{column}': {message}")
            }
            Self::Cancelled => write!(f, "reconciliation cancelled"),
            Self::UnexpectedType { expected, found } => {
                write!(f, "unexpected transaction type: expected {expected}, found {found}")
            }
            Self::Filter(msg) => write!(f, "filter error: {msg}"),
            Self::Compare(msg) => write!(f, "comparator error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

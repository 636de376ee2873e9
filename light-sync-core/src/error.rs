//! Error types for light-sync-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::synchronise::SyncReport;

/// Fatal errors of a collection run. Per-file problems are not errors; they
/// are reported as [`crate::collect::SkippedFile`] entries.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("unknown source encoding '{0}'")]
    UnknownEncoding(String),

    #[error("invalid interface name: {0}")]
    InvalidInterface(#[from] regex::Error),

    #[error("duplicate artifact id '{id}' in {} and {}", first.display(), second.display())]
    DuplicateId {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Errors reported by a [`crate::remote::RemoteSink`] or authenticator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    /// Connection refused, timeout, or other transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status that is not an auth failure.
    #[error("server returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// Missing, invalid or expired token (HTTP 401/403).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The response body was not the expected JSON.
    #[error("malformed response: {0}")]
    Parse(String),
}

impl SinkError {
    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SinkError::Network(_) => true,
            SinkError::Status { code, .. } => *code >= 500,
            SinkError::Unauthorized(_) | SinkError::Parse(_) => false,
        }
    }
}

/// Terminal failures of a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No content map means nothing to compare against.
    #[error("failed to fetch remote content map: {0}")]
    Fetch(#[source] SinkError),

    /// An upsert was rejected for lack of authorisation; the drain stopped
    /// there. `report` holds what was done before the abort.
    #[error("upsert of '{id}' was rejected as unauthorized; run aborted")]
    Unauthorized { id: String, report: Box<SyncReport> },
}

/// Errors writing the SQL export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unknown output encoding '{0}'")]
    UnknownEncoding(String),

    /// encoding_rs can only decode this label (UTF-16 variants).
    #[error("'{0}' is not supported as an output encoding")]
    DecodeOnlyEncoding(String),

    /// Some content has no representation in the output charset.
    #[error("content of '{id}' cannot be represented in {encoding}")]
    Unmappable { id: String, encoding: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from a [`crate::docstore::DocumentStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("document store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document has no string field '{0}' to key on")]
    MissingKey(String),
}

pub(crate) fn store_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_and_server_errors_are_transient() {
        assert!(SinkError::Network("refused".into()).is_transient());
        assert!(SinkError::Status { code: 503, body: String::new() }.is_transient());
        assert!(!SinkError::Status { code: 400, body: String::new() }.is_transient());
        assert!(!SinkError::Unauthorized("401".into()).is_transient());
        assert!(!SinkError::Parse("eof".into()).is_transient());
    }
}

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SyncError {
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("corrupt metadata file at {path}: {message}")]
    CorruptMetadata { path: PathBuf, message: String },

    #[error("invalid timestamp {value:?}: {message}")]
    TimestampParse { value: String, message: String },

    #[error("download failed: {0}")]
    Fetch(String),

    #[error("download returned status {status}: {message}")]
    FetchStatus { status: u16, message: String },

    #[error("gzip decompression failed: {0}")]
    Decompress(String),

    #[error("fetch failed after {attempts} attempts")]
    FetchExhausted {
        attempts: u32,
        #[source]
        source: Box<SyncError>,
    },

    #[error("directory does not exist: {0}")]
    DirectoryMissing(PathBuf),

    #[error("upload of {key} failed: {message}")]
    Upload { key: String, message: String },

    #[error("missing object store credential: {0}")]
    MissingCredential(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl SyncError {
    /// Innermost error of an exhausted fetch, or the error itself.
    pub fn root_cause(&self) -> &SyncError {
        match self {
            SyncError::FetchExhausted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

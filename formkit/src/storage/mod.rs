//! Upload storage
//!
//! Files attached to an in-flight form are written to disk when the
//! submission arrives and deleted once a delivery run completes (or when the
//! visitor replaces/removes them, or when the garbage collector sweeps them).
//!
//! [`UploadStore`] is the backend seam; [`LocalUploadStore`] is the shipped
//! filesystem implementation.

mod local;

pub use local::LocalUploadStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Upload storage error type
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Path outside the storage root or otherwise unusable
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Referenced upload no longer exists
    #[error("upload not found: {0}")]
    NotFound(String),
}

/// Convenience alias for storage results
pub type StorageResult<T> = Result<T, StorageError>;

/// A file received from a multipart submission, not yet written to storage
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Original client-side filename
    pub filename: String,
    /// Raw file contents
    pub data: Vec<u8>,
}

impl UploadedFile {
    /// Create an uploaded file from its name and contents
    #[must_use]
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self { filename: filename.into(), data }
    }

    /// Size of the file in bytes
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Reference to a stored upload, kept in the form state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUpload {
    /// Path relative to the storage root (`<uuid>/<filename>`)
    pub path: String,
    /// Original filename, for display and mail attachments
    pub name: String,
    /// Size in bytes
    pub size: u64,
}

/// Storage backend for form uploads
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Write `file` to storage and return its reference
    async fn store(&self, file: UploadedFile) -> StorageResult<StoredUpload>;

    /// Read the contents of a stored upload
    async fn read(&self, upload: &StoredUpload) -> StorageResult<Vec<u8>>;

    /// Delete a stored upload (idempotent)
    async fn delete(&self, upload: &StoredUpload) -> StorageResult<()>;

    /// Delete every entry older than `grace`, returning how many were removed
    ///
    /// Compensates for abandoned forms whose uploads were never submitted.
    async fn sweep(&self, grace: Duration) -> StorageResult<u64>;
}

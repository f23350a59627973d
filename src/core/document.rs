//! Versioned remote documents holding the portfolio and its history.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Request to document store failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Document store returned {status} for {path}")]
    Status { status: u16, path: String },

    #[error("Could not decode document {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Document {path} changed since it was read")]
    Conflict { path: String },

    #[error("Document I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Document content plus the token a conditional write must present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedDocument {
    pub content: String,
    pub version: String,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads a document; `Ok(None)` when it does not exist yet.
    async fn fetch(&self, path: &str) -> Result<Option<VersionedDocument>, DocumentError>;

    /// Writes a whole document. With `version == None` the document is
    /// created; otherwise the write only succeeds if the stored version still
    /// matches, and fails with [`DocumentError::Conflict`] if not. Returns the
    /// new version.
    async fn put(
        &self,
        path: &str,
        content: &str,
        version: Option<&str>,
    ) -> Result<String, DocumentError>;
}

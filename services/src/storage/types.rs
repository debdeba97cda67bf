//! File storage types.

use bytes::Bytes;
use futures_util::stream::BoxStream;

/// Chunked byte stream of a stored object.
pub type ObjectStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Content type of every normalized contribution.
pub const CONTRIBUTION_CONTENT_TYPE: &str = "image/png";

/// Name used when the client did not supply one (canvas/base64 uploads).
pub const DEFAULT_UPLOAD_NAME: &str = "canvas";

/// A normalized image ready to be persisted for a collection.
#[derive(Debug, Clone)]
pub struct ContributionUpload {
    pub collection_id: i64,
    pub user_id: i64,
    /// Client supplied file name, if any. Only its sanitized stem is kept.
    pub original_name: Option<String>,
    pub content: Vec<u8>,
}

impl ContributionUpload {
    pub fn new(collection_id: i64, user_id: i64, content: Vec<u8>) -> Self {
        Self {
            collection_id,
            user_id,
            original_name: None,
            content,
        }
    }

    pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }
}

/// Error type for file storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Reference does not belong to this backend: {0}")]
    InvalidReference(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Remote storage error: {0}")]
    Remote(String),
}

impl From<opendal::Error> for StorageError {
    fn from(e: opendal::Error) -> Self {
        StorageError::Remote(e.to_string())
    }
}

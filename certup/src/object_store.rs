use async_trait::async_trait;
use thiserror::Error;

pub use gcs::GcsClient;

mod gcs;

/// Errors reported by an object store backend.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    /// The backend rejected the request.
    #[error("object store error: {0}")]
    Api(String),
    /// Transport failure talking to the backend.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Blob storage addressed by bucket and path.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `data` to `path` inside `bucket`, overwriting any existing
    /// object at that path.
    async fn put(&self, bucket: &str, path: &str, data: &[u8]) -> Result<(), ObjectStoreError>;
}

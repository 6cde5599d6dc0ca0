use async_trait::async_trait;
use thiserror::Error;

pub use vault::VaultClient;

mod vault;

/// Errors reported by a secret store backend.
#[derive(Debug, Error)]
pub enum SecretStoreError {
    /// No secret exists under the requested name.
    #[error("secret not found: {0}")]
    NotFound(String),
    /// The backend rejected the request.
    #[error("secret store error: {0}")]
    Api(String),
    /// Transport failure talking to the backend.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Named secret storage.
///
/// Backends store opaque string values under string names. A missing
/// secret is reported as [`SecretStoreError::NotFound`] so callers can
/// tell "not there yet" apart from a failing store.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the value stored under `name`.
    async fn get(&self, name: &str) -> Result<String, SecretStoreError>;

    /// Store `value` under `name`, creating or overwriting the secret.
    async fn put(&self, name: &str, value: &str) -> Result<(), SecretStoreError>;
}

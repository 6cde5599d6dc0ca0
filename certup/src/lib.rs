//! Automated TLS certificate issuance with artifact upload.
//!
//! This crate obtains a certificate for one configured domain (plus its
//! wildcard) from an ACME CA using DNS-01 validation, then uploads the
//! issued artifacts to an object storage bucket. The private key is kept
//! in a secret store under a name derived from the ACME server host and
//! reused by every later run against that server; the account registration
//! and the order are requested fresh each run.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use certup::{AcmeConnector, Dns01Client, GcsClient, Issuer, IssuerConfig, VaultClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IssuerConfig::builder()
//!         .acme_server("acme-staging-v02.api.letsencrypt.org")
//!         .account_email("admin@example.com")
//!         .domain("example.com")
//!         .output_bucket("example-certs")
//!         .build();
//!     let dns01_client = Dns01Client::new_cloudflare(
//!         "cloudflare-zone-id".to_string(),
//!         "cloudflare-api-token".to_string(),
//!     );
//!     let acme = AcmeConnector::new(config.acme_url(), dns01_client);
//!     let issuer = Issuer::new(
//!         config,
//!         Arc::new(VaultClient::new("http://127.0.0.1:8200", "vault-token", "secret")),
//!         Arc::new(GcsClient::new("gcs-access-token")),
//!         Arc::new(acme),
//!     );
//!     issuer.run().await
//! }
//! ```

pub use account::{Account, Registration};
pub use acme_client::{AcmeAccount, AcmeClient, AcmeConnector, AcmeDirectory, CertificateBundle};
pub use credentials::CredentialManager;
pub use dns01_client::{CloudflareClient, Dns01Client};
pub use issuer::{Issuer, IssuerConfig};
pub use object_store::{GcsClient, ObjectStore, ObjectStoreError};
pub use secret_store::{SecretStore, SecretStoreError, VaultClient};
pub use uploader::Uploader;

mod account;
mod acme_client;
mod credentials;
mod dns01_client;
mod issuer;
mod object_store;
mod secret_store;
#[cfg(test)]
mod test_support;
mod uploader;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::acme_client::CertificateBundle;
use crate::object_store::ObjectStore;

/// Writes issued certificate artifacts into the output bucket.
///
/// The layout under the bucket is fixed: `<domain>/<domain>.crt` for the
/// full chain, `<domain>/<domain>.key` for the private key and
/// `<domain>/<domain>.ca.crt` for the issuer chain.
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl Uploader {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Upload the three bundle artifacts under the domain prefix.
    ///
    /// Artifacts are written one by one; the first failed write aborts the
    /// upload and objects already written stay in place.
    pub async fn upload_certificate(&self, domain: &str, bundle: &CertificateBundle) -> Result<()> {
        let objects = [
            (
                format!("{domain}/{domain}.crt"),
                bundle.certificate.as_bytes(),
            ),
            (
                format!("{domain}/{domain}.key"),
                bundle.private_key.as_bytes(),
            ),
            (
                format!("{domain}/{domain}.ca.crt"),
                bundle.issuer_certificate.as_bytes(),
            ),
        ];
        for (path, data) in objects {
            debug!("uploading {path}");
            self.store
                .put(&self.bucket, &path, data)
                .await
                .with_context(|| format!("failed to upload {path}"))?;
        }
        info!("uploaded certificate for {domain} to {}", self.bucket);
        Ok(())
    }
}

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::account::Account;
use crate::acme_client::AcmeDirectory;
use crate::credentials::CredentialManager;
use crate::object_store::ObjectStore;
use crate::secret_store::SecretStore;
use crate::uploader::Uploader;

/// Configuration for one issuance run.
#[derive(Clone, Debug, bon::Builder)]
#[builder(on(String, into))]
pub struct IssuerConfig {
    /// Host name of the ACME server. Also names the stored key, so
    /// switching servers switches to a different key.
    acme_server: String,
    /// Contact email registered with the ACME account.
    account_email: String,
    /// Domain the certificate is issued for. The wildcard name is added
    /// automatically.
    domain: String,
    /// Bucket receiving the issued artifacts.
    output_bucket: String,
}

impl IssuerConfig {
    /// Directory URL of the configured ACME server.
    pub fn acme_url(&self) -> String {
        format!("https://{}/directory", self.acme_server)
    }
}

/// Runs the issuance pipeline end to end.
///
/// One run prepares the managed private key, registers an ACME account,
/// orders a certificate for the domain and its wildcard, and uploads the
/// issued artifacts. Every step depends on the previous one, so the first
/// error aborts the run.
pub struct Issuer {
    config: IssuerConfig,
    secret_store: Arc<dyn SecretStore>,
    object_store: Arc<dyn ObjectStore>,
    acme: Arc<dyn AcmeDirectory>,
}

impl Issuer {
    pub fn new(
        config: IssuerConfig,
        secret_store: Arc<dyn SecretStore>,
        object_store: Arc<dyn ObjectStore>,
        acme: Arc<dyn AcmeDirectory>,
    ) -> Self {
        Self {
            config,
            secret_store,
            object_store,
            acme,
        }
    }

    pub async fn run(&self) -> Result<()> {
        info!("issuing certificate for {}", self.config.domain);
        let credentials =
            CredentialManager::new(self.secret_store.clone(), &self.config.acme_server);
        let key = credentials
            .create_or_retrieve()
            .await
            .context("failed to prepare private key")?;
        let mut account = Account::new(&self.config.account_email, key);

        let acme_account = self
            .acme
            .register(account.email())
            .await
            .context("failed to register account")?;
        let registration = acme_account.registration();
        info!("using account {}", registration.account_id());
        account.set_registration(registration);

        let domains = vec![
            self.config.domain.clone(),
            format!("*.{}", self.config.domain),
        ];
        let key_pem = account.private_key().serialize_pem();
        let bundle = acme_account
            .obtain_certificate(&key_pem, &domains)
            .await
            .context("failed to obtain certificate")?;

        let uploader = Uploader::new(self.object_store.clone(), &self.config.output_bucket);
        uploader
            .upload_certificate(&self.config.domain, &bundle)
            .await
            .context("failed to upload certificate")
    }
}

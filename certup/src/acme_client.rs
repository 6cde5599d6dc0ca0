use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use hickory_resolver::error::ResolveErrorKind;
use instant_acme::{
    Account, AuthorizationStatus, ChallengeType, Identifier, NewAccount, NewOrder, Order,
    OrderStatus,
};
use rcgen::{CertificateParams, DistinguishedName, KeyPair};
use tokio::time::sleep;
use tracing::{debug, error, info};
use x509_parser::prelude::Pem;

use crate::account::Registration;
use crate::dns01_client::{Dns01Api, Dns01Client};

/// Issued certificate artifacts, all PEM encoded.
#[derive(Debug, Clone)]
pub struct CertificateBundle {
    /// The certificate chain as issued by the CA, leaf certificate first.
    pub certificate: String,
    /// Private key matching the leaf certificate.
    pub private_key: String,
    /// The issuer chain, without the leaf certificate.
    pub issuer_certificate: String,
}

/// An ACME directory accounts can be registered against.
#[async_trait]
pub trait AcmeDirectory: Send + Sync {
    /// Register a new account, agreeing to the terms of service.
    async fn register(&self, email: &str) -> Result<Box<dyn AcmeAccount>>;
}

/// A registered ACME account, able to order certificates.
#[async_trait]
pub trait AcmeAccount: Send + Sync {
    /// The registration handle assigned by the CA.
    fn registration(&self) -> Registration;

    /// Obtain a certificate for the given domains, finalized with a CSR
    /// signed by `key_pem`.
    async fn obtain_certificate(
        &self,
        key_pem: &str,
        domains: &[String],
    ) -> Result<CertificateBundle>;
}

/// Connects one ACME directory with one DNS-01 client, handing out
/// registered accounts.
pub struct AcmeConnector {
    acme_url: String,
    dns01_client: Dns01Client,
}

impl AcmeConnector {
    pub fn new(acme_url: impl Into<String>, dns01_client: Dns01Client) -> Self {
        Self {
            acme_url: acme_url.into(),
            dns01_client,
        }
    }
}

#[async_trait]
impl AcmeDirectory for AcmeConnector {
    async fn register(&self, email: &str) -> Result<Box<dyn AcmeAccount>> {
        let client = AcmeClient::register(&self.acme_url, email, self.dns01_client.clone()).await?;
        Ok(Box::new(client))
    }
}

/// A AcmeClient instance, bound to one registered account.
pub struct AcmeClient {
    account: Account,
    dns01_client: Dns01Client,
}

#[derive(Debug, Clone)]
struct Challenge {
    id: String,
    acme_domain: String,
    url: String,
    dns_value: String,
}

impl AcmeClient {
    /// Register a new account with the given contact email.
    pub async fn register(acme_url: &str, email: &str, dns01_client: Dns01Client) -> Result<Self> {
        let contact = format!("mailto:{email}");
        let (account, _credentials) = Account::create(
            &NewAccount {
                contact: &[contact.as_str()],
                terms_of_service_agreed: true,
                only_return_existing: false,
            },
            acme_url,
            None,
        )
        .await
        .context("failed to create new account")?;
        info!("registered new account {}", account.id());
        Ok(Self {
            account,
            dns01_client,
        })
    }

    /// Request a new certificate for the given domains.
    ///
    /// Returns the issued artifacts encoded in PEM format. Challenge
    /// records created along the way are removed afterwards, whatever the
    /// outcome.
    pub async fn request_certificate(
        &self,
        key_pem: &str,
        domains: &[String],
    ) -> Result<CertificateBundle> {
        info!("requesting new certificates for {}", domains.join(", "));
        let mut challenges = Vec::new();
        let result = self
            .request_certificate_inner(key_pem, domains, &mut challenges)
            .await;
        for challenge in &challenges {
            debug!("removing dns record {}", challenge.id);
            if let Err(err) = self.dns01_client.remove_record(&challenge.id).await {
                error!("failed to remove dns record {}: {err}", challenge.id);
            }
        }
        result
    }
}

#[async_trait]
impl AcmeAccount for AcmeClient {
    fn registration(&self) -> Registration {
        Registration::new(self.account.id())
    }

    async fn obtain_certificate(
        &self,
        key_pem: &str,
        domains: &[String],
    ) -> Result<CertificateBundle> {
        self.request_certificate(key_pem, domains).await
    }
}

impl AcmeClient {
    async fn authorize(&self, order: &mut Order, challenges: &mut Vec<Challenge>) -> Result<()> {
        let authorizations = order
            .authorizations()
            .await
            .context("failed to get authorizations")?;
        let mut cleaned = BTreeSet::new();
        for authz in &authorizations {
            match authz.status {
                AuthorizationStatus::Pending => {}
                AuthorizationStatus::Valid => continue,
                _ => bail!("unsupported authorization status: {:?}", authz.status),
            }

            let challenge = authz
                .challenges
                .iter()
                .find(|c| c.r#type == ChallengeType::Dns01)
                .context("no dns01 challenge found")?;

            let Identifier::Dns(identifier) = &authz.identifier;

            let dns_value = order.key_authorization(challenge).dns_value();
            debug!("creating dns record for {}", identifier);
            let acme_domain = format!("_acme-challenge.{identifier}");
            let id = publish_challenge(&self.dns01_client, &mut cleaned, &acme_domain, &dns_value)
                .await?;
            challenges.push(Challenge {
                id,
                acme_domain,
                url: challenge.url.clone(),
                dns_value,
            });
        }
        Ok(())
    }

    /// Self check the TXT records for the given challenges.
    async fn check_dns(&self, challenges: &[Challenge]) -> Result<()> {
        let mut delay = Duration::from_millis(250);
        let mut tries = 1u8;

        let mut unsettled_challenges = challenges.to_vec();

        'outer: loop {
            use hickory_resolver::AsyncResolver;

            sleep(delay).await;

            let dns_resolver =
                AsyncResolver::tokio_from_system_conf().context("failed to create dns resolver")?;

            while let Some(challenge) = unsettled_challenges.pop() {
                let settled = match dns_resolver.txt_lookup(&challenge.acme_domain).await {
                    Ok(record) => record
                        .iter()
                        .any(|txt| txt.to_string() == challenge.dns_value),
                    Err(err) => {
                        let ResolveErrorKind::NoRecordsFound { .. } = err.kind() else {
                            bail!(
                                "failed to lookup dns record {}: {err}",
                                challenge.acme_domain
                            );
                        };
                        false
                    }
                };
                if !settled {
                    delay *= 2;
                    tries += 1;
                    if tries < 10 {
                        debug!(
                            tries,
                            domain = &challenge.acme_domain,
                            "challenge not found, waiting {delay:?}"
                        );
                    } else {
                        bail!("dns record not found");
                    }
                    unsettled_challenges.push(challenge);
                    continue 'outer;
                }
            }
            break;
        }
        Ok(())
    }

    async fn request_certificate_inner(
        &self,
        key_pem: &str,
        domains: &[String],
        challenges: &mut Vec<Challenge>,
    ) -> Result<CertificateBundle> {
        debug!("creating new order for {}", domains.join(", "));
        let identifiers = domains
            .iter()
            .map(|name| Identifier::Dns(name.clone()))
            .collect::<Vec<_>>();
        let mut order = self
            .account
            .new_order(&NewOrder {
                identifiers: &identifiers,
            })
            .await
            .context("failed to create new order")?;
        let mut challenges_ready = false;
        loop {
            order.refresh().await.context("failed to refresh order")?;
            match order.state().status {
                // Need to accept the challenge
                OrderStatus::Pending => {
                    if challenges_ready {
                        debug!("challenges are ready, waiting for order to be ready");
                        sleep(Duration::from_secs(2)).await;
                        continue;
                    }
                    debug!("order is pending, waiting for authorization");
                    self.authorize(&mut order, challenges)
                        .await
                        .context("failed to authorize")?;
                    if challenges.is_empty() {
                        bail!("no challenges found");
                    }
                    self.check_dns(challenges)
                        .await
                        .context("failed to check dns")?;
                    for challenge in &*challenges {
                        debug!("setting challenge ready for {}", challenge.url);
                        order
                            .set_challenge_ready(&challenge.url)
                            .await
                            .context("failed to set challenge ready")?;
                    }
                    challenges_ready = true;
                    continue;
                }
                // To upload CSR
                OrderStatus::Ready => {
                    debug!("order is ready, uploading CSR");
                    let csr = make_csr(key_pem, domains)?;
                    order
                        .finalize(csr.as_ref())
                        .await
                        .context("failed to finalize order")?;
                    continue;
                }
                // Need to wait for the CSR to be accepted
                OrderStatus::Processing => {
                    debug!("order is processing, waiting for the CSR to be accepted");
                    sleep(Duration::from_secs(2)).await;
                    continue;
                }
                // Certificate is ready
                OrderStatus::Valid => {
                    debug!("order is valid, getting certificate");
                    let chain_pem = extract_certificate(order).await?;
                    return bundle_certificate(chain_pem, key_pem);
                }
                // Something went wrong
                OrderStatus::Invalid => bail!("order is invalid"),
            }
        }
    }
}

/// Publish one challenge TXT record, clearing stale records the first
/// time a name is touched. A domain and its wildcard share one challenge
/// name per RFC 8555, so cleanup must not run again once a sibling value
/// has been added.
async fn publish_challenge(
    dns01_client: &impl Dns01Api,
    cleaned: &mut BTreeSet<String>,
    acme_domain: &str,
    dns_value: &str,
) -> Result<String> {
    if cleaned.insert(acme_domain.to_string()) {
        dns01_client
            .remove_txt_records(acme_domain)
            .await
            .context("failed to remove existing dns record")?;
    }
    dns01_client
        .add_txt_record(acme_domain, dns_value)
        .await
        .context("failed to create dns record")
}

fn make_csr(key: &str, names: &[String]) -> Result<Vec<u8>> {
    let mut params =
        CertificateParams::new(names).context("failed to create certificate params")?;
    params.distinguished_name = DistinguishedName::new();
    let key = KeyPair::from_pem(key).context("failed to parse private key")?;
    let csr = params
        .serialize_request(&key)
        .context("failed to serialize certificate request")?;
    Ok(csr.der().as_ref().to_vec())
}

async fn extract_certificate(mut order: Order) -> Result<String> {
    let mut tries = 0;
    let cert_chain_pem = loop {
        tries += 1;
        if tries > 5 {
            bail!("failed to get certificate");
        }
        match order
            .certificate()
            .await
            .context("failed to get certificate")?
        {
            Some(cert_chain_pem) => break cert_chain_pem,
            None => sleep(Duration::from_secs(1)).await,
        }
    };
    Ok(cert_chain_pem)
}

fn bundle_certificate(chain_pem: String, key_pem: &str) -> Result<CertificateBundle> {
    let pem = read_pem(&chain_pem)?;
    let cert = pem.parse_x509().context("Invalid x509 certificate")?;
    let not_after = cert.validity().not_after.to_datetime();
    let now = time::OffsetDateTime::now_utc();
    debug!("certificate expires in {:?}", not_after - now);
    info!("obtained certificate, not valid after {not_after}");

    let issuer_certificate = split_issuer_chain(&chain_pem)?;
    Ok(CertificateBundle {
        certificate: chain_pem,
        private_key: key_pem.to_string(),
        issuer_certificate,
    })
}

/// Split the issuer part off a bundled chain, leaving the leaf behind.
fn split_issuer_chain(chain_pem: &str) -> Result<String> {
    const END_MARKER: &str = "-----END CERTIFICATE-----";
    let leaf_end = chain_pem
        .find(END_MARKER)
        .context("no certificate in chain")?
        + END_MARKER.len();
    let issuer = chain_pem[leaf_end..].trim_start();
    if issuer.is_empty() {
        bail!("no issuer certificate in chain");
    }
    let pem = read_pem(issuer)?;
    pem.parse_x509().context("Invalid issuer certificate")?;
    Ok(issuer.to_string())
}

pub(crate) fn read_pem(cert_pem: &str) -> Result<Pem> {
    Pem::iter_from_buffer(cert_pem.as_bytes())
        .next()
        .transpose()
        .context("Invalid pem")?
        .context("no certificate in pem")
}

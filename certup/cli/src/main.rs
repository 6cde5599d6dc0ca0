use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use certup::{AcmeConnector, Dns01Client, GcsClient, Issuer, IssuerConfig, VaultClient};
use clap::Parser;
use documented::DocumentedFields;
use fs_err as fs;
use serde::{Deserialize, Serialize};
use toml_edit::ser::to_document;

#[derive(Parser)]
enum Command {
    /// Issue a certificate and upload it to the output bucket
    Issue {
        /// Path to the configuration file
        #[arg(short, long, default_value = "certup.toml")]
        config: PathBuf,
    },
    /// Generate configuration template
    Cfg {
        /// Write to file
        #[arg(short, long)]
        write_to: Option<PathBuf>,
    },
}

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Deserialize, Serialize, DocumentedFields)]
struct Config {
    /// ACME server host
    acme_server: String,
    /// Contact email registered with the ACME account
    account_email: String,
    /// Domain to issue certificates for
    domain: String,
    /// Bucket receiving the issued artifacts
    output_bucket: String,
    /// Cloudflare zone ID
    cf_zone_id: String,
    /// Cloudflare API token
    cf_api_token: String,
    /// Vault server URL
    vault_url: String,
    /// Vault access token
    vault_token: String,
    /// Vault KV v2 mount point
    vault_mount: String,
    /// GCS access token
    gcs_access_token: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            acme_server: "acme-staging-v02.api.letsencrypt.org".into(),
            account_email: "".into(),
            domain: "example.com".into(),
            output_bucket: "".into(),
            cf_zone_id: "".into(),
            cf_api_token: "".into(),
            vault_url: "http://127.0.0.1:8200".into(),
            vault_token: "".into(),
            vault_mount: "secret".into(),
            gcs_access_token: "".into(),
        }
    }
}

impl Config {
    fn to_commented_toml(&self) -> Result<String> {
        let mut doc = to_document(self)?;

        for (i, (mut key, _value)) in doc.iter_mut().enumerate() {
            let decor = key.leaf_decor_mut();
            let docstring = Self::FIELD_DOCS[i];

            let mut comment = String::new();
            for line in docstring.lines() {
                let line = if line.is_empty() {
                    String::from("#\n")
                } else {
                    format!("# {line}\n")
                };
                comment.push_str(&line);
            }
            decor.set_prefix(comment);
        }
        Ok(doc.to_string())
    }
}

fn load_config(config: &PathBuf) -> Result<Config> {
    let config: Config = toml_edit::de::from_str(&fs::read_to_string(config)?)?;
    Ok(config)
}

fn issuer_config(config: &Config) -> IssuerConfig {
    IssuerConfig::builder()
        .acme_server(&config.acme_server)
        .account_email(&config.account_email)
        .domain(&config.domain)
        .output_bucket(&config.output_bucket)
        .build()
}

fn build_issuer(config: Config) -> Issuer {
    let issuer_config = issuer_config(&config);
    let dns01_client = Dns01Client::new_cloudflare(config.cf_zone_id, config.cf_api_token);
    let acme = AcmeConnector::new(issuer_config.acme_url(), dns01_client);
    let secret_store = VaultClient::new(config.vault_url, config.vault_token, config.vault_mount);
    let object_store = GcsClient::new(config.gcs_access_token);
    Issuer::new(
        issuer_config,
        Arc::new(secret_store),
        Arc::new(object_store),
        Arc::new(acme),
    )
}

async fn issue(config: &PathBuf) -> Result<()> {
    let config = load_config(config).context("Failed to load configuration")?;
    let issuer = build_issuer(config);
    issuer.run().await
}

#[tokio::main]
async fn main() -> Result<()> {
    {
        use tracing_subscriber::{fmt, EnvFilter};
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt().with_env_filter(filter).init();
    }
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install default crypto provider");

    let args = Args::parse();
    match args.command {
        Command::Issue { config } => {
            issue(&config).await?;
        }
        Command::Cfg { write_to } => {
            let toml_str = Config::default().to_commented_toml()?;
            match write_to {
                Some(path) => fs::write(path, toml_str)?,
                None => println!("{}", toml_str),
            }
        }
    }
    Ok(())
}

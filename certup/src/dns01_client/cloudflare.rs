use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::dns01_client::Record;

use super::Dns01Api;

const CLOUDFLARE_API_URL: &str = "https://api.cloudflare.com/client/v4";

#[derive(Debug, Clone)]
pub struct CloudflareClient {
    zone_id: String,
    api_token: String,
}

impl CloudflareClient {
    pub fn new(zone_id: String, api_token: String) -> Self {
        Self { zone_id, api_token }
    }
}

impl Dns01Api for CloudflareClient {
    async fn add_txt_record(&self, domain: &str, content: &str) -> Result<String> {
        let client = Client::new();
        let url = format!("{}/zones/{}/dns_records", CLOUDFLARE_API_URL, self.zone_id);
        let response = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .header("Content-Type", "application/json")
            .json(&json!({
                "type": "TXT",
                "name": domain,
                "content": content,
                "ttl": 120
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!(
                "failed to create acme challenge: {}",
                response.text().await?
            );
        }

        #[derive(Deserialize)]
        struct Response {
            result: ApiResult,
        }

        #[derive(Deserialize)]
        struct ApiResult {
            id: String,
        }

        let response: Response = response.json().await.context("failed to parse response")?;

        Ok(response.result.id)
    }

    async fn remove_record(&self, record_id: &str) -> Result<()> {
        let client = Client::new();
        let url = format!(
            "{}/zones/{}/dns_records/{}",
            CLOUDFLARE_API_URL, self.zone_id, record_id
        );

        let response = client
            .delete(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!(
                "failed to remove acme challenge: {}",
                response.text().await?
            );
        }

        Ok(())
    }

    async fn get_records(&self, domain: &str) -> Result<Vec<Record>> {
        let client = Client::new();
        let url = format!("{}/zones/{}/dns_records", CLOUDFLARE_API_URL, self.zone_id);

        let response = client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("failed to get dns records: {}", response.text().await?);
        }

        #[derive(Deserialize, Debug)]
        struct CloudflareResponse {
            result: Vec<Record>,
        }

        let response: CloudflareResponse =
            response.json().await.context("failed to parse response")?;

        let records = response
            .result
            .into_iter()
            .filter(|record| record.name == domain)
            .collect();
        Ok(records)
    }

    async fn remove_txt_records(&self, challenge_domain: &str) -> Result<()> {
        for record in self.get_txt_records(challenge_domain).await? {
            self.remove_record(&record.id).await?;
        }
        Ok(())
    }
}

impl CloudflareClient {
    async fn get_txt_records(&self, domain: &str) -> Result<Vec<Record>> {
        Ok(self
            .get_records(domain)
            .await?
            .into_iter()
            .filter(|r| r.r#type == "TXT")
            .collect())
    }
}

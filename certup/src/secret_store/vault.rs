use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{SecretStore, SecretStoreError};

/// Secret storage backed by the Vault KV version 2 engine.
#[derive(Debug, Clone)]
pub struct VaultClient {
    url: String,
    token: String,
    mount: String,
}

impl VaultClient {
    pub fn new(url: impl Into<String>, token: impl Into<String>, mount: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            mount: mount.into(),
        }
    }

    fn secret_url(&self, name: &str) -> String {
        format!("{}/v1/{}/data/{}", self.url, self.mount, name)
    }
}

#[async_trait]
impl SecretStore for VaultClient {
    async fn get(&self, name: &str) -> Result<String, SecretStoreError> {
        let client = Client::new();
        let response = client
            .get(self.secret_url(name))
            .header("X-Vault-Token", &self.token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SecretStoreError::NotFound(name.to_string()));
        }
        if !response.status().is_success() {
            return Err(SecretStoreError::Api(response.text().await?));
        }

        #[derive(Deserialize)]
        struct Response {
            data: Data,
        }

        // KV v2 nests the stored entry under data.data.
        #[derive(Deserialize)]
        struct Data {
            data: Entry,
        }

        #[derive(Deserialize)]
        struct Entry {
            value: String,
        }

        let response: Response = response.json().await?;
        Ok(response.data.data.value)
    }

    async fn put(&self, name: &str, value: &str) -> Result<(), SecretStoreError> {
        let client = Client::new();
        let response = client
            .post(self.secret_url(name))
            .header("X-Vault-Token", &self.token)
            .json(&json!({
                "data": {
                    "value": value
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SecretStoreError::Api(response.text().await?));
        }
        Ok(())
    }
}

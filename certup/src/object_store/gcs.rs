use async_trait::async_trait;
use reqwest::Client;

use super::{ObjectStore, ObjectStoreError};

const GCS_UPLOAD_URL: &str = "https://storage.googleapis.com/upload/storage/v1";

/// Object storage backed by the GCS JSON API media upload endpoint.
#[derive(Debug, Clone)]
pub struct GcsClient {
    access_token: String,
}

impl GcsClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for GcsClient {
    async fn put(&self, bucket: &str, path: &str, data: &[u8]) -> Result<(), ObjectStoreError> {
        let client = Client::new();
        let url = format!("{GCS_UPLOAD_URL}/b/{bucket}/o");
        let response = client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", path)])
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Content-Type", "application/octet-stream")
            .body(data.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ObjectStoreError::Api(response.text().await?));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;

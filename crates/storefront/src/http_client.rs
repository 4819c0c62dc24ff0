use std::time::Duration;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, StorefrontError};
use crate::invoice::{find_by_unique_id, Invoice, InvoicePage};

pub struct StorefrontClient {
    client: Client,
    config: Config,
}

impl StorefrontClient {
    pub fn new(config: Config) -> Result<Self> {
        if config.shop_id.is_empty() {
            return Err(StorefrontError::Config("shop id is empty".into()));
        }
        if config.api_key.is_empty() {
            return Err(StorefrontError::Config("API key is empty".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StorefrontError::Config(format!("Failed to build client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        self.client
            .get(url)
            .bearer_auth(&self.config.api_key)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| StorefrontError::Http(format!("GET request failed: {}", e)))
    }

    /// Fetch every invoice of the configured shop in a single request
    pub async fn list_invoices(&self) -> Result<Vec<Invoice>> {
        let url = self.config.invoices_url();
        let response = self.get(&url).await?;
        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| StorefrontError::Http(format!("Failed to read body: {}", e)))?;
        debug!("Raw storefront response ({}): {}", status, raw);

        if !status.is_success() {
            return Err(StorefrontError::Status {
                status: status.as_u16(),
                body: raw,
            });
        }

        let page: InvoicePage = serde_json::from_str(&raw)
            .map_err(|e| StorefrontError::Decode(format!("JSON parse failed: {}", e)))?;
        Ok(page.data)
    }

    pub async fn find_invoice(&self, unique_id: &str) -> Result<Option<Invoice>> {
        let invoices = self.list_invoices().await?;
        Ok(find_by_unique_id(&invoices, unique_id).cloned())
    }
}

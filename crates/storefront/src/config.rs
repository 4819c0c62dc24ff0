pub const DEFAULT_API_BASE: &str = "https://api.sellauth.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base: String,
    pub shop_id: String,
    pub api_key: String,
    /// Transport timeout; a stalled storefront fails instead of hanging the request
    pub timeout_secs: u64,
}

impl Config {
    pub fn new(shop_id: &str, api_key: &str) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            shop_id: shop_id.to_string(),
            api_key: api_key.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn invoices_url(&self) -> String {
        format!("{}/v1/shops/{}/invoices", self.api_base, self.shop_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoices_url() {
        let config = Config::new("42", "key");
        assert_eq!(
            config.invoices_url(),
            "https://api.sellauth.com/v1/shops/42/invoices"
        );

        let config = config.with_api_base("http://127.0.0.1:9000/");
        assert_eq!(
            config.invoices_url(),
            "http://127.0.0.1:9000/v1/shops/42/invoices"
        );
    }
}

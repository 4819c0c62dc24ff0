use std::path::PathBuf;

use anyhow::Context;

pub const DEFAULT_LEDGER_PATH: &str = "used_invoices.json";

/// Where already-redeemed invoice ids are kept
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerBackend {
    File(PathBuf),
    Sql(String),
}

#[derive(Clone)]
pub struct RedeemerConfig {
    pub discord_token: String,
    pub shop_id: String,
    pub api_key: String,
    pub api_base: String,
    pub client_role_id: u64,
    pub redeem_channel_id: u64,
    pub log_channel_id: Option<u64>,
    pub ledger: LedgerBackend,
    pub http_timeout_secs: u64,
}

impl RedeemerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| -> anyhow::Result<String> {
            var(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{} must be set", key))
        };
        let snowflake = |key: &str, raw: String| -> anyhow::Result<u64> {
            raw.trim()
                .parse()
                .with_context(|| format!("{} is not a valid Discord id: {}", key, raw))
        };

        let discord_token = required("DISCORD_TOKEN")?;
        let shop_id = required("SHOP_ID")?;
        let api_key = required("SELLAUTH_API_KEY")?;
        let api_base = var("SELLAUTH_API_URL")
            .unwrap_or_else(|| storefront::DEFAULT_API_BASE.to_string());

        let client_role_id = snowflake("CLIENT_ROLE_ID", required("CLIENT_ROLE_ID")?)?;
        let redeem_channel_id = snowflake("REDEEM_CHANNEL_ID", required("REDEEM_CHANNEL_ID")?)?;
        let log_channel_id = match var("LOG_CHANNEL_ID").filter(|v| !v.trim().is_empty()) {
            Some(raw) => Some(snowflake("LOG_CHANNEL_ID", raw)?),
            None => {
                tracing::warn!("LOG_CHANNEL_ID not set, redemptions are only audited to the log");
                None
            }
        };

        let ledger = match var("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            Some(url) => LedgerBackend::Sql(url),
            None => {
                let path = var("USED_INVOICES_PATH")
                    .unwrap_or_else(|| DEFAULT_LEDGER_PATH.to_string());
                LedgerBackend::File(PathBuf::from(shellexpand::tilde(&path).to_string()))
            }
        };

        let http_timeout_secs = match var("HTTP_TIMEOUT_SECS").filter(|v| !v.trim().is_empty()) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => anyhow::bail!("HTTP_TIMEOUT_SECS must be a positive number of seconds: {}", raw),
            },
            None => storefront::DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            discord_token,
            shop_id,
            api_key,
            api_base,
            client_role_id,
            redeem_channel_id,
            log_channel_id,
            ledger,
            http_timeout_secs,
        })
    }

    pub fn storefront(&self) -> storefront::Config {
        storefront::Config::new(&self.shop_id, &self.api_key)
            .with_api_base(&self.api_base)
            .with_timeout(self.http_timeout_secs)
    }
}

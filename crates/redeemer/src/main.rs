use std::sync::Arc;

use serenity::all::{ChannelId, Client, GatewayIntents};
use serenity::http::Http;
use storefront::StorefrontClient;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod discord;
mod error;
mod ledger;
mod redemption;

use config::RedeemerConfig;
use discord::{ChannelAuditSink, Handler};
use redemption::{AuditSink, LogAuditSink, RedemptionService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "redeemer=info,storefront=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting invoice redeemer");

    let config = RedeemerConfig::from_env()?;
    info!("Shop: {}", config.shop_id);
    info!("Client role: {}", config.client_role_id);
    info!("Ledger: {:?}", config.ledger);

    let ledger = ledger::open(&config.ledger).await?;
    let storefront = Arc::new(StorefrontClient::new(config.storefront())?);

    let audit: Arc<dyn AuditSink> = match config.log_channel_id {
        Some(channel) => Arc::new(ChannelAuditSink::new(
            Arc::new(Http::new(&config.discord_token)),
            ChannelId::new(channel),
        )),
        None => Arc::new(LogAuditSink),
    };

    let service = Arc::new(RedemptionService::new(
        ledger.clone(),
        storefront,
        audit,
        config.client_role_id,
    ));
    let handler = Handler::new(service, ChannelId::new(config.redeem_channel_id));

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES;
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await?;

    ledger.close().await;
    info!("Stopped");
    Ok(())
}

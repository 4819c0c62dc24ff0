//! Durable set of invoice ids that have already been exchanged for a role.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::LedgerBackend;

mod file;
mod sql;

pub use file::JsonFileLedger;
pub use sql::SqlLedger;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger storage error: {0}")]
    Storage(String),

    #[error("Invoice {0} is already recorded")]
    Conflict(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn is_used(&self, invoice_id: &str) -> Result<bool>;

    /// Record `invoice_id`. Atomic per backend: a second insert of the same id
    /// fails with [`LedgerError::Conflict`] and leaves the ledger untouched.
    async fn mark_used(&self, invoice_id: &str) -> Result<()>;

    async fn len(&self) -> Result<usize>;

    async fn close(&self) {}
}

pub async fn open(backend: &LedgerBackend) -> Result<Arc<dyn Ledger>> {
    let ledger: Arc<dyn Ledger> = match backend {
        LedgerBackend::File(path) => Arc::new(JsonFileLedger::open(path.clone())?),
        LedgerBackend::Sql(url) => Arc::new(SqlLedger::connect(url).await?),
    };
    info!("Ledger ready with {} redeemed invoices", ledger.len().await?);
    Ok(ledger)
}

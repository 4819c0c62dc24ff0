use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::info;

use super::{Ledger, LedgerError, Result};

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

/// Ledger backed by the `used_invoices` table
pub struct SqlLedger {
    pool: SqlitePool,
}

impl SqlLedger {
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if url.contains(":memory:") {
            // every connection to `sqlite::memory:` is its own database
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        let ledger = Self { pool };
        ledger.init_schema().await?;
        info!("Connected to invoice ledger database");
        Ok(ledger)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS used_invoices (
                invoice_id TEXT PRIMARY KEY
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Ledger for SqlLedger {
    async fn is_used(&self, invoice_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM used_invoices WHERE invoice_id = ?1")
            .bind(invoice_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn mark_used(&self, invoice_id: &str) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO used_invoices (invoice_id) VALUES (?1) ON CONFLICT(invoice_id) DO NOTHING",
        )
        .bind(invoice_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::Conflict(invoice_id.to_string()));
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM used_invoices")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as usize)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_conflict() {
        let ledger = SqlLedger::connect("sqlite::memory:").await.unwrap();

        assert!(!ledger.is_used("INV-1").await.unwrap());
        ledger.mark_used("INV-1").await.unwrap();
        assert!(ledger.is_used("INV-1").await.unwrap());
        assert!(!ledger.is_used("inv-1").await.unwrap());

        assert!(matches!(
            ledger.mark_used("INV-1").await,
            Err(LedgerError::Conflict(_))
        ));
        assert_eq!(ledger.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_records_survive_reconnect() {
        let temp_dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", temp_dir.path().join("ledger.db").display());

        let ledger = SqlLedger::connect(&url).await.unwrap();
        ledger.mark_used("INV-1").await.unwrap();
        ledger.close().await;

        let ledger = SqlLedger::connect(&url).await.unwrap();
        assert!(ledger.is_used("INV-1").await.unwrap());
        assert_eq!(ledger.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_closed_pool_is_storage_error() {
        let ledger = SqlLedger::connect("sqlite::memory:").await.unwrap();
        ledger.close().await;

        assert!(matches!(
            ledger.is_used("INV-1").await,
            Err(LedgerError::Storage(_))
        ));
    }
}

//! Exchanges a completed, not-yet-used storefront invoice for a role.
//!
//! The chat platform is reached only through [`GrantContext`] and [`AuditSink`],
//! the storefront through [`InvoiceLookup`], so the whole flow runs against fakes in tests.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use storefront::{find_by_unique_id, Invoice, StorefrontClient};
use tracing::{error, info, warn};

use crate::error::{PlatformError, RedeemError, Result, MSG_REDEEMED, MSG_TRY_LATER};
use crate::ledger::{Ledger, LedgerError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requester {
    pub id: u64,
    pub name: String,
}

#[async_trait]
pub trait InvoiceLookup: Send + Sync {
    async fn fetch_invoices(&self) -> storefront::Result<Vec<Invoice>>;
}

#[async_trait]
impl InvoiceLookup for StorefrontClient {
    async fn fetch_invoices(&self) -> storefront::Result<Vec<Invoice>> {
        self.list_invoices().await
    }
}

/// The requester's side of the platform: membership, roles, and the reply channel
#[async_trait]
pub trait GrantContext: Send + Sync {
    fn requester(&self) -> &Requester;

    async fn role_exists(&self, role_id: u64) -> std::result::Result<bool, PlatformError>;

    async fn has_role(&self, role_id: u64) -> std::result::Result<bool, PlatformError>;

    async fn add_role(&self, role_id: u64) -> std::result::Result<(), PlatformError>;

    async fn reply(&self, content: &str, ephemeral: bool) -> std::result::Result<(), PlatformError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditEntry {
    pub requester: Requester,
    pub invoice_id: String,
    pub status: String,
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "🧾 <@{}> ({}) redeemed invoice `{}` (status: {})",
            self.requester.id, self.requester.name, self.invoice_id, self.status
        )
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> std::result::Result<(), PlatformError>;
}

/// Audit sink used when no log channel is configured
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, entry: &AuditEntry) -> std::result::Result<(), PlatformError> {
        info!("Audit: {}", entry);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redemption {
    pub invoice_id: String,
    pub status: String,
    /// False when a concurrent attempt recorded the invoice first
    pub recorded: bool,
}

pub struct RedemptionService {
    ledger: Arc<dyn Ledger>,
    invoices: Arc<dyn InvoiceLookup>,
    audit: Arc<dyn AuditSink>,
    role_id: u64,
}

impl RedemptionService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        invoices: Arc<dyn InvoiceLookup>,
        audit: Arc<dyn AuditSink>,
        role_id: u64,
    ) -> Self {
        Self {
            ledger,
            invoices,
            audit,
            role_id,
        }
    }

    /// Run one attempt to completion and answer the requester, whatever the outcome
    pub async fn handle(&self, ctx: &dyn GrantContext, raw_invoice_id: &str) -> Result<Redemption> {
        let requester = ctx.requester().clone();
        info!(
            "User {} ({}) submitted invoice id {:?}",
            requester.name, requester.id, raw_invoice_id
        );

        let result = self.redeem(ctx, raw_invoice_id).await;
        let message = match &result {
            Ok(redemption) => {
                info!(
                    "✓ Invoice {} redeemed by {} ({})",
                    redemption.invoice_id, requester.name, requester.id
                );
                MSG_REDEEMED
            }
            Err(e) if e.is_rejection() => {
                info!("Rejected invoice {:?} from {}: {}", raw_invoice_id.trim(), requester.id, e);
                e.user_message()
            }
            Err(e) => {
                error!("✗ Error verifying invoice {:?} for {}: {:?}", raw_invoice_id.trim(), requester.id, e);
                e.user_message()
            }
        };

        if let Err(e) = ctx.reply(message, true).await {
            warn!("Could not reply to {}: {}", requester.id, e);
        }

        if let Ok(redemption) = &result {
            if redemption.recorded {
                let entry = AuditEntry {
                    requester,
                    invoice_id: redemption.invoice_id.clone(),
                    status: redemption.status.clone(),
                };
                if let Err(e) = self.audit.record(&entry).await {
                    warn!("Failed to deliver audit entry ({}): {}", entry, e);
                }
            }
        }

        result
    }

    /// Like [`handle`](Self::handle), but on its own task: a panic inside one
    /// attempt is logged and answered with the generic message instead of
    /// taking anything else down.
    pub async fn handle_isolated(
        self: Arc<Self>,
        ctx: Arc<dyn GrantContext>,
        raw_invoice_id: String,
    ) -> Result<Redemption> {
        let task_ctx = ctx.clone();
        let task = tokio::spawn(async move { self.handle(task_ctx.as_ref(), &raw_invoice_id).await });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!("Redemption task for {} aborted: {}", ctx.requester().id, e);
                if let Err(e) = ctx.reply(MSG_TRY_LATER, true).await {
                    warn!("Could not reply to {}: {}", ctx.requester().id, e);
                }
                Err(RedeemError::Internal(e.to_string()))
            }
        }
    }

    async fn redeem(&self, ctx: &dyn GrantContext, raw_invoice_id: &str) -> Result<Redemption> {
        // 1. Everything below works on the trimmed id
        let invoice_id = raw_invoice_id.trim();
        if invoice_id.is_empty() {
            return Err(RedeemError::NotFound);
        }

        // 2. Short-circuit before the network call
        self.check_not_used(invoice_id).await?;

        // 3. One fetch, no retries
        let invoices = self.invoices.fetch_invoices().await?;

        // 4. Exact, case-sensitive match
        let invoice = find_by_unique_id(&invoices, invoice_id).ok_or(RedeemError::NotFound)?;

        // 5. Anything but "completed" is rejected, not queued
        if !invoice.is_completed() {
            return Err(RedeemError::NotCompleted {
                status: invoice.status.clone(),
            });
        }

        // 6.
        if !ctx.role_exists(self.role_id).await? {
            return Err(RedeemError::RoleMissing);
        }

        // 7. Ledger is only written once the role is in place
        self.grant_role(ctx).await?;

        // 8.
        let recorded = self.mark_used(invoice_id).await?;

        Ok(Redemption {
            invoice_id: invoice_id.to_string(),
            status: invoice.status.clone(),
            recorded,
        })
    }

    async fn check_not_used(&self, invoice_id: &str) -> Result<()> {
        if self.ledger.is_used(invoice_id).await? {
            return Err(RedeemError::AlreadyRedeemed);
        }
        Ok(())
    }

    async fn grant_role(&self, ctx: &dyn GrantContext) -> Result<()> {
        if ctx.has_role(self.role_id).await? {
            info!(
                "{} already holds role {}, skipping grant",
                ctx.requester().id,
                self.role_id
            );
            return Ok(());
        }
        ctx.add_role(self.role_id).await?;
        Ok(())
    }

    /// Returns false if another attempt recorded the id between our check and now
    async fn mark_used(&self, invoice_id: &str) -> Result<bool> {
        match self.ledger.mark_used(invoice_id).await {
            Ok(()) => Ok(true),
            Err(LedgerError::Conflict(_)) => {
                warn!("Invoice {} was recorded by a concurrent attempt", invoice_id);
                Ok(false)
            }
            Err(e) => {
                error!(
                    "Role granted but invoice {} could not be recorded: {}",
                    invoice_id, e
                );
                Err(e.into())
            }
        }
    }
}

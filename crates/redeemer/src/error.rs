use storefront::StorefrontError;
use thiserror::Error;

use crate::ledger::LedgerError;

pub type Result<T> = std::result::Result<T, RedeemError>;

pub const MSG_REDEEMED: &str = "✅ Invoice verified. You have been given the Client role!";
pub const MSG_ALREADY_REDEEMED: &str = "⚠️ This invoice has already been redeemed.";
pub const MSG_NOT_FOUND: &str = "❌ Invoice not found.";
pub const MSG_NOT_COMPLETED: &str = "⏳ This invoice is not completed yet.";
pub const MSG_ROLE_MISSING: &str = "⚠️ \"Client\" role not found.";
pub const MSG_TRY_LATER: &str =
    "❌ An error occurred while checking your invoice. Please try again later.";

/// Failure reported by the chat platform (role lookup, grant, reply, channel send)
#[derive(Error, Debug, Clone)]
#[error("Platform error: {0}")]
pub struct PlatformError(pub String);

#[derive(Error, Debug)]
pub enum RedeemError {
    #[error("Invoice already redeemed")]
    AlreadyRedeemed,

    #[error("Invoice not found")]
    NotFound,

    #[error("Invoice not completed (status: {status})")]
    NotCompleted { status: String },

    #[error("Configured role not found")]
    RoleMissing,

    #[error("Invoice lookup failed: {0}")]
    Lookup(#[from] StorefrontError),

    #[error("Role grant failed: {0}")]
    Grant(String),

    #[error("Ledger unavailable: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RedeemError {
    /// Text shown to the requester for this outcome
    pub fn user_message(&self) -> &'static str {
        match self {
            RedeemError::AlreadyRedeemed => MSG_ALREADY_REDEEMED,
            RedeemError::NotFound => MSG_NOT_FOUND,
            RedeemError::NotCompleted { .. } => MSG_NOT_COMPLETED,
            RedeemError::RoleMissing => MSG_ROLE_MISSING,
            RedeemError::Lookup(_)
            | RedeemError::Grant(_)
            | RedeemError::Storage(_)
            | RedeemError::Internal(_) => MSG_TRY_LATER,
        }
    }

    /// Rejections are the requester's problem; failures are ours and get logged loudly
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            RedeemError::AlreadyRedeemed
                | RedeemError::NotFound
                | RedeemError::NotCompleted { .. }
        )
    }
}

impl From<LedgerError> for RedeemError {
    fn from(e: LedgerError) -> Self {
        RedeemError::Storage(e.to_string())
    }
}

impl From<PlatformError> for RedeemError {
    fn from(e: PlatformError) -> Self {
        RedeemError::Grant(e.0)
    }
}

impl From<serenity::Error> for PlatformError {
    fn from(e: serenity::Error) -> Self {
        PlatformError(e.to_string())
    }
}

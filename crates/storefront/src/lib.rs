//! Client for the SellAuth storefront API, limited to what invoice redemption needs.
//!
//! ```rust,no_run
//! use storefront::{Config, StorefrontClient};
//!
//! #[tokio::main]
//! async fn main() -> storefront::Result<()> {
//!     let client = StorefrontClient::new(Config::new("12345", "api-key"))?;
//!
//!     if let Some(invoice) = client.find_invoice("INV-1").await? {
//!         println!("{} is {}", invoice.unique_id, invoice.status);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http_client;
pub mod invoice;

pub use config::{Config, DEFAULT_API_BASE, DEFAULT_TIMEOUT_SECS};
pub use error::{Result, StorefrontError};
pub use http_client::StorefrontClient;
pub use invoice::{find_by_unique_id, Invoice, InvoicePage, STATUS_COMPLETED};

//! Error types for the exchange.
//!
//! Only two failure classes abort anything: a malformed inbound request
//! ([`ExchangeError::InvalidRequest`]) aborts the auction before fan-out, and
//! [`ExchangeError::Configuration`] aborts settings loading. Every per-source
//! and per-bid failure travels inside the auction response as an
//! [`AdapterError`](crate::adapter::AdapterError) or
//! [`Warning`](crate::adapter::Warning) instead of surfacing here.

use derive_more::{Display, Error};

/// Fatal error for exchange operations, carried in an [`error_stack::Report`].
#[derive(Debug, Display, Error)]
pub enum ExchangeError {
    /// The inbound auction request failed validation before fan-out.
    #[display("Invalid auction request: {message}")]
    InvalidRequest { message: String },

    /// Settings could not be loaded or failed validation.
    #[display("Configuration error: {message}")]
    Configuration { message: String },
}

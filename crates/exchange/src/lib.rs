//! Header-bidding auction orchestration.
//!
//! This crate is the exchange core of a real-time bidding server: it takes a
//! validated, canonical auction request plus the registered demand sources,
//! fans the request out to every participating source concurrently under a
//! shared deadline, tolerates any subset of sources being slow, broken, or
//! malformed, and assembles a single response carrying the best eligible bid
//! per ad slot plus full per-source diagnostics.
//!
//! The host server owns everything around this core (inbound HTTP, request
//! validation and enrichment, the outbound HTTP client, creative caching)
//! and injects its ends of those concerns through the collaborator traits:
//! [`transport::Transport`], [`consent::ConsentGate`], and
//! [`currency::RateSource`]. Demand sources plug in through the two-operation
//! [`adapter::BidAdapter`] contract.
//!
//! # Modules
//!
//! - [`adapter`]: The contract every demand source implements
//! - [`adapters`]: Built-in adapters (generic OpenRTB 2.x)
//! - [`auction`]: The orchestrator pipeline and its stages
//! - [`catalog`]: Static registry of demand sources
//! - [`consent`]: Privacy participation gate
//! - [`currency`]: Conversion-rate lookup and price conversion
//! - [`error`]: Error types
//! - [`logging`]: Process-wide log initialization
//! - [`openrtb`]: Minimal OpenRTB 2.x wire subset
//! - [`settings`]: Configuration loading and validation
//! - [`transport`]: Outbound HTTP collaborator
//! - [`test_support`]: Shared test fixtures

pub mod adapter;
pub mod adapters;
pub mod auction;
pub mod catalog;
pub mod consent;
pub mod currency;
pub mod error;
pub mod logging;
pub mod openrtb;
pub mod settings;
pub mod transport;

pub use auction::{AuctionConfig, AuctionRequest, AuctionResponse, Exchange};
pub use error::ExchangeError;
pub use settings::Settings;

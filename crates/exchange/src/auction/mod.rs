//! Auction orchestration: concurrent fan-out to demand sources under a
//! shared deadline, aggregation of whatever comes back, and deterministic
//! per-slot winner selection.
//!
//! The pipeline runs in a fixed order (participants, timeouts, dispatch,
//! aggregation, resolution, assembly), with each stage a separate module so
//! its rules stay independently testable. [`orchestrator::Exchange`] wires
//! the stages together and is the only type callers need.

pub mod aggregate;
pub mod config;
pub mod dispatch;
pub mod orchestrator;
pub mod participants;
pub mod resolve;
pub mod response;
pub mod timeout;
pub mod types;

pub use config::{AuctionConfig, DealPreference};
pub use orchestrator::Exchange;
pub use types::{
    AdFormat, AuctionRequest, AuctionResponse, ImpressionSlot, MediaType, NormalizedBid, RawBid,
    SourceDiagnostics, SourceOutcome,
};

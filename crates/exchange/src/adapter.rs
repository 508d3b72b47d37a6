//! The two-operation contract every demand source implements.
//!
//! Adapters are pure transforms with no shared state: `build_requests` turns
//! the (already sanitized) auction request into zero or more outbound calls,
//! and `parse_response` turns one raw HTTP response back into canonical bids.
//! Neither operation performs I/O; the dispatcher owns the wire.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auction::types::{AuctionRequest, MediaType, RawBid};
use crate::transport::{HttpResponse, OutboundCall};

/// Classification of a per-source failure. Every kind is non-fatal to the
/// auction; the affected source simply contributes no bids.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdapterErrorKind {
    /// The adapter could not construct an outbound payload
    Build,
    /// The source exceeded its deadline
    Timeout,
    /// Network or HTTP-layer failure
    Transport,
    /// The source answered with a body the adapter could not interpret
    Parse,
}

/// A per-source error recorded in the auction diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub message: String,
}

impl AdapterError {
    #[must_use]
    pub fn build(message: impl Into<String>) -> Self {
        Self {
            kind: AdapterErrorKind::Build,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: AdapterErrorKind::Timeout,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: AdapterErrorKind::Transport,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: AdapterErrorKind::Parse,
            message: message.into(),
        }
    }
}

/// Classification of a non-fatal, per-bid or per-call issue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// No conversion rate for the bid's currency; the bid was dropped
    CurrencyUnavailable,
    /// The bid failed a validity rule; the bid was dropped
    BidInvalid,
    /// An adapter-reported issue that did not fail the source
    Adapter,
}

/// A recorded, non-fatal issue attached to a source's diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    #[must_use]
    pub fn currency_unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::CurrencyUnavailable,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bid_invalid(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::BidInvalid,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn adapter(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Adapter,
            message: message.into(),
        }
    }
}

/// Output of [`BidAdapter::build_requests`].
///
/// `calls` and `error` may both be present: a partial build dispatches the
/// calls it managed to produce and records the error as a warning on the
/// participant. A build with no calls and an error fails the source outright.
#[derive(Debug, Default)]
pub struct BuildResult {
    pub calls: Vec<OutboundCall>,
    pub error: Option<AdapterError>,
}

impl BuildResult {
    #[must_use]
    pub fn calls(calls: Vec<OutboundCall>) -> Self {
        Self { calls, error: None }
    }

    #[must_use]
    pub fn error(error: AdapterError) -> Self {
        Self {
            calls: Vec::new(),
            error: Some(error),
        }
    }
}

/// Output of [`BidAdapter::parse_response`] for one HTTP response.
#[derive(Debug, Default)]
pub struct ParseResult {
    pub bids: Vec<RawBid>,
    pub warnings: Vec<Warning>,
    /// Set when the response as a whole was unusable; any bids present are
    /// still kept (a source may return usable bids alongside a complaint)
    pub error: Option<AdapterError>,
}

impl ParseResult {
    #[must_use]
    pub fn bids(bids: Vec<RawBid>) -> Self {
        Self {
            bids,
            warnings: Vec::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn error(error: AdapterError) -> Self {
        Self {
            bids: Vec::new(),
            warnings: Vec::new(),
            error: Some(error),
        }
    }
}

/// Trait implemented once per demand source.
pub trait BidAdapter: Send + Sync {
    /// Identifier for this source (e.g., "openx", "rubicon").
    fn name(&self) -> &str;

    /// Transform the sanitized auction request into outbound calls.
    ///
    /// `deadline` is the time budget the source will have to answer; adapters
    /// forward it on the wire (e.g., OpenRTB `tmax`) so well-behaved sources
    /// can pace themselves.
    fn build_requests(&self, request: &AuctionRequest, deadline: Duration) -> BuildResult;

    /// Transform one HTTP response into canonical bids.
    ///
    /// Malformed payloads yield a [`ParseResult`] carrying an error; adapters
    /// must not panic on hostile input.
    fn parse_response(&self, call: &OutboundCall, response: &HttpResponse) -> ParseResult;

    /// Check if this source supports a specific media type.
    fn supports_media_type(&self, media_type: MediaType) -> bool {
        matches!(media_type, MediaType::Banner)
    }
}

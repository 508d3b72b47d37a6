//! Core types for auction requests, bids, and per-source outcomes.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::adapter::{AdapterError, Warning};

/// The canonical auction request.
///
/// Immutable once fan-out begins: every per-source payload is derived from
/// a sanitized copy before dispatch, and the orchestrator only ever reads
/// the original afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionRequest {
    /// Unique auction ID
    pub id: String,
    /// Ad slots/impressions being auctioned, in publisher order
    pub slots: Vec<ImpressionSlot>,
    /// Overall time budget override in milliseconds; falls back to settings
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Test-mode flag; enables per-source call debug in the response
    #[serde(default)]
    pub test: bool,
    /// Accepted currencies, most preferred first; first entry is the auction
    /// currency bids are converted into
    #[serde(default)]
    pub currencies: Vec<String>,
    /// When present, only these sources may participate
    #[serde(default)]
    pub allowed_sources: Option<BTreeSet<String>>,
    /// Sources excluded from this auction regardless of slot configuration
    #[serde(default)]
    pub blocked_sources: BTreeSet<String>,
    /// Publisher information
    pub publisher: PublisherInfo,
    /// User information, if the publisher supplied any
    #[serde(default)]
    pub user: Option<UserInfo>,
    /// Device information from the inbound request
    #[serde(default)]
    pub device: Option<DeviceInfo>,
}

impl AuctionRequest {
    /// Look up a slot by id.
    #[must_use]
    pub fn slot(&self, slot_id: &str) -> Option<&ImpressionSlot> {
        self.slots.iter().find(|slot| slot.id == slot_id)
    }

    /// Names of every demand source referenced by at least one slot, in
    /// first-appearance order across the slot list.
    #[must_use]
    pub fn source_names(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut names = Vec::new();
        for slot in &self.slots {
            for name in slot.bidders.keys() {
                if seen.insert(name.clone()) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Whether the allow/block lists admit the named source.
    #[must_use]
    pub fn admits_source(&self, name: &str) -> bool {
        if self.blocked_sources.contains(name) {
            return false;
        }
        match &self.allowed_sources {
            Some(allowed) => allowed.contains(name),
            None => true,
        }
    }
}

/// One ad placement opportunity within the auction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpressionSlot {
    /// Slot identifier (e.g., "header-banner")
    pub id: String,
    /// Media types and formats supported
    pub formats: Vec<AdFormat>,
    /// Minimum acceptable price, if any
    #[serde(default)]
    pub floor_price: Option<f64>,
    /// Currency the floor is expressed in; defaults to the auction currency
    #[serde(default)]
    pub floor_currency: Option<String>,
    /// Demand sources asked to bid on this slot, with their source-specific
    /// parameters (opaque to the exchange, handed to the adapter verbatim)
    #[serde(default)]
    pub bidders: HashMap<String, serde_json::Value>,
}

/// Ad format specification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdFormat {
    pub media_type: MediaType,
    pub width: u32,
    pub height: u32,
}

/// Media type enumeration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Banner,
    Video,
    Native,
}

/// Publisher information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherInfo {
    pub domain: String,
    #[serde(default)]
    pub page_url: Option<String>,
}

/// User information forwarded to demand sources unless the privacy gate
/// strips it first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub id: Option<String>,
    /// Consent string as received; interpreted by the privacy gate, opaque here
    #[serde(default)]
    pub consent: Option<String>,
}

/// Device information from the inbound request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// A demand source's bid for one impression slot, in source-native currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBid {
    /// Slot this bid is for
    pub slot_id: String,
    /// Bid price in CPM, source-native currency
    pub price: f64,
    /// Currency code; `None` means the source's default (USD)
    #[serde(default)]
    pub currency: Option<String>,
    /// Creative markup (HTML/VAST) or a markup reference the caller resolves
    #[serde(default)]
    pub creative: Option<String>,
    /// Pre-negotiated deal this bid claims, if any
    #[serde(default)]
    pub deal_id: Option<String>,
    /// Advertiser domains
    #[serde(default)]
    pub adomain: Vec<String>,
    /// IAB content categories
    #[serde(default)]
    pub categories: Vec<String>,
    /// Video duration in seconds
    #[serde(default)]
    pub duration_sec: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    pub media_type: MediaType,
}

/// A bid after currency conversion and validity filtering.
///
/// Invariant: `slot_id` refers to a slot in the originating request and
/// `currency` equals the auction currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedBid {
    /// Source the bid came from, under the name the request used
    pub source: String,
    /// Catalog registration index of the source; ties break on this
    pub source_index: usize,
    /// Price in the auction currency, after conversion and adjustment
    pub price: f64,
    /// Always the auction currency
    pub currency: String,
    /// The bid as the adapter produced it
    pub bid: RawBid,
}

impl NormalizedBid {
    /// Whether this bid claims a pre-negotiated deal.
    #[must_use]
    pub fn is_deal(&self) -> bool {
        self.bid.deal_id.is_some()
    }
}

/// Summary of one outbound call, kept only when the request ran in test mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallDebug {
    pub url: String,
    #[serde(default)]
    pub status: Option<u16>,
    pub request_bytes: usize,
    pub response_bytes: usize,
}

/// Result of invoking one participant; produced exactly once per source per
/// auction.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    /// Source name as the request referenced it (alias-aware)
    pub source: String,
    /// Catalog registration index, carried through for winner tie-breaks
    pub source_index: usize,
    /// Time from dispatch to outcome, in milliseconds
    pub elapsed_ms: u64,
    /// Bids the source returned; empty on error
    pub bids: Vec<RawBid>,
    /// Fatal-for-this-source error, if the source contributed nothing
    pub error: Option<AdapterError>,
    /// Non-fatal issues encountered along the way
    pub warnings: Vec<Warning>,
    /// Outbound call summaries; populated only in test mode
    pub calls: Vec<CallDebug>,
}

impl SourceOutcome {
    /// Outcome for a source that answered with bids (possibly none).
    #[must_use]
    pub fn success(source: impl Into<String>, source_index: usize, bids: Vec<RawBid>, elapsed_ms: u64) -> Self {
        Self {
            source: source.into(),
            source_index,
            elapsed_ms,
            bids,
            error: None,
            warnings: Vec::new(),
            calls: Vec::new(),
        }
    }

    /// Outcome for a source that contributed nothing.
    #[must_use]
    pub fn failed(source: impl Into<String>, source_index: usize, error: AdapterError, elapsed_ms: u64) -> Self {
        Self {
            source: source.into(),
            source_index,
            elapsed_ms,
            bids: Vec::new(),
            error: Some(error),
            warnings: Vec::new(),
            calls: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<Warning>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

/// Per-source diagnostic record attached to the auction response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDiagnostics {
    /// Time from dispatch to outcome, in milliseconds
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AdapterError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
    /// Outbound call summaries; present only for test-mode auctions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<CallDebug>,
}

/// Final auction output: at most one winning bid per contested slot, plus
/// per-source diagnostics. Never retained by the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionResponse {
    /// Auction ID, echoed from the request
    pub id: String,
    /// Currency every winning bid is expressed in
    pub currency: String,
    /// Winning bid per slot; slots with no eligible candidate are absent
    pub winners: HashMap<String, NormalizedBid>,
    /// Diagnostics keyed by source name
    pub diagnostics: HashMap<String, SourceDiagnostics>,
    /// Total orchestration time in milliseconds
    pub total_time_ms: u64,
}

impl AuctionResponse {
    /// Get the winning bid for a specific slot.
    #[must_use]
    pub fn winner(&self, slot_id: &str) -> Option<&NormalizedBid> {
        self.winners.get(slot_id)
    }
}

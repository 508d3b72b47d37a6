//! Auction orchestration configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// How deal-backed bids rank against open-market bids during winner
/// selection.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DealPreference {
    /// Deal-backed bids beat open-market bids regardless of price; price
    /// decides among deals.
    #[default]
    PreferDeals,
    /// Deals carry no preference; highest price wins outright.
    PriceOnly,
}

/// Auction orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuctionConfig {
    /// Enable the auction orchestrator
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Default overall time budget in milliseconds, used when the request
    /// carries no override
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,

    /// Upper bound any request override is clamped to
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,

    /// Post-processing reserve subtracted from the overall budget before
    /// sources are given their deadline (conversion, winner selection,
    /// response assembly)
    #[serde(default = "default_reserve_ms")]
    pub reserve_ms: u64,

    /// Minimum viable per-source deadline; below this the auction proceeds
    /// with zero participants
    #[serde(default = "default_min_source_timeout_ms")]
    #[validate(range(min = 1))]
    pub min_source_timeout_ms: u64,

    /// Bounded cleanup allowance past the overall deadline before pending
    /// sources are written off as timed out
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,

    /// Currency bids are converted into when the request states no preference
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// Winner-selection rule for deal-backed bids
    #[serde(default)]
    pub deal_preference: DealPreference,

    /// Optional per-source multiplicative price adjustment, applied after
    /// currency conversion and before floor checks
    #[serde(default)]
    pub adjustment_factors: HashMap<String, f64>,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            timeout_ms: default_timeout_ms(),
            max_timeout_ms: default_max_timeout_ms(),
            reserve_ms: default_reserve_ms(),
            min_source_timeout_ms: default_min_source_timeout_ms(),
            grace_ms: default_grace_ms(),
            default_currency: default_currency(),
            deal_preference: DealPreference::default(),
            adjustment_factors: HashMap::new(),
        }
    }
}

impl AuctionConfig {
    /// Adjustment factor for a source, if one is configured and sane.
    /// Non-positive factors are ignored rather than zeroing bids out.
    #[must_use]
    pub fn adjustment_factor(&self, source: &str) -> Option<f64> {
        self.adjustment_factors
            .get(source)
            .copied()
            .filter(|factor| *factor > 0.0)
    }
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_max_timeout_ms() -> u64 {
    5000
}

fn default_reserve_ms() -> u64 {
    150
}

fn default_min_source_timeout_ms() -> u64 {
    50
}

fn default_grace_ms() -> u64 {
    50
}

fn default_currency() -> String {
    "USD".to_string()
}

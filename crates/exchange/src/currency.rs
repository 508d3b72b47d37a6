//! Price currency conversion between bid and auction currencies.
//!
//! The exchange consumes rates through the [`RateSource`] trait; the default
//! implementation is [`RateTable`], an immutable snapshot of cross rates that
//! the host refreshes out-of-band and swaps in wholesale. Lookups try the
//! straight pair first, then the reverse pair, then an intermediate currency
//! shared by both sides.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Fallback currency assumed when a bid omits its currency code.
pub const DEFAULT_BID_CURRENCY: &str = "USD";

// Price granularity default precision of 2, plus 1 for better accuracy.
const PRICE_PRECISION: i32 = 3;

/// Conversion-rate lookup consumed by the aggregator.
///
/// Implementations must be safe for concurrent reads; the exchange never
/// writes through this trait.
pub trait RateSource: Send + Sync {
    /// Returns the multiplier converting one unit of `from` into `to`,
    /// or `None` when no usable rate exists for the pair.
    fn rate(&self, from: &str, to: &str) -> Option<f64>;
}

/// Immutable snapshot of conversion rates keyed `from -> to -> rate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateTable {
    #[serde(default)]
    conversions: HashMap<String, HashMap<String, f64>>,
    #[serde(skip)]
    last_updated: Option<DateTime<Utc>>,
}

impl RateTable {
    /// Create a snapshot from a prepared rate map, stamped with the current time.
    #[must_use]
    pub fn new(conversions: HashMap<String, HashMap<String, f64>>) -> Self {
        Self {
            conversions,
            last_updated: Some(Utc::now()),
        }
    }

    /// An empty table; every cross-currency lookup misses.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// When this snapshot was produced, if known.
    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    fn direct(&self, from: &str, to: &str) -> Option<f64> {
        self.conversions.get(from).and_then(|row| row.get(to)).copied()
    }

    /// If USD -> EUR is 1.2 and EUR -> USD is needed, returns 1/1.2.
    fn reverse(&self, from: &str, to: &str) -> Option<f64> {
        self.direct(to, from).map(|rate| 1.0 / rate)
    }

    /// If USD -> AUD is 1.2 and EUR -> AUD is 1.5, EUR -> USD resolves
    /// through the shared AUD leg as (1/1.5) * 1.2.
    fn intermediate(&self, from: &str, to: &str) -> Option<f64> {
        let from_row = self.conversions.get(from)?;
        let to_row = self.conversions.get(to)?;

        let mut shared: Vec<&String> = from_row
            .keys()
            .filter(|currency| to_row.contains_key(*currency))
            .collect();
        shared.sort();

        let pivot = shared.first()?;
        let from_leg = from_row.get(*pivot)?;
        let to_leg = to_row.get(*pivot)?;
        Some(from_leg / to_leg)
    }
}

impl RateSource for RateTable {
    fn rate(&self, from: &str, to: &str) -> Option<f64> {
        if from == to {
            return Some(1.0);
        }
        self.direct(from, to)
            .or_else(|| self.reverse(from, to))
            .or_else(|| self.intermediate(from, to))
    }
}

/// Convert `price` from one currency to another.
///
/// A bid without a currency code is treated as [`DEFAULT_BID_CURRENCY`].
/// Same-currency conversion is the identity; anything else multiplies by the
/// resolved rate and rounds half-even to three decimal places. Returns `None`
/// when the pair cannot be resolved.
pub fn convert_price(
    price: f64,
    from: Option<&str>,
    to: &str,
    rates: &dyn RateSource,
) -> Option<f64> {
    let from = from.unwrap_or(DEFAULT_BID_CURRENCY);
    if from == to {
        return Some(price);
    }
    rates.rate(from, to).map(|rate| round_price(price * rate))
}

/// Round a price to [`PRICE_PRECISION`] decimals, ties to the even neighbour.
#[must_use]
pub fn round_price(value: f64) -> f64 {
    let scale = 10f64.powi(PRICE_PRECISION);
    let scaled = value * scale;
    let floor = scaled.floor();
    let fraction = scaled - floor;

    let rounded = if (fraction - 0.5).abs() < 1e-9 {
        if (floor as i64) % 2 == 0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        scaled.round()
    };

    rounded / scale
}

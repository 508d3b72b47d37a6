//! Aggregation of per-source outcomes into normalized, slot-grouped bids.
//!
//! Runs strictly after the dispatcher join. Each raw bid passes through an
//! ordered pipeline of validity filters, then currency conversion and the
//! optional per-source price adjustment. A bid that fails any step is
//! dropped with a warning on its source's diagnostics; nothing here fails
//! the auction. Bids are never deduplicated across sources: every valid
//! candidate competes and the resolver picks per slot.

use std::collections::HashMap;

use crate::adapter::Warning;
use crate::auction::config::AuctionConfig;
use crate::auction::types::{
    AuctionRequest, NormalizedBid, RawBid, SourceDiagnostics, SourceOutcome,
};
use crate::currency::{convert_price, round_price, RateSource};

/// Everything the resolver needs, plus the diagnostics the assembler needs.
#[derive(Debug, Default)]
pub struct AggregatedAuction {
    /// Valid, converted bids grouped by slot id
    pub by_slot: HashMap<String, Vec<NormalizedBid>>,
    /// Slot floors expressed in the auction currency
    pub floors: HashMap<String, f64>,
    /// Per-source diagnostic records keyed by source name
    pub diagnostics: HashMap<String, SourceDiagnostics>,
}

/// Ordered validity pipeline; each rule is pure and independently testable.
/// Order matters: structural checks run before pricing checks.
static VALIDITY_PIPELINE: &[fn(&RawBid, &AuctionRequest) -> Result<(), Warning>] =
    &[slot_exists, required_fields, valid_price];

/// Merge all source outcomes into one [`AggregatedAuction`].
pub fn aggregate(
    request: &AuctionRequest,
    currency: &str,
    outcomes: Vec<SourceOutcome>,
    rates: &dyn RateSource,
    config: &AuctionConfig,
) -> AggregatedAuction {
    let mut aggregated = AggregatedAuction {
        floors: slot_floors(request, currency, rates),
        ..AggregatedAuction::default()
    };

    for outcome in outcomes {
        let SourceOutcome {
            source,
            source_index,
            elapsed_ms,
            bids,
            error,
            mut warnings,
            calls,
        } = outcome;

        let adjustment = config.adjustment_factor(&source);

        for bid in bids {
            match normalize_bid(bid, request, currency, rates, adjustment, source_index, &source) {
                Ok(normalized) => aggregated
                    .by_slot
                    .entry(normalized.bid.slot_id.clone())
                    .or_default()
                    .push(normalized),
                Err(warning) => {
                    log::debug!("Dropping bid from '{}': {}", source, warning.message);
                    warnings.push(warning);
                }
            }
        }

        aggregated.diagnostics.insert(
            source,
            SourceDiagnostics {
                response_time_ms: elapsed_ms,
                error,
                warnings,
                calls,
            },
        );
    }

    aggregated
}

/// Run one raw bid through the validity pipeline, then convert and adjust.
fn normalize_bid(
    bid: RawBid,
    request: &AuctionRequest,
    currency: &str,
    rates: &dyn RateSource,
    adjustment: Option<f64>,
    source_index: usize,
    source: &str,
) -> Result<NormalizedBid, Warning> {
    for rule in VALIDITY_PIPELINE {
        rule(&bid, request)?;
    }

    let converted = convert_price(bid.price, bid.currency.as_deref(), currency, rates)
        .ok_or_else(|| {
            Warning::currency_unavailable(format!(
                "no conversion from {} to {} for bid on slot '{}'",
                bid.currency.as_deref().unwrap_or("USD"),
                currency,
                bid.slot_id
            ))
        })?;

    let price = match adjustment {
        Some(factor) => round_price(converted * factor),
        None => converted,
    };

    Ok(NormalizedBid {
        source: source.to_string(),
        source_index,
        price,
        currency: currency.to_string(),
        bid,
    })
}

/// The referenced slot must exist in the auction request.
fn slot_exists(bid: &RawBid, request: &AuctionRequest) -> Result<(), Warning> {
    if request.slot(&bid.slot_id).is_some() {
        Ok(())
    } else {
        Err(Warning::bid_invalid(format!(
            "bid references unknown slot '{}'",
            bid.slot_id
        )))
    }
}

/// A bid without creative markup cannot serve.
fn required_fields(bid: &RawBid, _request: &AuctionRequest) -> Result<(), Warning> {
    match bid.creative.as_deref() {
        Some(markup) if !markup.is_empty() => Ok(()),
        _ => Err(Warning::bid_invalid(format!(
            "bid for slot '{}' has no creative markup",
            bid.slot_id
        ))),
    }
}

/// Prices must be finite and non-negative.
fn valid_price(bid: &RawBid, _request: &AuctionRequest) -> Result<(), Warning> {
    if bid.price.is_finite() && bid.price >= 0.0 {
        Ok(())
    } else {
        Err(Warning::bid_invalid(format!(
            "bid for slot '{}' has invalid price {}",
            bid.slot_id, bid.price
        )))
    }
}

/// Express each slot's floor in the auction currency. A floor whose currency
/// cannot be converted is kept at its stated numeric value; winner selection
/// still enforces it, just without conversion.
fn slot_floors(
    request: &AuctionRequest,
    currency: &str,
    rates: &dyn RateSource,
) -> HashMap<String, f64> {
    request
        .slots
        .iter()
        .filter_map(|slot| {
            let floor = slot.floor_price?;
            let floor_currency = slot.floor_currency.as_deref().unwrap_or(currency);
            let converted = match convert_price(floor, Some(floor_currency), currency, rates) {
                Some(value) => value,
                None => {
                    log::warn!(
                        "No conversion for slot '{}' floor ({} -> {}), keeping stated value",
                        slot.id,
                        floor_currency,
                        currency
                    );
                    floor
                }
            };
            Some((slot.id.clone(), converted))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterError, WarningKind};
    use crate::auction::types::MediaType;
    use crate::currency::RateTable;
    use crate::test_support::tests::{auction_request, rate_table, raw_bid};

    fn usd_outcome(source: &str, index: usize, bids: Vec<RawBid>) -> SourceOutcome {
        SourceOutcome::success(source, index, bids, 42)
    }

    #[test]
    fn valid_bids_group_by_slot() {
        let request = auction_request(&[("top", &["dsp-a", "dsp-b"]), ("side", &["dsp-a"])]);
        let outcomes = vec![
            usd_outcome("dsp-a", 0, vec![raw_bid("top", 2.0), raw_bid("side", 1.0)]),
            usd_outcome("dsp-b", 1, vec![raw_bid("top", 1.5)]),
        ];

        let aggregated = aggregate(
            &request,
            "USD",
            outcomes,
            &RateTable::empty(),
            &AuctionConfig::default(),
        );

        assert_eq!(aggregated.by_slot.get("top").map(Vec::len), Some(2));
        assert_eq!(aggregated.by_slot.get("side").map(Vec::len), Some(1));
        assert_eq!(aggregated.diagnostics.len(), 2);
    }

    #[test]
    fn unknown_slot_drops_the_bid_with_a_warning() {
        let request = auction_request(&[("top", &["dsp-a"])]);
        let outcomes = vec![usd_outcome("dsp-a", 0, vec![raw_bid("ghost-slot", 2.0)])];

        let aggregated = aggregate(
            &request,
            "USD",
            outcomes,
            &RateTable::empty(),
            &AuctionConfig::default(),
        );

        assert!(aggregated.by_slot.is_empty());
        let diag = aggregated.diagnostics.get("dsp-a").expect("diagnostics");
        assert_eq!(diag.warnings.len(), 1);
        assert_eq!(diag.warnings[0].kind, WarningKind::BidInvalid);
    }

    #[test]
    fn missing_creative_drops_the_bid() {
        let request = auction_request(&[("top", &["dsp-a"])]);
        let mut bid = raw_bid("top", 2.0);
        bid.creative = None;
        let outcomes = vec![usd_outcome("dsp-a", 0, vec![bid])];

        let aggregated = aggregate(
            &request,
            "USD",
            outcomes,
            &RateTable::empty(),
            &AuctionConfig::default(),
        );
        assert!(aggregated.by_slot.is_empty());
    }

    #[test]
    fn negative_and_non_finite_prices_drop_the_bid() {
        let request = auction_request(&[("top", &["dsp-a"])]);
        let negative = raw_bid("top", -0.5);
        let mut nan = raw_bid("top", 0.0);
        nan.price = f64::NAN;
        let outcomes = vec![usd_outcome("dsp-a", 0, vec![negative, nan])];

        let aggregated = aggregate(
            &request,
            "USD",
            outcomes,
            &RateTable::empty(),
            &AuctionConfig::default(),
        );
        assert!(aggregated.by_slot.is_empty());
        let diag = aggregated.diagnostics.get("dsp-a").expect("diagnostics");
        assert_eq!(diag.warnings.len(), 2);
    }

    #[test]
    fn foreign_currency_converts_into_the_auction_currency() {
        let request = auction_request(&[("top", &["dsp-eur"])]);
        let mut bid = raw_bid("top", 5.0);
        bid.currency = Some("EUR".to_string());
        let outcomes = vec![usd_outcome("dsp-eur", 0, vec![bid])];

        let aggregated = aggregate(
            &request,
            "USD",
            outcomes,
            &rate_table(&[("EUR", "USD", 1.1)]),
            &AuctionConfig::default(),
        );

        let bids = aggregated.by_slot.get("top").expect("slot aggregated");
        assert_eq!(bids[0].price, 5.5);
        assert_eq!(bids[0].currency, "USD");
        assert_eq!(bids[0].bid.price, 5.0, "original price preserved on the raw bid");
    }

    #[test]
    fn missing_rate_drops_the_bid_and_records_currency_warning() {
        let request = auction_request(&[("top", &["dsp-gbp"])]);
        let mut bid = raw_bid("top", 3.0);
        bid.currency = Some("GBP".to_string());
        let outcomes = vec![usd_outcome("dsp-gbp", 0, vec![bid])];

        let aggregated = aggregate(
            &request,
            "USD",
            outcomes,
            &RateTable::empty(),
            &AuctionConfig::default(),
        );

        assert!(aggregated.by_slot.is_empty());
        let diag = aggregated.diagnostics.get("dsp-gbp").expect("diagnostics");
        assert_eq!(diag.warnings[0].kind, WarningKind::CurrencyUnavailable);
    }

    #[test]
    fn adjustment_factor_scales_the_competing_price() {
        let request = auction_request(&[("top", &["dsp-a"])]);
        let mut config = AuctionConfig::default();
        config.adjustment_factors.insert("dsp-a".to_string(), 0.9);
        let outcomes = vec![usd_outcome("dsp-a", 0, vec![raw_bid("top", 2.0)])];

        let aggregated = aggregate(&request, "USD", outcomes, &RateTable::empty(), &config);
        let bids = aggregated.by_slot.get("top").expect("slot aggregated");
        assert_eq!(bids[0].price, 1.8);
    }

    #[test]
    fn floors_convert_into_the_auction_currency() {
        let mut request = auction_request(&[("top", &["dsp-a"])]);
        request.slots[0].floor_price = Some(5.0);
        request.slots[0].floor_currency = Some("EUR".to_string());

        let aggregated = aggregate(
            &request,
            "USD",
            Vec::new(),
            &rate_table(&[("EUR", "USD", 1.1)]),
            &AuctionConfig::default(),
        );
        assert_eq!(aggregated.floors.get("top"), Some(&5.5));
    }

    #[test]
    fn errored_outcomes_carry_through_to_diagnostics() {
        let request = auction_request(&[("top", &["dsp-dead"])]);
        let outcomes = vec![SourceOutcome::failed(
            "dsp-dead",
            0,
            AdapterError::timeout("no response within 850ms"),
            850,
        )];

        let aggregated = aggregate(
            &request,
            "USD",
            outcomes,
            &RateTable::empty(),
            &AuctionConfig::default(),
        );

        let diag = aggregated.diagnostics.get("dsp-dead").expect("diagnostics");
        assert_eq!(diag.response_time_ms, 850);
        assert!(diag.error.is_some());
    }

    #[test]
    fn validity_rules_are_individually_callable() {
        let request = auction_request(&[("top", &["dsp-a"])]);
        let good = raw_bid("top", 1.0);
        assert!(slot_exists(&good, &request).is_ok());
        assert!(required_fields(&good, &request).is_ok());
        assert!(valid_price(&good, &request).is_ok());

        let mut bad = raw_bid("nope", 1.0);
        assert!(slot_exists(&bad, &request).is_err());
        bad.slot_id = "top".to_string();
        bad.creative = Some(String::new());
        assert!(required_fields(&bad, &request).is_err());
    }

    #[test]
    fn media_type_is_preserved_through_normalization() {
        let request = auction_request(&[("top", &["dsp-a"])]);
        let mut bid = raw_bid("top", 2.0);
        bid.media_type = MediaType::Video;
        bid.duration_sec = Some(15);
        let outcomes = vec![usd_outcome("dsp-a", 0, vec![bid])];

        let aggregated = aggregate(
            &request,
            "USD",
            outcomes,
            &RateTable::empty(),
            &AuctionConfig::default(),
        );
        let bids = aggregated.by_slot.get("top").expect("slot aggregated");
        assert_eq!(bids[0].bid.media_type, MediaType::Video);
        assert_eq!(bids[0].bid.duration_sec, Some(15));
    }
}

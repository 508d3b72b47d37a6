//! Per-slot winner selection.
//!
//! Each slot resolves independently: no bids, candidates, then a winner or
//! no winner. Candidates are the normalized bids at or above the slot floor;
//! ranking is deal-backed first (unless configured off), then highest price,
//! then source registration order so exact ties resolve the same way on
//! every run. Pure function of its inputs; no clocks, no randomness.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::auction::config::DealPreference;
use crate::auction::types::{AuctionRequest, NormalizedBid};

/// Resolution of one slot: the ranked candidates and the chosen winner.
#[derive(Debug, Clone)]
pub struct SlotAuction {
    pub slot_id: String,
    /// Floor-eligible bids, best-ranked first
    pub candidates: Vec<NormalizedBid>,
    /// The best candidate, if the slot attracted any
    pub winner: Option<NormalizedBid>,
}

/// Resolve every slot of the request against the aggregated bids.
///
/// Slots appear in request order; a slot with no eligible candidates yields
/// a [`SlotAuction`] with no winner, which the assembler simply omits from
/// the winner map.
pub fn resolve_slots(
    request: &AuctionRequest,
    mut by_slot: HashMap<String, Vec<NormalizedBid>>,
    floors: &HashMap<String, f64>,
    preference: DealPreference,
) -> Vec<SlotAuction> {
    request
        .slots
        .iter()
        .map(|slot| {
            let bids = by_slot.remove(&slot.id).unwrap_or_default();
            let floor = floors.get(&slot.id).copied();
            resolve_slot(&slot.id, bids, floor, preference)
        })
        .collect()
}

fn resolve_slot(
    slot_id: &str,
    bids: Vec<NormalizedBid>,
    floor: Option<f64>,
    preference: DealPreference,
) -> SlotAuction {
    let mut candidates: Vec<NormalizedBid> = bids
        .into_iter()
        .filter(|bid| floor.is_none_or(|floor| bid.price >= floor))
        .collect();

    candidates.sort_by(|a, b| rank(a, b, preference));
    let winner = candidates.first().cloned();

    if let Some(winner) = &winner {
        log::debug!(
            "Slot '{}': winner '{}' at {} {} ({} candidates)",
            slot_id,
            winner.source,
            winner.price,
            winner.currency,
            candidates.len()
        );
    }

    SlotAuction {
        slot_id: slot_id.to_string(),
        candidates,
        winner,
    }
}

/// Ranking comparator: best candidate first.
fn rank(a: &NormalizedBid, b: &NormalizedBid, preference: DealPreference) -> Ordering {
    if preference == DealPreference::PreferDeals {
        match b.is_deal().cmp(&a.is_deal()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
    }
    match b.price.partial_cmp(&a.price).unwrap_or(Ordering::Equal) {
        Ordering::Equal => {}
        unequal => return unequal,
    }
    a.source_index.cmp(&b.source_index)
}

//! Final response assembly.
//!
//! Collects the per-slot winners and the per-source diagnostics into the
//! canonical [`AuctionResponse`], and projects it into a minimal OpenRTB 2.x
//! bid response for callers that speak the wire format. Assembly has no side
//! effects and always succeeds: an auction where every source failed still
//! produces a well-formed response with zero winners and full diagnostics.

use std::collections::HashMap;

use crate::auction::resolve::SlotAuction;
use crate::auction::types::{AuctionRequest, AuctionResponse, NormalizedBid, SourceDiagnostics};
use crate::openrtb::{Bid as OpenRtbBid, OpenRtbResponse, SeatBid};

/// Build the canonical auction response.
pub fn assemble(
    request: &AuctionRequest,
    currency: &str,
    slot_results: Vec<SlotAuction>,
    diagnostics: HashMap<String, SourceDiagnostics>,
    total_time_ms: u64,
) -> AuctionResponse {
    let winners: HashMap<String, NormalizedBid> = slot_results
        .into_iter()
        .filter_map(|slot| slot.winner.map(|winner| (slot.slot_id, winner)))
        .collect();

    log::info!(
        "Auction {}: {} winners across {} slots, {} sources answered, {}ms",
        request.id,
        winners.len(),
        request.slots.len(),
        diagnostics.len(),
        total_time_ms
    );

    AuctionResponse {
        id: request.id.clone(),
        currency: currency.to_string(),
        winners,
        diagnostics,
        total_time_ms,
    }
}

/// Project the canonical response into OpenRTB form: one seat per winning
/// source, one bid per won slot. Seats are ordered by name so the output is
/// stable across runs.
#[must_use]
pub fn to_openrtb_response(response: &AuctionResponse) -> OpenRtbResponse {
    let mut by_seat: HashMap<&str, Vec<OpenRtbBid>> = HashMap::new();

    for (slot_id, winner) in &response.winners {
        let bid = &winner.bid;
        by_seat.entry(winner.source.as_str()).or_default().push(OpenRtbBid {
            id: Some(format!("{}-{}", winner.source, slot_id)),
            impid: Some(slot_id.clone()),
            price: winner.price,
            adm: bid.creative.clone(),
            crid: None,
            dealid: bid.deal_id.clone(),
            adomain: bid.adomain.clone(),
            cat: bid.categories.clone(),
            dur: bid.duration_sec,
            w: bid.width,
            h: bid.height,
            nurl: None,
            burl: None,
            extra: HashMap::new(),
        });
    }

    let mut seatbid: Vec<SeatBid> = by_seat
        .into_iter()
        .map(|(seat, mut bids)| {
            bids.sort_by(|a, b| a.impid.cmp(&b.impid));
            SeatBid {
                seat: Some(seat.to_string()),
                bid: bids,
                extra: HashMap::new(),
            }
        })
        .collect();
    seatbid.sort_by(|a, b| a.seat.cmp(&b.seat));

    OpenRtbResponse {
        id: Some(response.id.clone()),
        cur: Some(response.currency.clone()),
        seatbid,
        extra: HashMap::new(),
    }
}

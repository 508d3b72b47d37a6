//! Participant resolution: which sources take part in an auction, and with
//! what payload.
//!
//! For each source referenced by the request, the resolver consults the
//! privacy gate, derives a sanitized per-source copy of the request (only the
//! slots that name the source, only that source's parameters), and asks the
//! adapter to build its outbound calls. A source that fails to build is
//! settled as an error outcome on the spot; it never reaches the dispatcher
//! and never disturbs the other sources.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::adapter::{AdapterError, BidAdapter, Warning};
use crate::auction::types::{AuctionRequest, ImpressionSlot, SourceOutcome};
use crate::catalog::BidderCatalog;
use crate::consent::{ConsentGate, Participation};
use crate::transport::OutboundCall;

/// One source's stake in one auction, ready for dispatch.
pub struct Participant {
    /// Source name as the request referenced it (alias-aware)
    pub source: String,
    /// Catalog registration index
    pub source_index: usize,
    pub adapter: Arc<dyn BidAdapter>,
    /// Outbound calls the adapter built; all belong to this participant
    pub calls: Vec<OutboundCall>,
    /// Deadline every call must respect
    pub deadline: Duration,
    /// Non-fatal issues from request building (e.g., a partial build)
    pub warnings: Vec<Warning>,
}

/// Output of participant resolution.
pub struct ResolvedParticipants {
    /// Sources with at least one outbound call to dispatch
    pub participants: Vec<Participant>,
    /// Sources settled without dispatch: build failures and empty builds
    pub settled: Vec<SourceOutcome>,
}

/// Resolve the participant set for one auction.
pub fn resolve_participants(
    request: &AuctionRequest,
    catalog: &BidderCatalog,
    gate: &dyn ConsentGate,
    deadline: Duration,
) -> ResolvedParticipants {
    let mut participants = Vec::new();
    let mut settled = Vec::new();

    for name in request.source_names() {
        if !request.admits_source(&name) {
            log::debug!("Source '{}' excluded by allow/block lists", name);
            continue;
        }

        let Some(resolved) = catalog.resolve(&name) else {
            log::warn!("Source '{}' not registered, skipping", name);
            continue;
        };

        let effective = match gate.may_participate(&name, request) {
            Participation::Denied => {
                log::debug!("Source '{}' denied by privacy gate", name);
                continue;
            }
            Participation::Allowed => None,
            Participation::Redacted(redacted) => Some(*redacted),
        };
        let effective = effective.as_ref().unwrap_or(request);

        let sanitized = sanitize_for_source(effective, &name, resolved.adapter.as_ref());
        if sanitized.slots.is_empty() {
            settled.push(SourceOutcome::failed(
                name.clone(),
                resolved.index,
                AdapterError::build("no impressions with supported media types"),
                0,
            ));
            continue;
        }

        let built = resolved.adapter.build_requests(&sanitized, deadline);
        match (built.calls.is_empty(), built.error) {
            (true, Some(error)) => {
                log::warn!("Source '{}' failed to build: {}", name, error.message);
                settled.push(SourceOutcome::failed(name.clone(), resolved.index, error, 0));
            }
            (true, None) => {
                // The adapter looked at the request and had nothing to ask.
                settled.push(SourceOutcome::success(name.clone(), resolved.index, Vec::new(), 0));
            }
            (false, error) => {
                let warnings = error
                    .map(|e| vec![Warning::adapter(e.message)])
                    .unwrap_or_default();
                participants.push(Participant {
                    source: name.clone(),
                    source_index: resolved.index,
                    adapter: resolved.adapter,
                    calls: built.calls,
                    deadline,
                    warnings,
                });
            }
        }
    }

    log::info!(
        "Resolved {} participants ({} settled without dispatch)",
        participants.len(),
        settled.len()
    );

    ResolvedParticipants {
        participants,
        settled,
    }
}

/// Derive the per-source copy of the request: only the slots that name the
/// source, each carrying only that source's parameters and only the formats
/// the adapter supports. Parameters for other sources never leak across.
fn sanitize_for_source(
    request: &AuctionRequest,
    source: &str,
    adapter: &dyn BidAdapter,
) -> AuctionRequest {
    let slots: Vec<ImpressionSlot> = request
        .slots
        .iter()
        .filter_map(|slot| {
            let params = slot.bidders.get(source)?;
            let formats: Vec<_> = slot
                .formats
                .iter()
                .filter(|format| adapter.supports_media_type(format.media_type))
                .cloned()
                .collect();
            if formats.is_empty() {
                return None;
            }
            Some(ImpressionSlot {
                id: slot.id.clone(),
                formats,
                floor_price: slot.floor_price,
                floor_currency: slot.floor_currency.clone(),
                bidders: HashMap::from([(source.to_string(), params.clone())]),
            })
        })
        .collect();

    AuctionRequest {
        slots,
        ..request.clone()
    }
}

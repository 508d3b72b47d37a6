//! The exchange: orchestrates one auction end to end.
//!
//! `run_auction` is the sole entry point. It validates the request, divides
//! the time budget, resolves participants, fans out to every demand source
//! concurrently, aggregates whatever came back, selects winners, and
//! assembles the response. Partial source failure is the normal case and
//! never fails the call; only a malformed request does.

use std::sync::Arc;
use std::time::Duration;

use error_stack::{ensure, Report};
use tokio::time::Instant;
use uuid::Uuid;

use crate::adapter::BidAdapter;
use crate::auction::config::AuctionConfig;
use crate::auction::types::{AuctionRequest, AuctionResponse};
use crate::auction::{aggregate, dispatch, participants, resolve, response, timeout};
use crate::catalog::BidderCatalog;
use crate::consent::{AllowAll, ConsentGate};
use crate::currency::{RateSource, RateTable};
use crate::error::ExchangeError;
use crate::transport::Transport;

/// Executes auctions across the registered demand sources.
///
/// All collaborators are injected and auction-scoped state is threaded
/// through explicitly; an `Exchange` holds no mutable state between
/// auctions and can be shared across requests.
pub struct Exchange {
    config: AuctionConfig,
    catalog: BidderCatalog,
    transport: Arc<dyn Transport>,
    gate: Arc<dyn ConsentGate>,
    rates: Arc<dyn RateSource>,
}

impl Exchange {
    /// Create an exchange with the given configuration and transport.
    /// The privacy gate defaults to allow-all and the rate source to an
    /// empty table; wire real collaborators in with the `with_*` methods.
    pub fn new(config: AuctionConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            catalog: BidderCatalog::new(),
            transport,
            gate: Arc::new(AllowAll),
            rates: Arc::new(RateTable::empty()),
        }
    }

    #[must_use]
    pub fn with_consent_gate(mut self, gate: Arc<dyn ConsentGate>) -> Self {
        self.gate = gate;
        self
    }

    #[must_use]
    pub fn with_rate_source(mut self, rates: Arc<dyn RateSource>) -> Self {
        self.rates = rates;
        self
    }

    /// Register a demand-source adapter. Registration order fixes the
    /// deterministic tie-break order for winner selection.
    pub fn register_adapter(&mut self, adapter: Arc<dyn BidAdapter>) {
        self.catalog.register(adapter);
    }

    /// Map an alternate request-facing name onto a registered source.
    pub fn register_alias(&mut self, alias: impl Into<String>, canonical: impl Into<String>) {
        self.catalog.register_alias(alias, canonical);
    }

    /// Number of registered demand sources.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.catalog.len()
    }

    /// Check if the orchestrator is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Run one auction to completion.
    ///
    /// Always returns within the overall deadline plus a bounded grace
    /// period. Sources that error, time out, or misbehave are reported in
    /// the response diagnostics, never as an `Err`.
    ///
    /// # Errors
    ///
    /// Fails only for a malformed request: no slots, an empty or duplicate
    /// slot id.
    pub async fn run_auction(
        &self,
        mut request: AuctionRequest,
    ) -> Result<AuctionResponse, Report<ExchangeError>> {
        let started = Instant::now();

        if request.id.is_empty() {
            request.id = Uuid::new_v4().to_string();
        }
        validate_request(&request)?;

        let currency = request
            .currencies
            .first()
            .cloned()
            .unwrap_or_else(|| self.config.default_currency.clone());

        let overall_ms = request
            .timeout_ms
            .unwrap_or(self.config.timeout_ms)
            .min(self.config.max_timeout_ms);
        let plan = timeout::allocate(
            Duration::from_millis(overall_ms),
            Duration::from_millis(self.config.reserve_ms),
            Duration::from_millis(self.config.min_source_timeout_ms),
        );

        let outcomes = match plan.per_source {
            None => {
                log::warn!(
                    "Auction {}: budget {}ms leaves no viable source deadline, answering empty",
                    request.id,
                    overall_ms
                );
                Vec::new()
            }
            Some(per_source) => {
                let resolved = participants::resolve_participants(
                    &request,
                    &self.catalog,
                    self.gate.as_ref(),
                    per_source,
                );
                let mut outcomes = dispatch::dispatch(
                    resolved.participants,
                    Arc::clone(&self.transport),
                    plan.overall,
                    Duration::from_millis(self.config.grace_ms),
                    request.test,
                )
                .await;
                outcomes.extend(resolved.settled);
                outcomes.sort_by_key(|outcome| outcome.source_index);
                outcomes
            }
        };

        let aggregated =
            aggregate::aggregate(&request, &currency, outcomes, self.rates.as_ref(), &self.config);
        let slot_results = resolve::resolve_slots(
            &request,
            aggregated.by_slot,
            &aggregated.floors,
            self.config.deal_preference,
        );

        Ok(response::assemble(
            &request,
            &currency,
            slot_results,
            aggregated.diagnostics,
            started.elapsed().as_millis() as u64,
        ))
    }
}

/// Reject requests the auction cannot meaningfully run on. Everything else
/// degrades gracefully downstream.
fn validate_request(request: &AuctionRequest) -> Result<(), Report<ExchangeError>> {
    ensure!(
        !request.slots.is_empty(),
        ExchangeError::InvalidRequest {
            message: "no impression slots".to_string(),
        }
    );

    let mut seen = std::collections::HashSet::new();
    for slot in &request.slots {
        ensure!(
            !slot.id.is_empty(),
            ExchangeError::InvalidRequest {
                message: "impression slot with empty id".to_string(),
            }
        );
        ensure!(
            seen.insert(slot.id.as_str()),
            ExchangeError::InvalidRequest {
                message: format!("duplicate impression slot id '{}'", slot.id),
            }
        );
    }

    Ok(())
}

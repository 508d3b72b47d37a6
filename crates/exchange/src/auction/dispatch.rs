//! Concurrent fan-out of participants to their demand sources.
//!
//! One tokio task per participant, all launched together and joined under
//! the absolute auction deadline. Failure isolation is total: a panic,
//! transport error, or malformed response in one participant's pipeline
//! becomes an error outcome for that participant alone. Per-participant
//! deadlines cancel the outstanding calls by dropping their futures; the
//! absolute deadline aborts whatever is still pending and writes those
//! sources off as timed out. No retries happen at this layer.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use rand::seq::SliceRandom;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};

use crate::adapter::{AdapterError, Warning};
use crate::auction::participants::Participant;
use crate::auction::types::{CallDebug, SourceOutcome};
use crate::transport::Transport;

/// Run every participant to an outcome.
///
/// Returns exactly one [`SourceOutcome`] per participant, in registration
/// order, after all participants completed or `overall + grace` elapsed,
/// whichever comes first. Launch order is shuffled per auction so no source
/// systematically enjoys first-dispatch advantage; aggregation is
/// order-independent, so results are unaffected.
pub async fn dispatch(
    participants: Vec<Participant>,
    transport: Arc<dyn Transport>,
    overall: Duration,
    grace: Duration,
    test_mode: bool,
) -> Vec<SourceOutcome> {
    if participants.is_empty() {
        return Vec::new();
    }

    let mut launch_order = participants;
    launch_order.shuffle(&mut rand::thread_rng());

    // Roster of everything we owe an outcome for, used to back-fill timeouts
    // for tasks the absolute deadline cuts off.
    let roster: Vec<(String, usize, u64)> = launch_order
        .iter()
        .map(|p| (p.source.clone(), p.source_index, p.deadline.as_millis() as u64))
        .collect();

    log::info!("Dispatching {} participants concurrently", launch_order.len());

    let mut join_set = JoinSet::new();
    for participant in launch_order {
        let transport = Arc::clone(&transport);
        join_set.spawn(run_participant(participant, transport, test_mode));
    }

    let hard_stop = Instant::now() + overall + grace;
    let mut outcomes: Vec<SourceOutcome> = Vec::with_capacity(roster.len());

    loop {
        match time::timeout_at(hard_stop, join_set.join_next()).await {
            Ok(Some(Ok(outcome))) => outcomes.push(outcome),
            Ok(Some(Err(join_error))) => {
                // Panics are caught inside the task; this is an aborted task.
                // The roster pass below records it as timed out.
                log::warn!("Participant task ended abnormally: {join_error}");
            }
            Ok(None) => break,
            Err(_) => {
                log::warn!(
                    "Absolute auction deadline reached with {} sources still pending",
                    join_set.len()
                );
                join_set.abort_all();
                break;
            }
        }
    }

    for (source, source_index, deadline_ms) in roster {
        if !outcomes.iter().any(|outcome| outcome.source == source) {
            outcomes.push(SourceOutcome::failed(
                source,
                source_index,
                AdapterError::timeout("auction deadline reached"),
                deadline_ms,
            ));
        }
    }

    outcomes.sort_by_key(|outcome| outcome.source_index);
    outcomes
}

/// Drive one participant to its outcome: execute its calls under its
/// deadline, parse each response, merge the per-call results.
async fn run_participant(
    participant: Participant,
    transport: Arc<dyn Transport>,
    test_mode: bool,
) -> SourceOutcome {
    let started = Instant::now();
    let source = participant.source.clone();
    let source_index = participant.source_index;
    let deadline = participant.deadline;
    let build_warnings = participant.warnings.clone();

    let pipeline = time::timeout(deadline, execute_calls(participant, transport, test_mode));

    let mut outcome = match AssertUnwindSafe(pipeline).catch_unwind().await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_elapsed)) => {
            log::debug!("Source '{}' timed out after {:?}", source, deadline);
            SourceOutcome::failed(
                source,
                source_index,
                AdapterError::timeout(format!("no response within {}ms", deadline.as_millis())),
                0,
            )
        }
        Err(_panic) => {
            log::warn!("Source '{}' panicked during dispatch, isolating", source);
            SourceOutcome::failed(
                source,
                source_index,
                AdapterError::parse("adapter panicked while handling the response"),
                0,
            )
        }
    };

    outcome.elapsed_ms = started.elapsed().as_millis() as u64;
    if !build_warnings.is_empty() {
        outcome.warnings.splice(0..0, build_warnings);
    }
    outcome
}

/// Execute all of one participant's calls concurrently and merge the results:
/// bids and warnings concatenate; if at least one call was usable the source
/// succeeds with failed calls demoted to warnings, and only when every call
/// failed does the first error become the source's outcome.
async fn execute_calls(
    participant: Participant,
    transport: Arc<dyn Transport>,
    test_mode: bool,
) -> SourceOutcome {
    let Participant {
        source,
        source_index,
        adapter,
        calls,
        deadline,
        ..
    } = participant;

    let results = futures::future::join_all(calls.iter().map(|call| {
        let transport = Arc::clone(&transport);
        async move { (call, transport.execute(call, deadline).await) }
    }))
    .await;

    let call_count = results.len();
    let mut bids = Vec::new();
    let mut warnings = Vec::new();
    let mut errors: Vec<AdapterError> = Vec::new();
    let mut call_debug = Vec::new();

    for (call, result) in results {
        match result {
            Ok(response) => {
                if test_mode {
                    call_debug.push(CallDebug {
                        url: call.url.clone(),
                        status: Some(response.status.as_u16()),
                        request_bytes: call.body.len(),
                        response_bytes: response.body.len(),
                    });
                }
                let parsed = adapter.parse_response(call, &response);
                bids.extend(parsed.bids);
                warnings.extend(parsed.warnings);
                if let Some(error) = parsed.error {
                    errors.push(error);
                }
            }
            Err(transport_error) => {
                if test_mode {
                    call_debug.push(CallDebug {
                        url: call.url.clone(),
                        status: None,
                        request_bytes: call.body.len(),
                        response_bytes: 0,
                    });
                }
                errors.push(if transport_error.timed_out {
                    AdapterError::timeout(transport_error.message)
                } else {
                    AdapterError::transport(transport_error.message)
                });
            }
        }
    }

    let mut outcome = if bids.is_empty() && !errors.is_empty() && errors.len() >= call_count {
        let first = errors.remove(0);
        SourceOutcome::failed(source, source_index, first, 0)
    } else {
        SourceOutcome::success(source, source_index, bids, 0)
    };

    outcome.warnings.extend(warnings);
    outcome
        .warnings
        .extend(errors.into_iter().map(|error| Warning::adapter(error.message)));
    outcome.calls = call_debug;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterErrorKind, BidAdapter};
    use crate::test_support::tests::{raw_bid, ScriptedTransport, StubAdapter, TransportScript};
    use crate::transport::OutboundCall;
    use bytes::Bytes;

    const DEADLINE: Duration = Duration::from_millis(850);
    const OVERALL: Duration = Duration::from_millis(1000);
    const GRACE: Duration = Duration::from_millis(50);

    fn participant(adapter: StubAdapter, index: usize, calls: usize) -> Participant {
        let name = adapter.name().to_string();
        Participant {
            source: name.clone(),
            source_index: index,
            adapter: Arc::new(adapter),
            calls: (0..calls)
                .map(|i| {
                    OutboundCall::post_json(
                        format!("https://{name}.example/rtb?call={i}"),
                        Bytes::from_static(b"{}"),
                    )
                })
                .collect(),
            deadline: DEADLINE,
            warnings: Vec::new(),
        }
    }

    async fn run(
        participants: Vec<Participant>,
        transport: ScriptedTransport,
    ) -> Vec<SourceOutcome> {
        dispatch(participants, Arc::new(transport), OVERALL, GRACE, false).await
    }

    #[tokio::test(start_paused = true)]
    async fn every_participant_produces_exactly_one_outcome() {
        let participants = vec![
            participant(StubAdapter::named("dsp-a").with_bid(raw_bid("top", 2.0)), 0, 1),
            participant(StubAdapter::named("dsp-b").with_bid(raw_bid("top", 1.5)), 1, 1),
        ];

        let outcomes = run(participants, ScriptedTransport::new()).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.error.is_none()));
        assert_eq!(outcomes[0].source, "dsp-a");
        assert_eq!(outcomes[1].source, "dsp-b", "outcomes sort by registration index");
    }

    #[tokio::test(start_paused = true)]
    async fn a_panicking_adapter_is_isolated_from_the_rest() {
        let participants = vec![
            participant(StubAdapter::named("dsp-panic").panicking_in_parse(), 0, 1),
            participant(StubAdapter::named("dsp-ok").with_bid(raw_bid("top", 2.0)), 1, 1),
        ];

        let outcomes = run(participants, ScriptedTransport::new()).await;
        assert_eq!(outcomes.len(), 2);

        let panicked = &outcomes[0];
        assert_eq!(
            panicked.error.as_ref().map(|e| e.kind),
            Some(AdapterErrorKind::Parse)
        );

        let ok = &outcomes[1];
        assert!(ok.error.is_none());
        assert_eq!(ok.bids.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn a_slow_source_times_out_without_delaying_the_fast_one() {
        let transport = ScriptedTransport::new()
            .with("dsp-slow", TransportScript::ok_after(2_000))
            .with("dsp-fast", TransportScript::ok_after(10));
        let participants = vec![
            participant(StubAdapter::named("dsp-slow").with_bid(raw_bid("top", 9.0)), 0, 1),
            participant(StubAdapter::named("dsp-fast").with_bid(raw_bid("top", 1.0)), 1, 1),
        ];

        let started = Instant::now();
        let outcomes = run(participants, transport).await;
        let took = started.elapsed();

        let slow = &outcomes[0];
        assert_eq!(
            slow.error.as_ref().map(|e| e.kind),
            Some(AdapterErrorKind::Timeout)
        );
        assert!(slow.bids.is_empty(), "timed-out source contributes no bids");

        let fast = &outcomes[1];
        assert!(fast.error.is_none());
        assert_eq!(fast.bids.len(), 1);

        assert!(
            took <= OVERALL + GRACE + Duration::from_millis(5),
            "dispatch must return within the absolute deadline, took {took:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_become_transport_outcomes() {
        let transport =
            ScriptedTransport::new().with("dsp-down", TransportScript::error("connection refused"));
        let participants = vec![participant(StubAdapter::named("dsp-down"), 0, 1)];

        let outcomes = run(participants, transport).await;
        assert_eq!(
            outcomes[0].error.as_ref().map(|e| e.kind),
            Some(AdapterErrorKind::Transport)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn one_good_call_keeps_a_multi_call_participant_alive() {
        // Two calls; the scripted transport fails anything with "call=1".
        let transport = ScriptedTransport::new()
            .with("call=1", TransportScript::error("connection reset"));
        let participants = vec![participant(
            StubAdapter::named("dsp-multi").with_bid(raw_bid("top", 2.0)),
            0,
            2,
        )];

        let outcomes = run(participants, transport).await;
        let outcome = &outcomes[0];
        assert!(outcome.error.is_none(), "partial success is success");
        assert_eq!(outcome.bids.len(), 1, "bids from the good call survive");
        assert_eq!(outcome.warnings.len(), 1, "failed call demoted to warning");
    }

    #[tokio::test(start_paused = true)]
    async fn all_calls_failing_fails_the_participant_with_the_first_error() {
        let transport = ScriptedTransport::new()
            .with("dsp-multi", TransportScript::error("connection refused"));
        let participants = vec![participant(StubAdapter::named("dsp-multi"), 0, 2)];

        let outcomes = run(participants, transport).await;
        let outcome = &outcomes[0];
        assert_eq!(
            outcome.error.as_ref().map(|e| e.kind),
            Some(AdapterErrorKind::Transport)
        );
        assert_eq!(outcome.warnings.len(), 1, "second failure kept as warning");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_participant_set_returns_no_outcomes() {
        let outcomes = run(Vec::new(), ScriptedTransport::new()).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_time_is_recorded_per_source() {
        let transport = ScriptedTransport::new()
            .with("dsp-a", TransportScript::ok_after(100))
            .with("dsp-b", TransportScript::ok_after(300));
        let participants = vec![
            participant(StubAdapter::named("dsp-a").with_bid(raw_bid("top", 1.0)), 0, 1),
            participant(StubAdapter::named("dsp-b").with_bid(raw_bid("top", 1.0)), 1, 1),
        ];

        let outcomes = run(participants, transport).await;
        assert!(outcomes[0].elapsed_ms >= 100);
        assert!(outcomes[1].elapsed_ms >= 300);
        assert!(outcomes[1].elapsed_ms < 850, "well under the deadline");
    }
}

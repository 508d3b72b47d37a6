//! Per-source deadline allocation.
//!
//! Sources never get the whole budget: a fixed reserve is held back for the
//! work that happens after the fan-out join (currency conversion, winner
//! selection, response assembly). Every participant shares the same computed
//! deadline; there is no per-source priority weighting.

use std::time::Duration;

/// The time budgets governing one auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPlan {
    /// Absolute budget for the whole auction
    pub overall: Duration,
    /// Deadline each source's calls must respect; `None` means the budget
    /// was too small to give any source a viable deadline, and the auction
    /// proceeds with zero participants
    pub per_source: Option<Duration>,
}

impl TimeoutPlan {
    /// Whether any source can be dispatched under this plan.
    #[must_use]
    pub fn viable(&self) -> bool {
        self.per_source.is_some()
    }
}

/// Compute the shared per-source deadline: the overall budget minus the
/// post-processing reserve, floored at `min_viable`.
#[must_use]
pub fn allocate(overall: Duration, reserve: Duration, min_viable: Duration) -> TimeoutPlan {
    let remaining = overall.saturating_sub(reserve);
    let per_source = if remaining < min_viable {
        None
    } else {
        Some(remaining)
    };
    TimeoutPlan {
        overall,
        per_source,
    }
}

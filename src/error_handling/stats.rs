//! Dispatch outcome statistics.
//!
//! Thread-safe counters for throttled-call outcomes, shared across tasks via
//! the owning coordinator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// Terminal classification of one logical throttled call, plus the
/// intermediate `RateLimited` bumps recorded for every 429 seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum DispatchOutcome {
    /// The call returned a successful response (possibly after retries).
    Success,
    /// A single 429 rejection was observed (counted per rejection).
    RateLimited,
    /// The retry ceiling was exceeded and the call failed terminally.
    RetryExhausted,
    /// A non-429 upstream failure was propagated.
    UpstreamError,
}

impl DispatchOutcome {
    /// Human-readable label used in log summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Success => "successful dispatches",
            DispatchOutcome::RateLimited => "429 rejections",
            DispatchOutcome::RetryExhausted => "retry budgets exhausted",
            DispatchOutcome::UpstreamError => "upstream errors",
        }
    }
}

impl std::fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thread-safe outcome counters.
///
/// Every variant is pre-registered at construction, so `increment` is a plain
/// atomic add with no insertion path.
pub struct ThrottleStats {
    counters: HashMap<DispatchOutcome, AtomicUsize>,
}

impl ThrottleStats {
    /// Creates a tracker with all counters at zero.
    pub fn new() -> Self {
        let mut counters = HashMap::new();
        for outcome in DispatchOutcome::iter() {
            counters.insert(outcome, AtomicUsize::new(0));
        }
        ThrottleStats { counters }
    }

    /// Increments the counter for `outcome`.
    pub fn increment(&self, outcome: DispatchOutcome) {
        if let Some(counter) = self.counters.get(&outcome) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment counter for {:?} which is not in the map. \
                 This indicates a bug in ThrottleStats initialization.",
                outcome
            );
        }
    }

    /// Current count for `outcome`.
    pub fn count(&self, outcome: DispatchOutcome) -> usize {
        self.counters
            .get(&outcome)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Logs all non-zero counters at info level.
    pub fn log_summary(&self) {
        for outcome in DispatchOutcome::iter() {
            let count = self.count(outcome);
            if count > 0 {
                log::info!("{}: {}", outcome, count);
            }
        }
    }
}

impl Default for ThrottleStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_outcomes_start_at_zero() {
        let stats = ThrottleStats::new();
        for outcome in DispatchOutcome::iter() {
            assert_eq!(stats.count(outcome), 0);
        }
    }

    #[test]
    fn test_increment_is_per_outcome() {
        let stats = ThrottleStats::new();
        stats.increment(DispatchOutcome::Success);
        stats.increment(DispatchOutcome::Success);
        stats.increment(DispatchOutcome::RateLimited);

        assert_eq!(stats.count(DispatchOutcome::Success), 2);
        assert_eq!(stats.count(DispatchOutcome::RateLimited), 1);
        assert_eq!(stats.count(DispatchOutcome::RetryExhausted), 0);
    }

    #[test]
    fn test_all_outcomes_have_labels() {
        for outcome in DispatchOutcome::iter() {
            assert!(!outcome.as_str().is_empty());
        }
    }
}

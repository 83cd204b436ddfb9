//! Run counters shared between the dispatch loop and the progress display.

use std::sync::atomic::{AtomicU64, Ordering};

use super::DispatchOutcome;

/// A counter that only goes up.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Live counters for a run.
///
/// Only the dispatch loop writes; the display reads on its own cadence.
/// `record` bumps the outcome counter before `processed`, so a reader may
/// briefly see `processed` lagging the per-outcome counters, never ahead.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    pub processed: Counter,
    pub sent: Counter,
    pub failed: Counter,
    pub skipped: Counter,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one finished recipient.
    pub fn record(&self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Sent => self.sent.increment(),
            DispatchOutcome::Failed { .. } => self.failed.increment(),
            DispatchOutcome::Skipped { .. } => self.skipped.increment(),
        }
        self.processed.increment();
    }

    pub fn snapshot(&self) -> RunCounters {
        RunCounters {
            processed: self.processed.get(),
            sent: self.sent.get(),
            failed: self.failed.get(),
            skipped: self.skipped.get(),
        }
    }
}

/// Point-in-time copy of the counters; also the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub processed: u64,
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl RunCounters {
    /// `processed == sent + failed + skipped`
    pub fn is_consistent(&self) -> bool {
        self.processed == self.sent + self.failed + self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::SkipReason;

    #[test]
    fn test_counter_increment() {
        let counter = Counter::default();
        counter.increment();
        counter.increment();
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_record_keeps_invariant() {
        let tracker = ProgressTracker::new();
        let outcomes = [
            DispatchOutcome::Sent,
            DispatchOutcome::Skipped {
                reason: SkipReason::AlreadyBounced,
            },
            DispatchOutcome::Failed {
                cause: "rejected".to_string(),
            },
            DispatchOutcome::Sent,
        ];

        for outcome in &outcomes {
            tracker.record(outcome);
            assert!(tracker.snapshot().is_consistent());
        }

        assert_eq!(
            tracker.snapshot(),
            RunCounters {
                processed: 4,
                sent: 2,
                failed: 1,
                skipped: 1,
            }
        );
    }

    #[test]
    fn test_fresh_tracker_is_zero() {
        let snapshot = ProgressTracker::new().snapshot();
        assert_eq!(snapshot, RunCounters::default());
        assert!(snapshot.is_consistent());
    }
}

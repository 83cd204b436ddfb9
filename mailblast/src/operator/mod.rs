//! Operator-facing capabilities: confirmation prompts, announcements and
//! the live progress display.
//!
//! The run pipeline depends only on the traits here, so tests can supply
//! deterministic fakes.

pub mod display;
pub mod prompt;

use async_trait::async_trait;

use crate::dispatch::RunCounters;

pub use display::{render_bars, ProgressDisplay, TerminalProgress};
pub use prompt::{styled, ConsoleOperator};

/// How a status message should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warning,
    Error,
}

/// The human running the blast.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Ask a yes/no question.
    async fn confirm(&self, question: &str) -> bool;

    /// Show a status message.
    fn announce(&self, tone: Tone, message: &str);

    /// Gate the run on the number of recipients about to be processed.
    async fn confirm_dispatch(&self, count: usize) -> bool {
        self.confirm(&format!("Proceed with sending to {} addresses?", count))
            .await
    }

    /// Ask whether the test message arrived and looked right.
    async fn confirm_test(&self, address: &str) -> bool {
        self.confirm(&format!(
            "Test email sent to {}. Did it arrive and look correct?",
            address
        ))
        .await
    }
}

/// Something that shows the counters to the operator.
pub trait ProgressObserver: Send + Sync {
    fn observe(&self, counters: RunCounters, total: u64);

    /// Called once after the last observation.
    fn finish(&self, counters: RunCounters, total: u64) {
        self.observe(counters, total);
    }
}

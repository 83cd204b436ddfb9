//! The dispatch loop - visits each reconciled recipient exactly once.
//!
//! ## Per-recipient lifecycle
//!
//! ```text
//! Pending ─┬─ bounced ─────────────────→ Skipped
//!          └─ send() ─┬─ Ok ───────────→ Sent
//!                     └─ Err / timeout → Failed → failure log
//! ```
//!
//! Up to `concurrency` sends may be in flight, but outcomes are recorded in
//! recipient order, so the failure log and the counters advance exactly as
//! they would in a sequential run.

pub mod failure_log;
pub mod outcome;
pub mod progress;

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::body::MessageBody;
use crate::config::RunConfiguration;
use crate::recipients::ReconciledRecipient;
use crate::transport::{SendError, Transport};

pub use failure_log::{FailureLogError, FailureRecord, FailureSink, FAILURE_LOG_HEADER};
pub use outcome::{DispatchOutcome, SkipReason};
pub use progress::{Counter, ProgressTracker, RunCounters};

/// Tuning for a dispatch run.
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    /// Maximum number of sends in flight
    pub concurrency: usize,
    /// A send still pending after this long counts as failed
    pub send_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            send_timeout: Duration::from_secs(10),
        }
    }
}

/// Result of a completed dispatch run.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub summary: RunCounters,
    /// One outcome per reconciled recipient, in recipient order
    pub outcomes: Vec<DispatchOutcome>,
}

/// Drives the transport over a reconciled list.
pub struct DispatchLoop {
    transport: Arc<dyn Transport>,
    progress: Arc<ProgressTracker>,
    failures: FailureSink,
    settings: DispatchSettings,
}

impl DispatchLoop {
    pub fn new(
        transport: Arc<dyn Transport>,
        progress: Arc<ProgressTracker>,
        failures: FailureSink,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            transport,
            progress,
            failures,
            settings,
        }
    }

    /// Dispatch every recipient and return the run summary.
    ///
    /// Per-recipient transport faults become `Failed` outcomes. The only
    /// error is a failure-log write, which stops the run because further
    /// failures could no longer be recorded.
    pub async fn run(
        self,
        recipients: &[ReconciledRecipient],
        config: &RunConfiguration,
        body: &MessageBody,
    ) -> Result<DispatchReport, FailureLogError> {
        let Self {
            transport,
            progress,
            mut failures,
            settings,
        } = self;

        info!(
            recipients = recipients.len(),
            concurrency = settings.concurrency,
            send_timeout_ms = settings.send_timeout.as_millis() as u64,
            failure_log = %failures.path().display(),
            "dispatch_started"
        );

        let timeout = settings.send_timeout;
        let mut attempts = stream::iter(recipients)
            .map(|entry| {
                let transport = transport.as_ref();
                async move { (entry, attempt(transport, entry, config, body, timeout).await) }
            })
            .buffered(settings.concurrency.max(1));

        let mut outcomes = Vec::with_capacity(recipients.len());

        while let Some((entry, outcome)) = attempts.next().await {
            if outcome.is_failed() {
                failures
                    .append(&FailureRecord::from(&entry.recipient))
                    .await?;
            }
            progress.record(&outcome);
            debug_assert!(progress.snapshot().is_consistent());

            outcomes.push(outcome);
        }

        let summary = progress.snapshot();

        info!(
            processed = summary.processed,
            sent = summary.sent,
            failed = summary.failed,
            skipped = summary.skipped,
            failures_logged = failures.records(),
            "dispatch_complete"
        );

        Ok(DispatchReport { summary, outcomes })
    }
}

/// Resolve one recipient to its outcome.
async fn attempt(
    transport: &dyn Transport,
    entry: &ReconciledRecipient,
    config: &RunConfiguration,
    body: &MessageBody,
    timeout: Duration,
) -> DispatchOutcome {
    let recipient = &entry.recipient;

    if entry.is_bounced {
        info!(to = %recipient.email, reason = "already_bounced", "recipient_skipped");
        return DispatchOutcome::Skipped {
            reason: SkipReason::AlreadyBounced,
        };
    }

    let result = match tokio::time::timeout(timeout, transport.send(config, recipient, body)).await
    {
        Ok(result) => result,
        Err(_) => Err(SendError::Timeout(timeout)),
    };

    match result {
        Ok(()) => {
            info!(to = %recipient.email, "recipient_sent");
            DispatchOutcome::Sent
        }
        Err(e) => {
            warn!(
                to = %recipient.email,
                unsubscribe_id = %recipient.unsubscribe_id,
                error = %e,
                "send_failed"
            );
            DispatchOutcome::Failed {
                cause: e.to_string(),
            }
        }
    }
}

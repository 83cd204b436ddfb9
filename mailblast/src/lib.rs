//! Mailblast - one-shot bulk email dispatch.
//!
//! Reconciles a recipient list against the bounced list, asks the operator
//! to confirm, then sends one message per recipient while counting outcomes
//! and logging failures for a later retry run.
//!
//! ## Architecture
//!
//! ```text
//! Config → Blast gates → reconcile() → DispatchLoop → Transport (SendGrid)
//!                                          │
//!                                          ├→ ProgressTracker → ProgressDisplay
//!                                          └→ FailureSink (failedEmails.csv)
//! ```

pub mod blast;
pub mod body;
pub mod config;
pub mod dispatch;
pub mod operator;
pub mod recipients;
pub mod transport;

// Re-export commonly used types
pub use blast::{AbortReason, Blast, BlastError, BlastReport};
pub use body::MessageBody;
pub use config::{Config, RunConfiguration};
pub use dispatch::{DispatchLoop, DispatchOutcome, FailureSink, ProgressTracker, RunCounters};
pub use operator::{ConsoleOperator, Operator, ProgressObserver, TerminalProgress, Tone};
pub use recipients::{reconcile, BouncedSet, Recipient, ReconciledRecipient};
pub use transport::{SendError, SendGridTransport, Transport};

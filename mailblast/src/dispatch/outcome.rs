//! Per-recipient dispatch results.

/// Why a recipient was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The address is on the bounced list
    AlreadyBounced,
}

/// What happened to one reconciled recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Failed { cause: String },
    Skipped { reason: SkipReason },
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DispatchOutcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, DispatchOutcome::Skipped { .. })
    }
}

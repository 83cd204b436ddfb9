//! Recipient lists and reconciliation against the bounced set.
//!
//! ## Flow
//!
//! ```text
//! validEmails.csv ──┐
//!                   ├─→ reconcile() → [(Recipient, is_bounced)] → dispatch
//! bouncedEmails.csv ┘
//! ```

pub mod loader;

use std::collections::HashSet;

pub use loader::{load_bounced, load_valid, parse_bounced, parse_valid, InputError};

/// A single entry of the valid-recipients list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// Recipient address, treated as an opaque identifier
    pub email: String,
    /// Identifier used to build the recipient's unsubscribe link
    pub unsubscribe_id: String,
}

impl Recipient {
    /// Create a new recipient.
    pub fn new(email: impl Into<String>, unsubscribe_id: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            unsubscribe_id: unsubscribe_id.into(),
        }
    }
}

/// Addresses previously reported as undeliverable.
#[derive(Debug, Clone, Default)]
pub struct BouncedSet {
    emails: HashSet<String>,
}

impl BouncedSet {
    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    /// Exact string match, no case folding.
    pub fn contains(&self, email: &str) -> bool {
        self.emails.contains(email)
    }
}

impl<S: Into<String>> FromIterator<S> for BouncedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            emails: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// A recipient annotated with its bounced status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledRecipient {
    pub recipient: Recipient,
    pub is_bounced: bool,
}

/// Annotate every recipient with whether its address is in the bounced set.
///
/// Input order is preserved and duplicates are kept, so an address listed
/// twice is dispatched twice.
pub fn reconcile(valid: &[Recipient], bounced: &BouncedSet) -> Vec<ReconciledRecipient> {
    valid
        .iter()
        .map(|recipient| ReconciledRecipient {
            is_bounced: bounced.contains(&recipient.email),
            recipient: recipient.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_marks_bounced() {
        let valid = vec![
            Recipient::new("a@x", "1"),
            Recipient::new("b@x", "2"),
            Recipient::new("c@x", "3"),
        ];
        let bounced: BouncedSet = ["b@x"].into_iter().collect();

        let reconciled = reconcile(&valid, &bounced);

        let flags: Vec<_> = reconciled.iter().map(|r| r.is_bounced).collect();
        assert_eq!(flags, vec![false, true, false]);
        let emails: Vec<_> = reconciled.iter().map(|r| r.recipient.email.as_str()).collect();
        assert_eq!(emails, vec!["a@x", "b@x", "c@x"]);
    }

    #[test]
    fn test_reconcile_keeps_duplicates() {
        let valid = vec![Recipient::new("a@x", "1"), Recipient::new("a@x", "9")];
        let reconciled = reconcile(&valid, &BouncedSet::default());

        assert_eq!(reconciled.len(), 2);
        assert_eq!(reconciled[1].recipient.unsubscribe_id, "9");
    }

    #[test]
    fn test_reconcile_exact_match_only() {
        let valid = vec![Recipient::new("A@X", "1"), Recipient::new("a@x ", "2")];
        let bounced: BouncedSet = ["a@x"].into_iter().collect();

        let reconciled = reconcile(&valid, &bounced);

        assert!(reconciled.iter().all(|r| !r.is_bounced));
    }

    #[test]
    fn test_reconcile_empty_valid() {
        let bounced: BouncedSet = ["a@x"].into_iter().collect();
        assert!(reconcile(&[], &bounced).is_empty());
    }
}

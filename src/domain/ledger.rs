use serde::Serialize;

use super::{ApplicationId, Cents, Entry, Repayment};

/// Compute the outstanding amount for an application from first principles:
/// everything disbursed minus every repayment that still counts.
/// This is the reference value the stored balance row must agree with.
pub fn outstanding_balance(entries: &[Entry], repayments: &[Repayment]) -> Cents {
    let disbursed: Cents = entries.iter().map(|e| e.entry_amount).sum();
    let repaid: Cents = repayments
        .iter()
        .filter(|r| r.is_live())
        .map(|r| r.repayment_amount)
        .sum();
    disbursed - repaid
}

/// Outcome of recomputing every stored balance against the entry and
/// repayment rows backing it.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    /// Number of ledger rows examined.
    pub ledger_count: usize,
    pub issues: Vec<IntegrityIssue>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// Stored balance disagrees with the recomputed outstanding amount.
    BalanceMismatch {
        application_id: ApplicationId,
        stored: Cents,
        computed: Cents,
    },
    /// An entry exists but no balance row was ever initialized.
    MissingBalance { application_id: ApplicationId },
    /// A repayment references an application that was never disbursed.
    RepaymentWithoutEntry { application_id: ApplicationId },
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

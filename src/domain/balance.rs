use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApplicationId, Cents};

/// The current outstanding amount owed for an application. Created once by
/// the disbursement entry and mutated only through signed repayment deltas,
/// so that `balance = disbursed - repaid (non-deleted)` holds at every
/// externally observable point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub id: i64,
    pub application_id: ApplicationId,
    pub balance: Cents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Direction of a repayment-driven balance adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepaymentDirection {
    /// Restore a previously applied repayment (reversal of a wrong or
    /// deleted record): the amount goes back onto the balance.
    Add,
    /// Apply a repayment: the amount comes off the balance.
    Remove,
}

impl RepaymentDirection {
    /// The signed delta this direction applies to the stored balance.
    pub fn signed(&self, amount: Cents) -> Cents {
        match self {
            RepaymentDirection::Add => amount,
            RepaymentDirection::Remove => -amount,
        }
    }
}

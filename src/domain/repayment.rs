use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApplicationId, Cents};

pub type RepaymentId = i64;

/// A repayment event against an application's outstanding balance.
/// Corrections go through update/delete, each of which compensates the
/// ledger for the previously applied amount. Deleted repayments are
/// tombstoned and kept for the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repayment {
    pub id: RepaymentId,
    pub application_id: ApplicationId,
    pub repayment_amount: Cents,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Repayment {
    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }
}

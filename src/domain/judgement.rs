use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApplicationId, Cents};

pub type JudgementId = i64;

/// A credit decision for an application. At most one live judgement exists
/// per application; deleting one leaves a tombstone (`is_deleted`), the row
/// is never physically removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judgement {
    pub id: JudgementId,
    pub application_id: ApplicationId,
    /// Name of the judging officer.
    pub name: String,
    /// Amount the judgement approves for disbursement.
    pub approval_amount: Cents,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

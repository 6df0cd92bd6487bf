use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApplicationId, Cents};

pub type EntryId = i64;

/// A disbursement event. Creating an entry establishes the initial
/// outstanding balance for its application. Entries are append-only:
/// there is no update or delete path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub application_id: ApplicationId,
    /// Amount paid out to the borrower.
    pub entry_amount: Cents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

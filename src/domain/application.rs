use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Cents;

pub type ApplicationId = i64;

/// A loan application progressing through judgement, contract, disbursement
/// and repayment. Applications are created before any credit decision;
/// `contracted_at` stays null until the contract step and gates both
/// disbursement and repayment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    /// Applicant name as filed.
    pub name: String,
    /// Amount granted by the credit judgement, if any.
    pub approval_amount: Option<Cents>,
    /// When the contract was signed. None means "not yet contracted".
    pub contracted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn is_contracted(&self) -> bool {
        self.contracted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Application {
        Application {
            id: 1,
            name: "Member Kim".into(),
            approval_amount: None,
            contracted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_contract_gate() {
        let mut application = sample();
        assert!(!application.is_contracted());

        application.contracted_at = Some(Utc::now());
        assert!(application.is_contracted());
    }
}

// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use mutuo::application::LoanService;
use mutuo::domain::{ApplicationId, Cents};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LoanService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LoanService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Test fixture: applications at the stages the guards care about
pub struct LoanFixtures;

impl LoanFixtures {
    /// An application that exists but has not signed a contract yet
    pub async fn pending_application(service: &LoanService) -> Result<ApplicationId> {
        let application = service.create_application("Member Kim").await?;
        Ok(application.id)
    }

    /// A contracted application with no disbursement yet
    pub async fn contracted_application(service: &LoanService) -> Result<ApplicationId> {
        let id = Self::pending_application(service).await?;
        service.contract_application(id).await?;
        Ok(id)
    }

    /// A contracted application disbursed for `amount`, ledger initialized
    pub async fn disbursed_application(
        service: &LoanService,
        amount: Cents,
    ) -> Result<ApplicationId> {
        let id = Self::contracted_application(service).await?;
        service.create_entry(id, amount).await?;
        Ok(id)
    }
}

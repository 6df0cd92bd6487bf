use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{
    outstanding_balance, Application, ApplicationId, Balance, Cents, Entry, IntegrityIssue,
    IntegrityReport, Judgement, JudgementId, Repayment, RepaymentDirection, RepaymentId,
};
use crate::storage::Repository;

use super::AppError;

/// Application service providing the back-office operations: judgement
/// CRUD and grant, disbursement entries, and the repayment/balance ledger.
/// This is the primary interface for any client (CLI, API, etc.).
///
/// Every balance mutation funnels through [`LoanService::apply_repayment`]
/// and [`LoanService::init_balance`], and every multi-step mutation runs
/// under a per-application lock, so the ledger invariant
/// (balance = disbursed - repaid) holds at every observable point.
pub struct LoanService {
    repo: Repository,
    ledger_locks: Mutex<HashMap<ApplicationId, Arc<Mutex<()>>>>,
}

/// Result of recording a disbursement entry
#[derive(Debug)]
pub struct EntryResult {
    pub entry: Entry,
    /// Initial outstanding balance, equal to the entry amount.
    pub balance: Cents,
}

/// Result of recording a repayment
#[derive(Debug)]
pub struct RepaymentResult {
    pub repayment: Repayment,
    /// Outstanding balance after the repayment was applied.
    pub balance: Cents,
}

/// Result of correcting a repayment amount
#[derive(Debug)]
pub struct RepaymentUpdateResult {
    pub application_id: ApplicationId,
    pub before_repayment_amount: Cents,
    pub after_repayment_amount: Cents,
    /// Outstanding balance after the correction.
    pub balance: Cents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of granting a judgement's approval amount to its application
#[derive(Debug)]
pub struct GrantResult {
    pub application_id: ApplicationId,
    pub approval_amount: Cents,
}

impl LoanService {
    /// Create a new loan service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            ledger_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Serialize multi-step ledger mutations per application. Two
    /// concurrent repayment operations on the same application would
    /// otherwise interleave their reverse/apply steps.
    async fn lock_ledger(&self, application_id: ApplicationId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.ledger_locks.lock().await;
            Arc::clone(locks.entry(application_id).or_default())
        };
        lock.lock_owned().await
    }

    // ========================
    // Application operations
    // ========================

    /// File a new loan application.
    pub async fn create_application(&self, name: &str) -> Result<Application, AppError> {
        Ok(self.repo.create_application(name).await?)
    }

    /// Get an application by id.
    pub async fn get_application(&self, id: ApplicationId) -> Result<Application, AppError> {
        self.repo
            .get_application(id)
            .await?
            .ok_or(AppError::ApplicationNotFound(id))
    }

    /// Mark an application as contracted, opening the disbursement gate.
    pub async fn contract_application(&self, id: ApplicationId) -> Result<Application, AppError> {
        self.get_application(id).await?;
        self.repo.contract_application(id).await?;
        self.get_application(id).await
    }

    // ========================
    // Judgement operations
    // ========================

    /// Record a credit judgement for an application.
    pub async fn create_judgement(
        &self,
        application_id: ApplicationId,
        name: &str,
        approval_amount: Cents,
    ) -> Result<Judgement, AppError> {
        self.get_application(application_id).await?;
        Ok(self
            .repo
            .create_judgement(application_id, name, approval_amount)
            .await?)
    }

    /// Get a judgement by id. Tombstoned judgements stay readable here.
    pub async fn get_judgement(&self, id: JudgementId) -> Result<Judgement, AppError> {
        self.repo
            .get_judgement(id)
            .await?
            .ok_or(AppError::JudgementNotFound(id))
    }

    /// Get the live judgement for an application.
    pub async fn judgement_of_application(
        &self,
        application_id: ApplicationId,
    ) -> Result<Judgement, AppError> {
        self.get_application(application_id).await?;
        self.repo
            .get_judgement_by_application(application_id)
            .await?
            .ok_or(AppError::JudgementMissing(application_id))
    }

    /// Overwrite the name and approval amount of a judgement.
    pub async fn update_judgement(
        &self,
        id: JudgementId,
        name: &str,
        approval_amount: Cents,
    ) -> Result<Judgement, AppError> {
        self.get_live_judgement(id).await?;
        self.repo.update_judgement(id, name, approval_amount).await?;
        self.get_judgement(id).await
    }

    /// Soft-delete a judgement. The row is tombstoned, never removed.
    pub async fn delete_judgement(&self, id: JudgementId) -> Result<(), AppError> {
        self.get_live_judgement(id).await?;
        Ok(self.repo.soft_delete_judgement(id).await?)
    }

    /// Grant a judgement: copy its approval amount onto the application.
    pub async fn grant(&self, id: JudgementId) -> Result<GrantResult, AppError> {
        let judgement = self.get_live_judgement(id).await?;
        self.get_application(judgement.application_id).await?;

        self.repo
            .set_approval_amount(judgement.application_id, judgement.approval_amount)
            .await?;

        Ok(GrantResult {
            application_id: judgement.application_id,
            approval_amount: judgement.approval_amount,
        })
    }

    /// Load a judgement for mutation. A tombstoned judgement is treated
    /// as gone.
    async fn get_live_judgement(&self, id: JudgementId) -> Result<Judgement, AppError> {
        let judgement = self.get_judgement(id).await?;
        if judgement.is_deleted {
            return Err(AppError::JudgementNotFound(id));
        }
        Ok(judgement)
    }

    // ========================
    // Entry operations
    // ========================

    /// Record a disbursement entry and initialize the ledger.
    /// The application must exist and be contracted. Disbursement is
    /// append-only; there is no entry update or delete.
    pub async fn create_entry(
        &self,
        application_id: ApplicationId,
        entry_amount: Cents,
    ) -> Result<EntryResult, AppError> {
        if entry_amount <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let application = self.get_application(application_id).await?;
        if !application.is_contracted() {
            return Err(AppError::ApplicationNotContracted(application_id));
        }

        let _guard = self.lock_ledger(application_id).await;

        // Reject a duplicate disbursement before the entry row lands, so a
        // failed create never leaves an orphan entry behind.
        if self.repo.get_balance(application_id).await?.is_some() {
            return Err(AppError::BalanceAlreadyExists(application_id));
        }

        let entry = self.repo.create_entry(application_id, entry_amount).await?;
        let balance = self.init_balance(application_id, entry_amount).await?;

        Ok(EntryResult {
            entry,
            balance: balance.balance,
        })
    }

    // ========================
    // Repayment operations
    // ========================

    /// Record a repayment and take it off the outstanding balance.
    /// The application must be contracted and disbursed.
    pub async fn create_repayment(
        &self,
        application_id: ApplicationId,
        repayment_amount: Cents,
    ) -> Result<RepaymentResult, AppError> {
        if repayment_amount <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        self.ensure_repayable(application_id).await?;

        let _guard = self.lock_ledger(application_id).await;

        let repayment = self
            .repo
            .create_repayment(application_id, repayment_amount)
            .await?;
        let balance = self
            .apply_repayment(application_id, repayment_amount, RepaymentDirection::Remove)
            .await?;

        Ok(RepaymentResult { repayment, balance })
    }

    /// List repayments for an application, tombstones excluded unless
    /// `include_deleted` asks for the full audit trail.
    pub async fn list_repayments(
        &self,
        application_id: ApplicationId,
        include_deleted: bool,
    ) -> Result<Vec<Repayment>, AppError> {
        Ok(self
            .repo
            .list_repayments(application_id, include_deleted)
            .await?)
    }

    /// Get a repayment by id, tombstoned or not.
    pub async fn get_repayment(&self, id: RepaymentId) -> Result<Repayment, AppError> {
        self.repo
            .get_repayment(id)
            .await?
            .ok_or(AppError::RepaymentNotFound(id))
    }

    /// Correct a repayment amount. The old effect is reversed before the
    /// new one is applied, so the stored amount and the ledger never
    /// disagree: restore the wrong amount, overwrite the record, then
    /// take off the corrected amount.
    pub async fn update_repayment(
        &self,
        id: RepaymentId,
        new_amount: Cents,
    ) -> Result<RepaymentUpdateResult, AppError> {
        if new_amount <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        // The first read only picks the lock; liveness and the amount to
        // reverse must be re-read under the guard, or two concurrent
        // corrections could both observe the row live and compensate twice.
        let application_id = self.get_repayment(id).await?.application_id;

        let _guard = self.lock_ledger(application_id).await;

        let repayment = self.get_live_repayment(id).await?;
        let before_amount = repayment.repayment_amount;

        self.apply_repayment(application_id, before_amount, RepaymentDirection::Add)
            .await?;

        self.repo.set_repayment_amount(id, new_amount).await?;

        let balance = self
            .apply_repayment(application_id, new_amount, RepaymentDirection::Remove)
            .await?;

        let updated = self.get_repayment(id).await?;

        Ok(RepaymentUpdateResult {
            application_id,
            before_repayment_amount: before_amount,
            after_repayment_amount: new_amount,
            balance,
            created_at: updated.created_at,
            updated_at: updated.updated_at,
        })
    }

    /// Delete a repayment: restore its amount to the ledger and tombstone
    /// the row. Returns the restored balance.
    pub async fn delete_repayment(&self, id: RepaymentId) -> Result<Cents, AppError> {
        // Same ordering as update: the tombstone check happens under the
        // per-application guard so a repayment is only ever restored once.
        let application_id = self.get_repayment(id).await?.application_id;

        let _guard = self.lock_ledger(application_id).await;

        let repayment = self.get_live_repayment(id).await?;

        let balance = self
            .apply_repayment(
                application_id,
                repayment.repayment_amount,
                RepaymentDirection::Add,
            )
            .await?;

        self.repo.soft_delete_repayment(id).await?;

        Ok(balance)
    }

    /// A repayment may only be recorded against a contracted application
    /// that has been disbursed.
    async fn ensure_repayable(&self, application_id: ApplicationId) -> Result<(), AppError> {
        let application = self.get_application(application_id).await?;
        if !application.is_contracted() {
            return Err(AppError::ApplicationNotContracted(application_id));
        }

        if self
            .repo
            .get_entry_by_application(application_id)
            .await?
            .is_none()
        {
            return Err(AppError::EntryMissing(application_id));
        }

        Ok(())
    }

    /// Load a repayment for mutation. A tombstoned repayment has already
    /// been compensated; treat it as gone.
    async fn get_live_repayment(&self, id: RepaymentId) -> Result<Repayment, AppError> {
        let repayment = self.get_repayment(id).await?;
        if repayment.is_deleted {
            return Err(AppError::RepaymentNotFound(id));
        }
        Ok(repayment)
    }

    // ========================
    // Balance operations
    // ========================

    /// Get the ledger row for an application.
    pub async fn get_balance(&self, application_id: ApplicationId) -> Result<Balance, AppError> {
        self.repo
            .get_balance(application_id)
            .await?
            .ok_or(AppError::BalanceNotFound(application_id))
    }

    /// Initialize the ledger for an application. Fails when a balance
    /// already exists: a second disbursement for the same application is
    /// rejected rather than silently stacked.
    async fn init_balance(
        &self,
        application_id: ApplicationId,
        entry_amount: Cents,
    ) -> Result<Balance, AppError> {
        if self.repo.get_balance(application_id).await?.is_some() {
            return Err(AppError::BalanceAlreadyExists(application_id));
        }
        Ok(self.repo.create_balance(application_id, entry_amount).await?)
    }

    /// Apply a repayment delta to the ledger and return the new balance.
    /// This is the only mutation path for an initialized balance.
    async fn apply_repayment(
        &self,
        application_id: ApplicationId,
        amount: Cents,
        direction: RepaymentDirection,
    ) -> Result<Cents, AppError> {
        self.repo
            .adjust_balance(application_id, direction.signed(amount))
            .await?
            .ok_or(AppError::BalanceNotFound(application_id))
    }

    // ========================
    // Integrity operations
    // ========================

    /// Recompute every application's outstanding amount from its entry
    /// and repayment rows and diff it against the stored ledger.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let balances = self.repo.list_balances().await?;
        let mut issues = Vec::new();

        let with_balance: HashSet<ApplicationId> =
            balances.iter().map(|b| b.application_id).collect();

        for balance in &balances {
            let entries = self.repo.list_entries(balance.application_id).await?;
            let repayments = self.repo.list_repayments(balance.application_id, true).await?;
            let computed = outstanding_balance(&entries, &repayments);

            if computed != balance.balance {
                issues.push(IntegrityIssue::BalanceMismatch {
                    application_id: balance.application_id,
                    stored: balance.balance,
                    computed,
                });
            }
        }

        for application_id in self.repo.entry_application_ids().await? {
            if !with_balance.contains(&application_id) {
                issues.push(IntegrityIssue::MissingBalance { application_id });
            }
        }

        for application_id in self.repo.repayment_application_ids().await? {
            let entries = self.repo.list_entries(application_id).await?;
            if entries.is_empty() {
                issues.push(IntegrityIssue::RepaymentWithoutEntry { application_id });
            }
        }

        Ok(IntegrityReport {
            ledger_count: balances.len(),
            issues,
        })
    }
}

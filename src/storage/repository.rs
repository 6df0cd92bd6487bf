use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::{
    Application, ApplicationId, Balance, Cents, Entry, Judgement, JudgementId, Repayment,
    RepaymentId,
};

use super::MIGRATION_001_INITIAL;

/// Repository for persisting and querying applications, judgements,
/// entries, balances and repayments.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given path.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Application operations
    // ========================

    /// Create a new application. Approval amount and contract date start
    /// empty and are filled in by the judgement grant and contract steps.
    pub async fn create_application(&self, name: &str) -> Result<Application> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO applications (name, approval_amount, contracted_at, created_at, updated_at)
            VALUES (?, NULL, NULL, ?, ?)
            "#,
        )
        .bind(name)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to create application")?;

        Ok(Application {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            approval_amount: None,
            contracted_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get an application by id.
    pub async fn get_application(&self, id: ApplicationId) -> Result<Option<Application>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, approval_amount, contracted_at, created_at, updated_at
            FROM applications
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch application")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_application(&row)?)),
            None => Ok(None),
        }
    }

    /// Mark an application as contracted.
    pub async fn contract_application(&self, id: ApplicationId) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE applications SET contracted_at = ?, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to contract application")?;
        Ok(())
    }

    /// Set the granted approval amount on an application.
    pub async fn set_approval_amount(&self, id: ApplicationId, amount: Cents) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE applications SET approval_amount = ?, updated_at = ? WHERE id = ?")
            .bind(amount)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to set approval amount")?;
        Ok(())
    }

    fn row_to_application(row: &sqlx::sqlite::SqliteRow) -> Result<Application> {
        let contracted_at: Option<String> = row.get("contracted_at");
        Ok(Application {
            id: row.get("id"),
            name: row.get("name"),
            approval_amount: row.get("approval_amount"),
            contracted_at: contracted_at
                .map(|s| Self::parse_timestamp(&s))
                .transpose()?,
            created_at: Self::parse_timestamp(&row.get::<String, _>("created_at"))?,
            updated_at: Self::parse_timestamp(&row.get::<String, _>("updated_at"))?,
        })
    }

    // ========================
    // Judgement operations
    // ========================

    /// Save a new judgement for an application.
    pub async fn create_judgement(
        &self,
        application_id: ApplicationId,
        name: &str,
        approval_amount: Cents,
    ) -> Result<Judgement> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO judgements (application_id, name, approval_amount, is_deleted, created_at, updated_at)
            VALUES (?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(application_id)
        .bind(name)
        .bind(approval_amount)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to create judgement")?;

        Ok(Judgement {
            id: result.last_insert_rowid(),
            application_id,
            name: name.to_string(),
            approval_amount,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a judgement by id. Tombstoned rows are still returned here;
    /// they stay readable for the audit trail.
    pub async fn get_judgement(&self, id: JudgementId) -> Result<Option<Judgement>> {
        let row = sqlx::query(
            r#"
            SELECT id, application_id, name, approval_amount, is_deleted, created_at, updated_at
            FROM judgements
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch judgement")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_judgement(&row)?)),
            None => Ok(None),
        }
    }

    /// Get the live judgement for an application, if any.
    pub async fn get_judgement_by_application(
        &self,
        application_id: ApplicationId,
    ) -> Result<Option<Judgement>> {
        let row = sqlx::query(
            r#"
            SELECT id, application_id, name, approval_amount, is_deleted, created_at, updated_at
            FROM judgements
            WHERE application_id = ? AND is_deleted = 0
            LIMIT 1
            "#,
        )
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch judgement by application")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_judgement(&row)?)),
            None => Ok(None),
        }
    }

    /// Overwrite the name and approval amount of a judgement.
    pub async fn update_judgement(
        &self,
        id: JudgementId,
        name: &str,
        approval_amount: Cents,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE judgements SET name = ?, approval_amount = ?, updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(approval_amount)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update judgement")?;
        Ok(())
    }

    /// Tombstone a judgement (soft delete).
    pub async fn soft_delete_judgement(&self, id: JudgementId) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE judgements SET is_deleted = 1, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete judgement")?;
        Ok(())
    }

    fn row_to_judgement(row: &sqlx::sqlite::SqliteRow) -> Result<Judgement> {
        Ok(Judgement {
            id: row.get("id"),
            application_id: row.get("application_id"),
            name: row.get("name"),
            approval_amount: row.get("approval_amount"),
            is_deleted: row.get::<i64, _>("is_deleted") != 0,
            created_at: Self::parse_timestamp(&row.get::<String, _>("created_at"))?,
            updated_at: Self::parse_timestamp(&row.get::<String, _>("updated_at"))?,
        })
    }

    // ========================
    // Entry operations
    // ========================

    /// Record a disbursement entry for an application.
    pub async fn create_entry(
        &self,
        application_id: ApplicationId,
        entry_amount: Cents,
    ) -> Result<Entry> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO entries (application_id, entry_amount, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(application_id)
        .bind(entry_amount)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to create entry")?;

        Ok(Entry {
            id: result.last_insert_rowid(),
            application_id,
            entry_amount,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get the disbursement entry for an application, if one exists.
    pub async fn get_entry_by_application(
        &self,
        application_id: ApplicationId,
    ) -> Result<Option<Entry>> {
        let row = sqlx::query(
            r#"
            SELECT id, application_id, entry_amount, created_at, updated_at
            FROM entries
            WHERE application_id = ?
            LIMIT 1
            "#,
        )
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch entry")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_entry(&row)?)),
            None => Ok(None),
        }
    }

    /// List all disbursement entries for an application.
    pub async fn list_entries(&self, application_id: ApplicationId) -> Result<Vec<Entry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, application_id, entry_amount, created_at, updated_at
            FROM entries
            WHERE application_id = ?
            ORDER BY id
            "#,
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list entries")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Distinct application ids that have at least one disbursement entry.
    pub async fn entry_application_ids(&self) -> Result<Vec<ApplicationId>> {
        let rows =
            sqlx::query("SELECT DISTINCT application_id FROM entries ORDER BY application_id")
                .fetch_all(&self.pool)
                .await
                .context("Failed to list entry application ids")?;

        Ok(rows.iter().map(|r| r.get("application_id")).collect())
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<Entry> {
        Ok(Entry {
            id: row.get("id"),
            application_id: row.get("application_id"),
            entry_amount: row.get("entry_amount"),
            created_at: Self::parse_timestamp(&row.get::<String, _>("created_at"))?,
            updated_at: Self::parse_timestamp(&row.get::<String, _>("updated_at"))?,
        })
    }

    // ========================
    // Balance operations
    // ========================

    /// Initialize the ledger row for an application. The schema enforces
    /// one row per application; a duplicate insert fails.
    pub async fn create_balance(
        &self,
        application_id: ApplicationId,
        balance: Cents,
    ) -> Result<Balance> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO balances (application_id, balance, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(application_id)
        .bind(balance)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to create balance")?;

        Ok(Balance {
            id: result.last_insert_rowid(),
            application_id,
            balance,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get the ledger row for an application.
    pub async fn get_balance(&self, application_id: ApplicationId) -> Result<Option<Balance>> {
        let row = sqlx::query(
            r#"
            SELECT id, application_id, balance, created_at, updated_at
            FROM balances
            WHERE application_id = ?
            "#,
        )
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch balance")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_balance(&row)?)),
            None => Ok(None),
        }
    }

    /// Apply a signed delta to a ledger row and return the new balance.
    /// Returns None when no ledger row exists for the application.
    pub async fn adjust_balance(
        &self,
        application_id: ApplicationId,
        delta: Cents,
    ) -> Result<Option<Cents>> {
        let now = Utc::now().to_rfc3339();
        let row = sqlx::query(
            r#"
            UPDATE balances
            SET balance = balance + ?, updated_at = ?
            WHERE application_id = ?
            RETURNING balance
            "#,
        )
        .bind(delta)
        .bind(&now)
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to adjust balance")?;

        Ok(row.map(|r| r.get("balance")))
    }

    /// List every ledger row, for integrity verification.
    pub async fn list_balances(&self) -> Result<Vec<Balance>> {
        let rows = sqlx::query(
            r#"
            SELECT id, application_id, balance, created_at, updated_at
            FROM balances
            ORDER BY application_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list balances")?;

        rows.iter().map(Self::row_to_balance).collect()
    }

    fn row_to_balance(row: &sqlx::sqlite::SqliteRow) -> Result<Balance> {
        Ok(Balance {
            id: row.get("id"),
            application_id: row.get("application_id"),
            balance: row.get("balance"),
            created_at: Self::parse_timestamp(&row.get::<String, _>("created_at"))?,
            updated_at: Self::parse_timestamp(&row.get::<String, _>("updated_at"))?,
        })
    }

    // ========================
    // Repayment operations
    // ========================

    /// Record a repayment for an application.
    pub async fn create_repayment(
        &self,
        application_id: ApplicationId,
        repayment_amount: Cents,
    ) -> Result<Repayment> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO repayments (application_id, repayment_amount, is_deleted, created_at, updated_at)
            VALUES (?, ?, 0, ?, ?)
            "#,
        )
        .bind(application_id)
        .bind(repayment_amount)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to create repayment")?;

        Ok(Repayment {
            id: result.last_insert_rowid(),
            application_id,
            repayment_amount,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a repayment by id, tombstoned or not.
    pub async fn get_repayment(&self, id: RepaymentId) -> Result<Option<Repayment>> {
        let row = sqlx::query(
            r#"
            SELECT id, application_id, repayment_amount, is_deleted, created_at, updated_at
            FROM repayments
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch repayment")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_repayment(&row)?)),
            None => Ok(None),
        }
    }

    /// Overwrite the amount of a repayment.
    pub async fn set_repayment_amount(&self, id: RepaymentId, amount: Cents) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE repayments SET repayment_amount = ?, updated_at = ? WHERE id = ?")
            .bind(amount)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update repayment amount")?;
        Ok(())
    }

    /// Tombstone a repayment (soft delete).
    pub async fn soft_delete_repayment(&self, id: RepaymentId) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE repayments SET is_deleted = 1, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete repayment")?;
        Ok(())
    }

    /// List repayments for an application, oldest first. Tombstoned rows
    /// are excluded unless `include_deleted` is set.
    pub async fn list_repayments(
        &self,
        application_id: ApplicationId,
        include_deleted: bool,
    ) -> Result<Vec<Repayment>> {
        let query = if include_deleted {
            "SELECT id, application_id, repayment_amount, is_deleted, created_at, updated_at
             FROM repayments WHERE application_id = ? ORDER BY id"
        } else {
            "SELECT id, application_id, repayment_amount, is_deleted, created_at, updated_at
             FROM repayments WHERE application_id = ? AND is_deleted = 0 ORDER BY id"
        };

        let rows = sqlx::query(query)
            .bind(application_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list repayments")?;

        rows.iter().map(Self::row_to_repayment).collect()
    }

    /// Distinct application ids that have at least one repayment row.
    pub async fn repayment_application_ids(&self) -> Result<Vec<ApplicationId>> {
        let rows = sqlx::query(
            "SELECT DISTINCT application_id FROM repayments ORDER BY application_id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list repayment application ids")?;

        Ok(rows.iter().map(|r| r.get("application_id")).collect())
    }

    fn row_to_repayment(row: &sqlx::sqlite::SqliteRow) -> Result<Repayment> {
        Ok(Repayment {
            id: row.get("id"),
            application_id: row.get("application_id"),
            repayment_amount: row.get("repayment_amount"),
            is_deleted: row.get::<i64, _>("is_deleted") != 0,
            created_at: Self::parse_timestamp(&row.get::<String, _>("created_at"))?,
            updated_at: Self::parse_timestamp(&row.get::<String, _>("updated_at"))?,
        })
    }

    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(s)
            .context("Invalid timestamp")?
            .with_timezone(&Utc))
    }
}

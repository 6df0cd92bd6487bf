use thiserror::Error;

use crate::domain::{ApplicationId, JudgementId, RepaymentId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Application not found: {0}")]
    ApplicationNotFound(ApplicationId),

    #[error("Application is not contracted: {0}")]
    ApplicationNotContracted(ApplicationId),

    #[error("No disbursement entry exists for application {0}")]
    EntryMissing(ApplicationId),

    #[error("Balance already initialized for application {0}")]
    BalanceAlreadyExists(ApplicationId),

    #[error("No balance exists for application {0}")]
    BalanceNotFound(ApplicationId),

    #[error("Judgement not found: {0}")]
    JudgementNotFound(JudgementId),

    #[error("No judgement exists for application {0}")]
    JudgementMissing(ApplicationId),

    #[error("Repayment not found: {0}")]
    RepaymentNotFound(RepaymentId),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

/// Result code carried on every outward-facing response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Success,
    NotExist,
    SystemError,
}

impl ResultType {
    pub fn code(&self) -> &'static str {
        match self {
            ResultType::Success => "SUCCESS",
            ResultType::NotExist => "NOT_EXIST",
            ResultType::SystemError => "SYSTEM_ERROR",
        }
    }
}

impl std::fmt::Display for ResultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl AppError {
    /// Map this error to its envelope result code. Validation failures
    /// surface as SYSTEM_ERROR, missing referenced records as NOT_EXIST.
    pub fn result_type(&self) -> ResultType {
        match self {
            AppError::JudgementNotFound(_)
            | AppError::JudgementMissing(_)
            | AppError::RepaymentNotFound(_)
            | AppError::BalanceNotFound(_)
            | AppError::DocumentNotFound(_) => ResultType::NotExist,
            _ => ResultType::SystemError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_records_map_to_not_exist() {
        assert_eq!(
            AppError::RepaymentNotFound(7).result_type(),
            ResultType::NotExist
        );
        assert_eq!(
            AppError::BalanceNotFound(1).result_type(),
            ResultType::NotExist
        );
    }

    #[test]
    fn test_validation_failures_map_to_system_error() {
        assert_eq!(
            AppError::ApplicationNotContracted(1).result_type(),
            ResultType::SystemError
        );
        assert_eq!(
            AppError::EntryMissing(1).result_type(),
            ResultType::SystemError
        );
    }
}

mod common;

use anyhow::Result;
use common::{test_service, LoanFixtures};
use mutuo::application::AppError;

#[tokio::test]
async fn test_repayment_lifecycle_scenario() -> Result<()> {
    // Entry 500 -> balance 500. Repay 100 -> 400. Correct to 200 -> 300.
    // Delete the repayment -> back to 500.
    let (service, _temp) = test_service().await?;
    let application_id = LoanFixtures::disbursed_application(&service, 50000).await?;

    assert_eq!(service.get_balance(application_id).await?.balance, 50000);

    let created = service.create_repayment(application_id, 10000).await?;
    assert_eq!(created.balance, 40000);

    let updated = service.update_repayment(created.repayment.id, 20000).await?;
    assert_eq!(updated.before_repayment_amount, 10000);
    assert_eq!(updated.after_repayment_amount, 20000);
    assert_eq!(updated.balance, 30000);
    assert_eq!(updated.application_id, application_id);

    let restored = service.delete_repayment(created.repayment.id).await?;
    assert_eq!(restored, 50000);
    assert_eq!(service.get_balance(application_id).await?.balance, 50000);

    Ok(())
}

#[tokio::test]
async fn test_create_requires_contract() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let application_id = LoanFixtures::pending_application(&service).await?;

    let err = service
        .create_repayment(application_id, 10000)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ApplicationNotContracted(_)));

    Ok(())
}

#[tokio::test]
async fn test_create_requires_entry_even_when_contracted() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let application_id = LoanFixtures::contracted_application(&service).await?;

    let err = service
        .create_repayment(application_id, 10000)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::EntryMissing(_)));

    Ok(())
}

#[tokio::test]
async fn test_create_requires_existing_application() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service.create_repayment(999, 10000).await.unwrap_err();
    assert!(matches!(err, AppError::ApplicationNotFound(999)));

    Ok(())
}

#[tokio::test]
async fn test_create_rejects_non_positive_amount() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let application_id = LoanFixtures::disbursed_application(&service, 50000).await?;

    let err = service.create_repayment(application_id, 0).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    Ok(())
}

#[tokio::test]
async fn test_update_compensates_by_exact_difference() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let application_id = LoanFixtures::disbursed_application(&service, 100000).await?;

    let first = service.create_repayment(application_id, 25000).await?;
    service.create_repayment(application_id, 5000).await?;

    let before = service.get_balance(application_id).await?.balance;
    let result = service.update_repayment(first.repayment.id, 40000).await?;

    // balance after == balance before + old amount - new amount
    assert_eq!(result.balance, before + 25000 - 40000);
    assert_eq!(
        service.get_repayment(first.repayment.id).await?.repayment_amount,
        40000
    );

    Ok(())
}

#[tokio::test]
async fn test_update_missing_repayment() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service.update_repayment(42, 10000).await.unwrap_err();
    assert!(matches!(err, AppError::RepaymentNotFound(42)));

    Ok(())
}

#[tokio::test]
async fn test_delete_restores_balance_and_keeps_row() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let application_id = LoanFixtures::disbursed_application(&service, 50000).await?;

    let created = service.create_repayment(application_id, 10000).await?;
    let before = service.get_balance(application_id).await?.balance;

    let restored = service.delete_repayment(created.repayment.id).await?;
    assert_eq!(restored, before + 10000);

    // Tombstoned, but still retrievable by id for the audit trail.
    let repayment = service.get_repayment(created.repayment.id).await?;
    assert!(repayment.is_deleted);
    assert_eq!(repayment.repayment_amount, 10000);

    Ok(())
}

#[tokio::test]
async fn test_deleted_repayment_cannot_be_mutated_again() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let application_id = LoanFixtures::disbursed_application(&service, 50000).await?;

    let created = service.create_repayment(application_id, 10000).await?;
    service.delete_repayment(created.repayment.id).await?;

    // A second delete or an update would compensate the ledger twice.
    let err = service
        .delete_repayment(created.repayment.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RepaymentNotFound(_)));

    let err = service
        .update_repayment(created.repayment.id, 5000)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RepaymentNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_concurrent_deletes_compensate_only_once() -> Result<()> {
    // Two tasks racing to delete the same repayment: exactly one may win,
    // and the ledger must be restored exactly once.
    let (service, _temp) = test_service().await?;
    let application_id = LoanFixtures::disbursed_application(&service, 50000).await?;
    let created = service.create_repayment(application_id, 10000).await?;

    let service = std::sync::Arc::new(service);
    let repayment_id = created.repayment.id;

    let first = tokio::spawn({
        let service = service.clone();
        async move { service.delete_repayment(repayment_id).await }
    });
    let second = tokio::spawn({
        let service = service.clone();
        async move { service.delete_repayment(repayment_id).await }
    });

    let results = [first.await?, second.await?];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one delete may succeed: {:?}", results);

    assert_eq!(service.get_balance(application_id).await?.balance, 50000);
    assert!(service.check_integrity().await?.is_clean());

    Ok(())
}

#[tokio::test]
async fn test_concurrent_update_and_delete_keep_invariant() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let application_id = LoanFixtures::disbursed_application(&service, 50000).await?;
    let created = service.create_repayment(application_id, 10000).await?;

    let service = std::sync::Arc::new(service);
    let repayment_id = created.repayment.id;

    let update = tokio::spawn({
        let service = service.clone();
        async move { service.update_repayment(repayment_id, 20000).await }
    });
    let delete = tokio::spawn({
        let service = service.clone();
        async move { service.delete_repayment(repayment_id).await }
    });

    // Whichever interleaving won, the stored balance must still equal the
    // recomputed outstanding amount.
    let _ = update.await?;
    let _ = delete.await?;

    let repaid: i64 = service
        .list_repayments(application_id, false)
        .await?
        .iter()
        .map(|r| r.repayment_amount)
        .sum();
    assert_eq!(
        service.get_balance(application_id).await?.balance,
        50000 - repaid
    );
    assert!(service.check_integrity().await?.is_clean());

    Ok(())
}

#[tokio::test]
async fn test_list_filters_tombstones_by_default() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let application_id = LoanFixtures::disbursed_application(&service, 50000).await?;

    let first = service.create_repayment(application_id, 10000).await?;
    service.create_repayment(application_id, 5000).await?;
    service.delete_repayment(first.repayment.id).await?;

    let live = service.list_repayments(application_id, false).await?;
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].repayment_amount, 5000);

    let all = service.list_repayments(application_id, true).await?;
    assert_eq!(all.len(), 2);
    assert!(all.iter().any(|r| r.is_deleted));

    Ok(())
}

#[tokio::test]
async fn test_ledger_invariant_holds_after_each_operation() -> Result<()> {
    // balance == disbursed - sum of live repayments, checked step by step.
    let (service, _temp) = test_service().await?;
    let entry_amount = 100000;
    let application_id = LoanFixtures::disbursed_application(&service, entry_amount).await?;

    let mut ids = Vec::new();
    for amount in [10000, 20000, 5000] {
        let result = service.create_repayment(application_id, amount).await?;
        ids.push(result.repayment.id);
        assert_invariant(&service, application_id, entry_amount).await?;
    }

    service.update_repayment(ids[1], 15000).await?;
    assert_invariant(&service, application_id, entry_amount).await?;

    service.delete_repayment(ids[0]).await?;
    assert_invariant(&service, application_id, entry_amount).await?;

    Ok(())
}

async fn assert_invariant(
    service: &mutuo::application::LoanService,
    application_id: i64,
    entry_amount: i64,
) -> Result<()> {
    let repaid: i64 = service
        .list_repayments(application_id, false)
        .await?
        .iter()
        .map(|r| r.repayment_amount)
        .sum();
    let balance = service.get_balance(application_id).await?.balance;
    assert_eq!(balance, entry_amount - repaid);
    Ok(())
}

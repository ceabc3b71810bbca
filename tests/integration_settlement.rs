//! Settlement Integration Tests
//!
//! Customer resolution, wash settlement, and commission payout against a live
//! Postgres (DATABASE_URL).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::PgPool;
use std::sync::Arc;

use motowash::audit::AuditLogService;
use motowash::domain::{CommissionStatus, OperationContext, PaymentMethod, Price};
use motowash::handlers::{
    Collaborators, CommissionLedger, CustomerDirectory, PayoutCommand, RecordWashCommand,
    RegisterCustomerCommand, TransactionRecorder, UpdateTransactionCommand,
};
use motowash::ErrorKind;

mod common;

fn price(value: i64) -> Price {
    Price::from_integer(value).unwrap()
}

fn recorder(pool: &PgPool) -> TransactionRecorder {
    TransactionRecorder::new(pool.clone(), Collaborators::default())
}

async fn customer_row(pool: &PgPool, customer_id: i64) -> (i32, bool, i32, Decimal) {
    sqlx::query_as(
        "SELECT loyalty_count, free_wash_available, total_washes, total_spent FROM customers WHERE id = $1",
    )
    .bind(customer_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

// =========================================================================
// CustomerDirectory
// =========================================================================

#[tokio::test]
async fn test_plate_spellings_resolve_to_one_customer() {
    let pool = common::setup_test_db().await;
    let directory = CustomerDirectory::new(pool.clone());

    let plate = common::unique_plate();
    let messy = format!(" {} {} ", plate[..3].to_lowercase(), plate[3..].to_lowercase());

    let first = directory.resolve(&messy, Some("Andi"), None).await.unwrap();
    let second = directory.resolve(&plate, Some("Someone Else"), None).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.license_plate, plate);
    assert_eq!(second.name, "Andi", "existing customer is returned unchanged");
    assert!(!first.is_member);
    assert_eq!(first.loyalty_count, 0);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE license_plate = $1")
        .bind(&plate)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_concurrent_resolve_creates_one_customer() {
    let pool = common::setup_test_db().await;
    let plate = common::unique_plate();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let directory = CustomerDirectory::new(pool.clone());
            let plate = plate.clone();
            tokio::spawn(async move {
                let name = format!("Racer {i}");
                directory.resolve(&plate, Some(name.as_str()), None).await
            })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap().expect("resolve should never surface the race").id);
    }

    ids.dedup();
    assert_eq!(ids.len(), 1);
}

#[tokio::test]
async fn test_resolve_rejects_empty_plate_and_missing_name() {
    let pool = common::setup_test_db().await;
    let directory = CustomerDirectory::new(pool.clone());

    let err = directory.resolve("   ", Some("Andi"), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = directory
        .resolve(&common::unique_plate(), None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = directory.resolve_by_id(i64::MAX).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_register_promotes_walk_in() {
    let pool = common::setup_test_db().await;
    let directory = CustomerDirectory::new(pool.clone());
    let context = OperationContext::new();
    let operator_id = common::seed_operator(&pool, dec!(20)).await;

    let plate = common::unique_plate();
    let receipt = recorder(&pool)
        .record(
            RecordWashCommand::for_plate(operator_id, &plate, price(30_000), PaymentMethod::Cash)
                .with_customer_name("Walk In"),
            &context,
        )
        .await
        .unwrap();

    let member = directory
        .register(
            RegisterCustomerCommand::new(plate.to_lowercase(), "Registered Name").with_phone("0812"),
            &context,
        )
        .await
        .unwrap();

    assert_eq!(member.id, receipt.customer_id);
    assert!(member.is_member);
    assert_eq!(member.name, "Registered Name");
    assert_eq!(member.phone.as_deref(), Some("0812"));
    assert_eq!(member.total_washes, 1, "history survives promotion");

    let err = directory
        .register(RegisterCustomerCommand::new(&plate, "Again"), &context)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let found = directory.find_by_plate(&plate).await.unwrap().unwrap();
    assert_eq!(found.id, member.id);
}

// =========================================================================
// TransactionRecorder
// =========================================================================

#[tokio::test]
async fn test_normal_wash_updates_totals() {
    let pool = common::setup_test_db().await;
    let operator_id = common::seed_operator(&pool, dec!(25)).await;
    let customer_id = common::seed_customer(&pool, &common::unique_plate(), 0, false).await;

    let receipt = recorder(&pool)
        .record(
            RecordWashCommand::for_customer(operator_id, customer_id, price(75_000), PaymentMethod::Qris),
            &OperationContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(receipt.commission_amount, dec!(18750));
    assert_eq!(receipt.price, dec!(75000));
    assert_eq!(receipt.original_price, dec!(75000));
    assert!(!receipt.is_loyalty_free);
    assert!(receipt.transaction_code.starts_with("TRX-"));

    let (total_commission, total_washes) = common::operator_totals(&pool, operator_id).await;
    assert_eq!(total_commission, dec!(18750));
    assert_eq!(total_washes, 1);

    let (loyalty_count, free_wash, washes, spent) = customer_row(&pool, customer_id).await;
    assert_eq!(loyalty_count, 1);
    assert!(!free_wash);
    assert_eq!(washes, 1);
    assert_eq!(spent, dec!(75000));

    let details = recorder(&pool).get(receipt.id).await.unwrap();
    assert_eq!(details.commission.amount, dec!(18750));
    assert_eq!(details.commission.status, CommissionStatus::Pending);
    assert_eq!(details.transaction.customer_id, customer_id);

    let audit = AuditLogService::new(pool.clone())
        .recent_for_resource("wash_transaction", &receipt.id.to_string(), 5)
        .await
        .unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, "wash.recorded");
}

#[tokio::test]
async fn test_free_wash_end_to_end() {
    let pool = common::setup_test_db().await;
    let operator_id = common::seed_operator(&pool, dec!(30)).await;
    let customer_id = common::seed_customer(&pool, &common::unique_plate(), 4, true).await;

    let receipt = recorder(&pool)
        .record(
            RecordWashCommand::for_customer(operator_id, customer_id, price(50_000), PaymentMethod::Cash)
                .free_wash(),
            &OperationContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(receipt.commission_amount, dec!(15000));
    assert_eq!(receipt.price, Decimal::ZERO);
    assert_eq!(receipt.loyalty_count, 5);
    assert!(!receipt.free_wash_available, "free wash was just consumed");

    let (loyalty_count, free_wash, _, spent) = customer_row(&pool, customer_id).await;
    assert_eq!(loyalty_count, 5);
    assert!(!free_wash);
    assert_eq!(spent, Decimal::ZERO);

    let (total_commission, _) = common::operator_totals(&pool, operator_id).await;
    assert_eq!(total_commission, dec!(15000));
}

#[tokio::test]
async fn test_fifth_paid_wash_earns_free_wash() {
    let pool = common::setup_test_db().await;
    let operator_id = common::seed_operator(&pool, dec!(30)).await;
    let customer_id = common::seed_customer(&pool, &common::unique_plate(), 4, false).await;

    let receipt = recorder(&pool)
        .record(
            RecordWashCommand::for_customer(operator_id, customer_id, price(40_000), PaymentMethod::Ewallet),
            &OperationContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(receipt.loyalty_count, 5);
    assert!(receipt.free_wash_available);

    // Sixth wash leaves the earned free wash in place
    let receipt = recorder(&pool)
        .record(
            RecordWashCommand::for_customer(operator_id, customer_id, price(40_000), PaymentMethod::Cash),
            &OperationContext::new(),
        )
        .await
        .unwrap();
    assert_eq!(receipt.loyalty_count, 6);
    assert!(receipt.free_wash_available);
}

#[tokio::test]
async fn test_free_wash_requires_eligibility() {
    let pool = common::setup_test_db().await;
    let operator_id = common::seed_operator(&pool, dec!(30)).await;
    let customer_id = common::seed_customer(&pool, &common::unique_plate(), 2, false).await;

    let err = recorder(&pool)
        .record(
            RecordWashCommand::for_customer(operator_id, customer_id, price(50_000), PaymentMethod::Cash)
                .free_wash(),
            &OperationContext::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let (total_commission, total_washes) = common::operator_totals(&pool, operator_id).await;
    assert_eq!(total_commission, Decimal::ZERO);
    assert_eq!(total_washes, 0);
}

#[tokio::test]
async fn test_operator_must_exist_and_be_active() {
    let pool = common::setup_test_db().await;
    let inactive = common::seed_operator_with(&pool, dec!(30), false).await;
    let plate = common::unique_plate();

    let command = RecordWashCommand::for_plate(inactive, &plate, price(20_000), PaymentMethod::Cash)
        .with_customer_name("Andi");
    let err = recorder(&pool)
        .record(command.clone(), &OperationContext::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let mut missing = command;
    missing.operator_id = i64::MAX;
    let err = recorder(&pool)
        .record(missing, &OperationContext::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // Neither attempt left a walk-in behind
    let directory = CustomerDirectory::new(pool.clone());
    assert!(directory.find_by_plate(&plate).await.unwrap().is_none());
}

#[tokio::test]
async fn test_new_plate_without_name_is_rejected() {
    let pool = common::setup_test_db().await;
    let operator_id = common::seed_operator(&pool, dec!(30)).await;

    let err = recorder(&pool)
        .record(
            RecordWashCommand::for_plate(operator_id, common::unique_plate(), price(20_000), PaymentMethod::Cash),
            &OperationContext::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_code_collision_rolls_back_everything() {
    let pool = common::setup_test_db().await;
    let operator_id = common::seed_operator(&pool, dec!(30)).await;

    let collaborators =
        Collaborators::default().with_codes(Arc::new(common::FixedCodeGenerator::unique()));
    let recorder = TransactionRecorder::new(pool.clone(), collaborators);

    recorder
        .record(
            RecordWashCommand::for_plate(operator_id, common::unique_plate(), price(20_000), PaymentMethod::Cash)
                .with_customer_name("First"),
            &OperationContext::new(),
        )
        .await
        .unwrap();

    let second_plate = common::unique_plate();
    let err = recorder
        .record(
            RecordWashCommand::for_plate(operator_id, &second_plate, price(20_000), PaymentMethod::Cash)
                .with_customer_name("Second"),
            &OperationContext::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let (total_commission, total_washes) = common::operator_totals(&pool, operator_id).await;
    assert_eq!(total_commission, dec!(6000));
    assert_eq!(total_washes, 1);

    let directory = CustomerDirectory::new(pool.clone());
    assert!(
        directory.find_by_plate(&second_plate).await.unwrap().is_none(),
        "walk-in insert rolled back with the transaction"
    );
}

#[tokio::test]
async fn test_concurrent_records_never_lose_commission() {
    let pool = common::setup_test_db().await;
    let operator_id = common::seed_operator(&pool, dec!(25)).await;
    let shared_customer = common::seed_customer(&pool, &common::unique_plate(), 0, false).await;

    let tasks: Vec<_> = (0..10)
        .map(|i| {
            let recorder = recorder(&pool);
            let command = RecordWashCommand::for_customer(
                operator_id,
                shared_customer,
                price(10_000 + i * 1_000),
                PaymentMethod::Cash,
            );
            tokio::spawn(async move {
                let context = OperationContext::new();
                recorder.record(command, &context).await
            })
        })
        .collect();

    let mut expected = Decimal::ZERO;
    for task in tasks {
        expected += task.await.unwrap().unwrap().commission_amount;
    }

    let (total_commission, total_washes) = common::operator_totals(&pool, operator_id).await;
    assert_eq!(total_commission, expected);
    assert_eq!(total_washes, 10);

    let (loyalty_count, free_wash, washes, _) = customer_row(&pool, shared_customer).await;
    assert_eq!(loyalty_count, 10);
    assert_eq!(washes, 10);
    assert!(free_wash, "tenth wash is a threshold multiple");
}

#[tokio::test]
async fn test_update_details_leaves_money_alone() {
    let pool = common::setup_test_db().await;
    let operator_id = common::seed_operator(&pool, dec!(25)).await;
    let customer_id = common::seed_customer(&pool, &common::unique_plate(), 0, false).await;
    let context = OperationContext::new();

    let receipt = recorder(&pool)
        .record(
            RecordWashCommand::for_customer(operator_id, customer_id, price(60_000), PaymentMethod::Cash),
            &context,
        )
        .await
        .unwrap();

    let updated = recorder(&pool)
        .update_details(
            receipt.id,
            UpdateTransactionCommand {
                payment_method: Some(PaymentMethod::Transfer),
                notes: Some("paid by transfer after all".to_string()),
            },
            &context,
        )
        .await
        .unwrap();

    assert_eq!(updated.payment_method, PaymentMethod::Transfer);
    assert_eq!(updated.notes.as_deref(), Some("paid by transfer after all"));
    assert_eq!(updated.price, dec!(60000));

    let details = recorder(&pool).get(receipt.id).await.unwrap();
    assert_eq!(details.commission.amount, dec!(15000));

    let err = recorder(&pool)
        .update_details(receipt.id, UpdateTransactionCommand::default(), &context)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = recorder(&pool)
        .update_details(
            i64::MAX,
            UpdateTransactionCommand {
                payment_method: Some(PaymentMethod::Cash),
                notes: None,
            },
            &context,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// =========================================================================
// CommissionLedger
// =========================================================================

#[tokio::test]
async fn test_payout_settles_all_pending_once() {
    let pool = common::setup_test_db().await;
    let operator_id = common::seed_operator(&pool, dec!(30)).await;
    let customer_id = common::seed_customer(&pool, &common::unique_plate(), 0, false).await;
    let context = OperationContext::new();

    for _ in 0..3 {
        recorder(&pool)
            .record(
                RecordWashCommand::for_customer(operator_id, customer_id, price(50_000), PaymentMethod::Cash),
                &context,
            )
            .await
            .unwrap();
    }

    let ledger = CommissionLedger::new(pool.clone(), Collaborators::default());
    let pending = ledger.list_pending(operator_id).await.unwrap();
    assert_eq!(pending.len(), 3);

    let summary = ledger.pending_summary(operator_id).await.unwrap();
    assert_eq!(summary.pending_count, 3);
    assert_eq!(summary.pending_total, dec!(45000));

    let result = ledger
        .payout(PayoutCommand::new(operator_id, 1).with_notes("weekly"), &context)
        .await
        .unwrap();
    assert_eq!(result.total_amount, dec!(45000));
    assert_eq!(result.commissions_paid, 3);

    let paid: Vec<(String, Option<chrono::DateTime<chrono::Utc>>, Option<i64>)> = sqlx::query_as(
        "SELECT status, paid_at, payout_id FROM commissions WHERE operator_id = $1",
    )
    .bind(operator_id)
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(paid.len(), 3);
    for (status, paid_at, payout_id) in &paid {
        assert_eq!(status, "paid");
        assert_eq!(*paid_at, Some(result.paid_at));
        assert_eq!(*payout_id, Some(result.payout_id));
    }

    // Accrued at settlement; payout does not add to it again
    let (total_commission, _) = common::operator_totals(&pool, operator_id).await;
    assert_eq!(total_commission, dec!(45000));

    let err = ledger
        .payout(PayoutCommand::new(operator_id, 1), &context)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    assert!(ledger.list_pending(operator_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ledger_unknown_operator() {
    let pool = common::setup_test_db().await;
    let ledger = CommissionLedger::new(pool.clone(), Collaborators::default());

    let err = ledger.list_pending(i64::MAX).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = ledger
        .payout(PayoutCommand::new(i64::MAX, 1), &OperationContext::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

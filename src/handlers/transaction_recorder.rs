//! Transaction Recorder
//!
//! Settles a completed wash: transaction row, commission ledger entry,
//! customer statistics and operator statistics commit together or not at all.

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::audit::{self, AuditAction, AuditLogBuilder};
use crate::domain::{
    CommissionCalculator, CommissionRecord, CommissionStatus, Customer, DomainError, LicensePlate,
    OperationContext, WashTransaction,
};
use crate::error::AppError;

use super::{
    ensure_active, lock_operator, Collaborators, CustomerDirectory, RecordWashCommand,
    TransactionDetails, UpdateTransactionCommand, WashReceipt,
};

const TRANSACTION_CODE_CONSTRAINT: &str = "wash_transactions_transaction_code_key";

// =========================================================================
// TransactionRecorder
// =========================================================================

pub struct TransactionRecorder {
    pool: PgPool,
    collaborators: Collaborators,
}

impl TransactionRecorder {
    pub fn new(pool: PgPool, collaborators: Collaborators) -> Self {
        Self {
            pool,
            collaborators,
        }
    }

    /// Settle one wash.
    ///
    /// Row locks are taken operator first, then customer, so concurrent
    /// settlements serialize on the rows they share instead of losing updates.
    pub async fn record(
        &self,
        command: RecordWashCommand,
        context: &OperationContext,
    ) -> Result<WashReceipt, AppError> {
        if command.customer_id.is_none() && command.license_plate.is_none() {
            return Err(DomainError::validation("license_plate or customer_id is required").into());
        }
        // Plate is validated before any row is locked
        let plate = match (&command.customer_id, &command.license_plate) {
            (None, Some(raw)) => Some(LicensePlate::parse(raw)?),
            _ => None,
        };

        let settings = &self.collaborators.settings;
        let now = self.collaborators.clock.now();

        let mut tx = self.pool.begin().await?;

        // 1. Operator
        let operator = lock_operator(&mut tx, command.operator_id).await?;
        ensure_active(&operator)?;

        // 2. Customer
        let customer_id = match (command.customer_id, plate) {
            (Some(id), _) => id,
            (None, Some(plate)) => {
                CustomerDirectory::find_or_create(
                    &mut tx,
                    &plate,
                    command.customer_name.as_deref(),
                    command.customer_phone.as_deref(),
                )
                .await?
                .id
            }
            (None, None) => {
                return Err(DomainError::validation("license_plate or customer_id is required").into())
            }
        };
        let customer = CustomerDirectory::lock_by_id(&mut tx, customer_id).await?;

        if command.is_loyalty_free && !customer.free_wash_available {
            return Err(DomainError::validation(format!(
                "customer {} has no free wash available",
                customer.id
            ))
            .into());
        }

        // 3-4. Price and commission
        let original_price = command.original_price.value();
        let price = if command.is_loyalty_free {
            Decimal::ZERO
        } else {
            original_price
        };
        let commission_amount = CommissionCalculator::compute(
            price,
            original_price,
            command.is_loyalty_free,
            operator.commission_rate,
        )?;

        // 5. Transaction row
        let transaction_code = self
            .collaborators
            .codes
            .next_code(settings.business_date(now));

        let transaction = sqlx::query_as::<_, WashTransaction>(
            r#"
            INSERT INTO wash_transactions (
                transaction_code, customer_id, operator_id, price, original_price,
                is_loyalty_free, payment_method, status, notes, created_by,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'completed', $8, $9, $10, $10)
            RETURNING *
            "#,
        )
        .bind(&transaction_code)
        .bind(customer.id)
        .bind(operator.id)
        .bind(price)
        .bind(original_price)
        .bind(command.is_loyalty_free)
        .bind(command.payment_method.as_str())
        .bind(command.notes.as_deref())
        .bind(context.caller_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_code_collision(e, &transaction_code))?;

        // 6. Ledger entry
        let commission = sqlx::query_as::<_, CommissionRecord>(
            r#"
            INSERT INTO commissions (operator_id, transaction_id, amount, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(operator.id)
        .bind(transaction.id)
        .bind(commission_amount)
        .bind(CommissionStatus::Pending.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        // 7. Customer statistics
        let loyalty = settings
            .loyalty
            .settle(customer.loyalty_state(), command.is_loyalty_free)?;

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET loyalty_count = $2,
                free_wash_available = $3,
                total_washes = total_washes + 1,
                total_spent = total_spent + $4,
                last_wash_at = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(customer.id)
        .bind(loyalty.counter)
        .bind(loyalty.free_wash_available)
        .bind(price)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        // 8. Operator statistics; commission accrues here, once
        sqlx::query(
            r#"
            UPDATE operators
            SET total_washes = total_washes + 1,
                total_commission = total_commission + $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(operator.id)
        .bind(commission.amount)
        .execute(&mut *tx)
        .await?;

        let receipt = WashReceipt {
            id: transaction.id,
            transaction_code: transaction.transaction_code.clone(),
            customer_id: customer.id,
            operator_id: operator.id,
            price: transaction.price,
            original_price: transaction.original_price,
            commission_amount: commission.amount,
            is_loyalty_free: transaction.is_loyalty_free,
            payment_method: transaction.payment_method,
            status: transaction.status,
            loyalty_count: customer.loyalty_count,
            free_wash_available: customer.free_wash_available,
            created_at: transaction.created_at,
        };

        audit::append(
            &mut tx,
            AuditLogBuilder::new(AuditAction::WashRecorded)
                .resource("wash_transaction", transaction.id)
                .after_state(&receipt),
            context,
        )
        .await?;

        // 9. Commit
        tx.commit().await?;

        tracing::info!(
            transaction_id = receipt.id,
            transaction_code = %receipt.transaction_code,
            operator_id = receipt.operator_id,
            customer_id = receipt.customer_id,
            price = %receipt.price,
            commission = %receipt.commission_amount,
            loyalty_count = receipt.loyalty_count,
            free_wash = receipt.is_loyalty_free,
            "Wash settled"
        );

        Ok(receipt)
    }

    /// Transaction with its commission
    pub async fn get(&self, transaction_id: i64) -> Result<TransactionDetails, AppError> {
        let transaction =
            sqlx::query_as::<_, WashTransaction>("SELECT * FROM wash_transactions WHERE id = $1")
                .bind(transaction_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DomainError::not_found("transaction", transaction_id))?;

        let commission =
            sqlx::query_as::<_, CommissionRecord>("SELECT * FROM commissions WHERE transaction_id = $1")
                .bind(transaction_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(format!("transaction {transaction_id} has no commission record"))
                })?;

        Ok(TransactionDetails {
            transaction,
            commission,
        })
    }

    /// Edit payment method or notes. Price, parties and commission never change.
    pub async fn update_details(
        &self,
        transaction_id: i64,
        command: UpdateTransactionCommand,
        context: &OperationContext,
    ) -> Result<WashTransaction, AppError> {
        if command.is_empty() {
            return Err(DomainError::validation("nothing to update").into());
        }

        let mut tx = self.pool.begin().await?;

        let transaction = sqlx::query_as::<_, WashTransaction>(
            r#"
            UPDATE wash_transactions
            SET payment_method = COALESCE($2, payment_method),
                notes = COALESCE($3, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(transaction_id)
        .bind(command.payment_method.map(|m| m.as_str()))
        .bind(command.notes.as_deref())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DomainError::not_found("transaction", transaction_id))?;

        audit::append(
            &mut tx,
            AuditLogBuilder::new(AuditAction::WashUpdated)
                .resource("wash_transaction", transaction.id)
                .after_state(&transaction),
            context,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            transaction_id = transaction.id,
            payment_method = %transaction.payment_method,
            "Transaction details updated"
        );

        Ok(transaction)
    }
}

/// A duplicate transaction code is a conflict the caller may retry.
fn map_code_collision(err: sqlx::Error, code: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() && db_err.constraint() == Some(TRANSACTION_CODE_CONSTRAINT) {
            tracing::warn!(transaction_code = %code, "Transaction code collision");
            return DomainError::conflict(format!("transaction code {code} already exists, retry")).into();
        }
    }
    AppError::Database(err)
}

//! Commission Ledger
//!
//! Pending commissions are paid out per operator in one batch. Payout only
//! moves ledger entries from pending to paid; the operator's accrued
//! `total_commission` was already credited when each wash was settled.

use chrono::SubsecRound;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::audit::{self, AuditAction, AuditLogBuilder};
use crate::domain::{CommissionRecord, CommissionStatus, DomainError, OperationContext};
use crate::error::AppError;

use super::{lock_operator, Collaborators, PayoutCommand, PayoutResult, PendingSummary};

pub struct CommissionLedger {
    pool: PgPool,
    collaborators: Collaborators,
}

impl CommissionLedger {
    pub fn new(pool: PgPool, collaborators: Collaborators) -> Self {
        Self {
            pool,
            collaborators,
        }
    }

    /// Pending entries for an operator, oldest first
    pub async fn list_pending(&self, operator_id: i64) -> Result<Vec<CommissionRecord>, AppError> {
        self.ensure_operator_exists(operator_id).await?;

        let records = sqlx::query_as::<_, CommissionRecord>(
            r#"
            SELECT * FROM commissions
            WHERE operator_id = $1 AND status = $2
            ORDER BY created_at, id
            "#,
        )
        .bind(operator_id)
        .bind(CommissionStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    pub async fn pending_summary(&self, operator_id: i64) -> Result<PendingSummary, AppError> {
        self.ensure_operator_exists(operator_id).await?;

        let (pending_count, pending_total): (i64, Decimal) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(amount), 0)
            FROM commissions
            WHERE operator_id = $1 AND status = $2
            "#,
        )
        .bind(operator_id)
        .bind(CommissionStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(PendingSummary {
            operator_id,
            pending_count,
            pending_total,
        })
    }

    /// Pay every pending commission of one operator.
    ///
    /// All selected entries share one `paid_at` and one payout receipt. With
    /// nothing pending the call fails instead of paying zero.
    pub async fn payout(
        &self,
        command: PayoutCommand,
        context: &OperationContext,
    ) -> Result<PayoutResult, AppError> {
        // Postgres keeps microseconds
        let paid_at = self.collaborators.clock.now().trunc_subsecs(6);

        let mut tx = self.pool.begin().await?;

        // Serializes concurrent payouts and settlements for this operator
        let operator = lock_operator(&mut tx, command.operator_id).await?;

        let settled: Vec<(i64, Decimal)> = sqlx::query_as(
            r#"
            UPDATE commissions
            SET status = 'paid', paid_by = $2, paid_at = $3
            WHERE operator_id = $1 AND status = 'pending'
            RETURNING id, amount
            "#,
        )
        .bind(operator.id)
        .bind(command.paid_by)
        .bind(paid_at)
        .fetch_all(&mut *tx)
        .await?;

        if settled.is_empty() {
            return Err(DomainError::conflict(format!(
                "operator {} has no pending commissions",
                operator.id
            ))
            .into());
        }

        let ids: Vec<i64> = settled.iter().map(|(id, _)| *id).collect();
        let total_amount: Decimal = settled.iter().map(|(_, amount)| *amount).sum();
        let commissions_paid = settled.len() as i64;

        let payout_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO commission_payouts (
                operator_id, total_amount, commission_count, paid_by, notes, paid_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(operator.id)
        .bind(total_amount)
        .bind(settled.len() as i32)
        .bind(command.paid_by)
        .bind(command.notes.as_deref())
        .bind(paid_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE commissions SET payout_id = $1 WHERE id = ANY($2)")
            .bind(payout_id)
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        let result = PayoutResult {
            payout_id,
            operator_id: operator.id,
            total_amount,
            commissions_paid,
            paid_at,
        };

        audit::append(
            &mut tx,
            AuditLogBuilder::new(AuditAction::CommissionPaidOut)
                .resource("commission_payout", payout_id)
                .after_state(&result),
            context,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            payout_id,
            operator_id = operator.id,
            total_amount = %total_amount,
            commissions_paid,
            paid_by = command.paid_by,
            "Commissions paid out"
        );

        Ok(result)
    }

    async fn ensure_operator_exists(&self, operator_id: i64) -> Result<(), AppError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM operators WHERE id = $1)")
            .bind(operator_id)
            .fetch_one(&self.pool)
            .await?;

        if exists {
            Ok(())
        } else {
            Err(DomainError::not_found("operator", operator_id).into())
        }
    }
}

//! Attendance Tracker
//!
//! Daily check-in/check-out per operator. The day and the late cutoff are
//! evaluated in the shop's local time.

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use crate::audit::{self, AuditAction, AuditLogBuilder};
use crate::domain::attendance::{
    classify_check_in, ensure_can_check_in, ensure_can_check_out, ensure_can_mark_leave,
};
use crate::domain::{AttendanceRecord, AttendanceStatus, DomainError, OperationContext};
use crate::error::AppError;

use super::{
    ensure_active, lock_operator, non_blank, CheckInCommand, CheckOutCommand, Collaborators,
    MarkLeaveCommand,
};

pub struct AttendanceTracker {
    pool: PgPool,
    collaborators: Collaborators,
}

impl AttendanceTracker {
    pub fn new(pool: PgPool, collaborators: Collaborators) -> Self {
        Self {
            pool,
            collaborators,
        }
    }

    /// Check in for today. Late when after the configured cutoff.
    pub async fn check_in(
        &self,
        command: CheckInCommand,
        context: &OperationContext,
    ) -> Result<AttendanceRecord, AppError> {
        let settings = &self.collaborators.settings;
        let now = self.collaborators.clock.now();
        let work_date = settings.business_date(now);
        let status = classify_check_in(settings.business_time(now), settings.late_cutoff);

        let mut tx = self.pool.begin().await?;

        let operator = lock_operator(&mut tx, command.operator_id).await?;
        ensure_active(&operator)?;

        let existing = lock_day(&mut tx, operator.id, work_date).await?;
        ensure_can_check_in(existing.as_ref())?;

        // A placeholder row (absent, on leave) for the day is taken over
        let record = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            INSERT INTO attendance (operator_id, work_date, check_in, status)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (operator_id, work_date) DO UPDATE
            SET check_in = EXCLUDED.check_in,
                status = EXCLUDED.status,
                updated_at = NOW()
            WHERE attendance.check_in IS NULL
            RETURNING *
            "#,
        )
        .bind(operator.id)
        .bind(work_date)
        .bind(now)
        .bind(status.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| already_checked_in(operator.id, work_date))?;

        audit::append(
            &mut tx,
            AuditLogBuilder::new(AuditAction::AttendanceCheckIn)
                .resource("attendance", record.id)
                .after_state(&record),
            context,
        )
        .await?;

        tx.commit().await?;

        if record.status == AttendanceStatus::Late {
            tracing::warn!(operator_id = operator.id, %work_date, "Late check-in");
        } else {
            tracing::info!(operator_id = operator.id, %work_date, "Checked in");
        }

        Ok(record)
    }

    pub async fn check_out(
        &self,
        command: CheckOutCommand,
        context: &OperationContext,
    ) -> Result<AttendanceRecord, AppError> {
        let now = self.collaborators.clock.now();
        let work_date = self.collaborators.settings.business_date(now);

        let mut tx = self.pool.begin().await?;

        let operator = lock_operator(&mut tx, command.operator_id).await?;
        let existing = lock_day(&mut tx, operator.id, work_date).await?;
        ensure_can_check_out(existing.as_ref())?;

        let record = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            UPDATE attendance
            SET check_out = $3, updated_at = NOW()
            WHERE operator_id = $1 AND work_date = $2
            RETURNING *
            "#,
        )
        .bind(operator.id)
        .bind(work_date)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        audit::append(
            &mut tx,
            AuditLogBuilder::new(AuditAction::AttendanceCheckOut)
                .resource("attendance", record.id)
                .after_state(&record),
            context,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(operator_id = operator.id, %work_date, "Checked out");

        Ok(record)
    }

    /// Today's record, if any
    pub async fn today(&self, operator_id: i64) -> Result<Option<AttendanceRecord>, AppError> {
        let work_date = self
            .collaborators
            .settings
            .business_date(self.collaborators.clock.now());

        let record = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT * FROM attendance WHERE operator_id = $1 AND work_date = $2",
        )
        .bind(operator_id)
        .bind(work_date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Mark a day as leave; only before the operator has checked in.
    pub async fn mark_leave(
        &self,
        command: MarkLeaveCommand,
        context: &OperationContext,
    ) -> Result<AttendanceRecord, AppError> {
        let mut tx = self.pool.begin().await?;

        let operator = lock_operator(&mut tx, command.operator_id).await?;
        let existing = lock_day(&mut tx, operator.id, command.work_date).await?;
        ensure_can_mark_leave(existing.as_ref())?;

        let record = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            INSERT INTO attendance (operator_id, work_date, status, notes)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (operator_id, work_date) DO UPDATE
            SET status = EXCLUDED.status,
                notes = COALESCE(EXCLUDED.notes, attendance.notes),
                updated_at = NOW()
            WHERE attendance.check_in IS NULL
            RETURNING *
            "#,
        )
        .bind(operator.id)
        .bind(command.work_date)
        .bind(AttendanceStatus::OnLeave.as_str())
        .bind(non_blank(command.notes.as_deref()))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| already_checked_in(operator.id, command.work_date))?;

        audit::append(
            &mut tx,
            AuditLogBuilder::new(AuditAction::AttendanceLeave)
                .resource("attendance", record.id)
                .after_state(&record),
            context,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(operator_id = operator.id, work_date = %command.work_date, "Leave recorded");

        Ok(record)
    }
}

async fn lock_day(
    conn: &mut PgConnection,
    operator_id: i64,
    work_date: NaiveDate,
) -> Result<Option<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(
        "SELECT * FROM attendance WHERE operator_id = $1 AND work_date = $2 FOR UPDATE",
    )
    .bind(operator_id)
    .bind(work_date)
    .fetch_optional(conn)
    .await
}

fn already_checked_in(operator_id: i64, work_date: NaiveDate) -> DomainError {
    DomainError::conflict(format!(
        "operator {operator_id} already checked in on {work_date}"
    ))
}

//! Audit Log
//!
//! Append-only record of every state change. Entries are written on the
//! caller's connection so they commit or roll back with the change itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::OperationContext;

/// Audit log entry for database storage
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub caller_id: Option<i64>,
    pub caller_role: Option<String>,
    pub api_key_id: Option<Uuid>,
    pub correlation_id: Option<Uuid>,
    pub client_ip: Option<String>,
    pub after_state: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Audit action types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    WashRecorded,
    WashUpdated,
    CommissionPaidOut,
    CustomerRegistered,
    AttendanceCheckIn,
    AttendanceCheckOut,
    AttendanceLeave,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::WashRecorded => "wash.recorded",
            AuditAction::WashUpdated => "wash.updated",
            AuditAction::CommissionPaidOut => "commission.paid_out",
            AuditAction::CustomerRegistered => "customer.registered",
            AuditAction::AttendanceCheckIn => "attendance.check_in",
            AuditAction::AttendanceCheckOut => "attendance.check_out",
            AuditAction::AttendanceLeave => "attendance.leave",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Builder for creating audit log entries
#[derive(Debug, Clone)]
pub struct AuditLogBuilder {
    action: AuditAction,
    resource_type: Option<&'static str>,
    resource_id: Option<String>,
    after_state: Option<serde_json::Value>,
}

impl AuditLogBuilder {
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            resource_type: None,
            resource_id: None,
            after_state: None,
        }
    }

    /// Set the resource this entry describes
    pub fn resource(mut self, resource_type: &'static str, resource_id: impl ToString) -> Self {
        self.resource_type = Some(resource_type);
        self.resource_id = Some(resource_id.to_string());
        self
    }

    /// Snapshot of the resource after the change.
    ///
    /// A snapshot that fails to serialize is logged and left empty; the entry
    /// itself is still written.
    pub fn after_state<T: Serialize>(mut self, state: &T) -> Self {
        self.after_state = match serde_json::to_value(state) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    action = %self.action,
                    resource_type = ?self.resource_type,
                    resource_id = ?self.resource_id,
                    error = %e,
                    "Audit snapshot could not be serialized"
                );
                None
            }
        };
        self
    }

    pub fn action(&self) -> AuditAction {
        self.action
    }
}

/// Write an audit entry on an open connection, usually a transaction.
pub async fn append(
    conn: &mut PgConnection,
    builder: AuditLogBuilder,
    context: &OperationContext,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO audit_logs (
            id, action, resource_type, resource_id,
            caller_id, caller_role, api_key_id, correlation_id,
            client_ip, after_state
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(id)
    .bind(builder.action.as_str())
    .bind(builder.resource_type)
    .bind(&builder.resource_id)
    .bind(context.caller_id)
    .bind(context.caller_role.map(|role| role.as_str()))
    .bind(context.api_key_id)
    .bind(context.correlation_id)
    .bind(context.client_ip.map(|ip| ip.to_string()))
    .bind(&builder.after_state)
    .execute(conn)
    .await?;

    tracing::debug!(
        audit_id = %id,
        action = %builder.action,
        resource_id = ?builder.resource_id,
        "Audit log entry created"
    );

    Ok(id)
}

/// Read side of the audit log
#[derive(Debug, Clone)]
pub struct AuditLogService {
    pool: PgPool,
}

impl AuditLogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Newest entries for one resource
    pub async fn recent_for_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
        sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT id, action, resource_type, resource_id, caller_id, caller_role,
                   api_key_id, correlation_id, client_ip, after_state, created_at
            FROM audit_logs
            WHERE resource_type = $1 AND resource_id = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(resource_type)
        .bind(resource_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}

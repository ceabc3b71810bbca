//! Command Handlers module
//!
//! One handler per settlement concern. Each owns a pool and the injected
//! collaborators, and runs every write inside a single database transaction.

mod attendance_tracker;
mod commands;
mod commission_ledger;
mod customer_directory;
mod transaction_recorder;


use sqlx::PgConnection;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::domain::{CodeGenerator, DomainError, Operator, RandomCodeGenerator, SettlementSettings};
use crate::error::AppError;

pub use attendance_tracker::AttendanceTracker;
pub use commands::*;
pub use commission_ledger::CommissionLedger;
pub use customer_directory::CustomerDirectory;
pub use transaction_recorder::TransactionRecorder;

/// Everything a handler consumes besides the database
#[derive(Clone)]
pub struct Collaborators {
    pub settings: SettlementSettings,
    pub clock: Arc<dyn Clock>,
    pub codes: Arc<dyn CodeGenerator>,
}

impl Collaborators {
    pub fn new(settings: SettlementSettings) -> Self {
        Self {
            settings,
            clock: Arc::new(SystemClock),
            codes: Arc::new(RandomCodeGenerator),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_codes(mut self, codes: Arc<dyn CodeGenerator>) -> Self {
        self.codes = codes;
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::new(SettlementSettings::default())
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Lock an operator row for the rest of the transaction.
///
/// Operator rows are always locked before customer rows.
pub(crate) async fn lock_operator(
    conn: &mut PgConnection,
    operator_id: i64,
) -> Result<Operator, AppError> {
    let operator = sqlx::query_as::<_, Operator>("SELECT * FROM operators WHERE id = $1 FOR UPDATE")
        .bind(operator_id)
        .fetch_optional(conn)
        .await?;

    operator.ok_or_else(|| DomainError::not_found("operator", operator_id).into())
}

pub(crate) fn ensure_active(operator: &Operator) -> Result<(), DomainError> {
    if operator.is_active {
        Ok(())
    } else {
        Err(DomainError::conflict(format!(
            "operator {} is not active",
            operator.id
        )))
    }
}

/// Trim and drop blank optional text
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

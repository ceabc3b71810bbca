//! API Routes
//!
//! HTTP endpoint definitions. Each endpoint authorizes its operation, builds
//! the handler for the request and returns the handler's result as JSON.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::domain::{
    AttendanceRecord, CommissionRecord, Customer, DomainError, OperationContext, WashTransaction,
};
use crate::error::AppError;
use crate::handlers::{
    AttendanceTracker, CheckInCommand, CheckOutCommand, Collaborators, CommissionLedger,
    CustomerDirectory, MarkLeaveCommand, PayoutCommand, PayoutResult, PendingSummary,
    RecordWashCommand, RegisterCustomerCommand, TransactionDetails, TransactionRecorder,
    UpdateTransactionCommand, WashReceipt,
};

use super::middleware::AuthenticatedCaller;
use super::operations::Operation;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct PayoutRequest {
    pub operator_id: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub operator_id: i64,
}

#[derive(Debug, Serialize)]
pub struct PendingCommissionsResponse {
    pub operator_id: i64,
    pub pending_count: i64,
    pub pending_total: Decimal,
    pub commissions: Vec<CommissionRecord>,
}

// =========================================================================
// API Router
// =========================================================================

/// Routes under /api/v1
pub fn create_router() -> Router<PgPool> {
    Router::new()
        .route("/transactions", post(record_wash))
        .route(
            "/transactions/:transaction_id",
            get(get_transaction).patch(update_transaction),
        )
        .route("/customers", post(register_customer))
        .route("/customers/:customer_id", get(get_customer))
        .route("/customers/plate/:plate", get(get_customer_by_plate))
        .route(
            "/operators/:operator_id/commissions/pending",
            get(list_pending_commissions),
        )
        .route("/commissions/payout", post(payout))
        .route("/attendance/check-in", post(check_in))
        .route("/attendance/check-out", post(check_out))
        .route("/attendance/leave", post(mark_leave))
}

// =========================================================================
// Transactions
// =========================================================================

async fn record_wash(
    State(pool): State<PgPool>,
    Extension(collaborators): Extension<Collaborators>,
    Extension(caller): Extension<AuthenticatedCaller>,
    Extension(context): Extension<OperationContext>,
    Json(command): Json<RecordWashCommand>,
) -> Result<(StatusCode, Json<WashReceipt>), AppError> {
    caller.authorize(Operation::RecordWash)?;

    let receipt = TransactionRecorder::new(pool, collaborators)
        .record(command, &context)
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn get_transaction(
    State(pool): State<PgPool>,
    Extension(collaborators): Extension<Collaborators>,
    Extension(caller): Extension<AuthenticatedCaller>,
    Path(transaction_id): Path<i64>,
) -> Result<Json<TransactionDetails>, AppError> {
    caller.authorize(Operation::GetTransaction)?;

    let details = TransactionRecorder::new(pool, collaborators)
        .get(transaction_id)
        .await?;

    Ok(Json(details))
}

async fn update_transaction(
    State(pool): State<PgPool>,
    Extension(collaborators): Extension<Collaborators>,
    Extension(caller): Extension<AuthenticatedCaller>,
    Extension(context): Extension<OperationContext>,
    Path(transaction_id): Path<i64>,
    Json(command): Json<UpdateTransactionCommand>,
) -> Result<Json<WashTransaction>, AppError> {
    caller.authorize(Operation::UpdateTransaction)?;

    let transaction = TransactionRecorder::new(pool, collaborators)
        .update_details(transaction_id, command, &context)
        .await?;

    Ok(Json(transaction))
}

// =========================================================================
// Customers
// =========================================================================

async fn register_customer(
    State(pool): State<PgPool>,
    Extension(caller): Extension<AuthenticatedCaller>,
    Extension(context): Extension<OperationContext>,
    Json(command): Json<RegisterCustomerCommand>,
) -> Result<(StatusCode, Json<Customer>), AppError> {
    caller.authorize(Operation::RegisterCustomer)?;

    let customer = CustomerDirectory::new(pool).register(command, &context).await?;

    Ok((StatusCode::CREATED, Json(customer)))
}

async fn get_customer(
    State(pool): State<PgPool>,
    Extension(caller): Extension<AuthenticatedCaller>,
    Path(customer_id): Path<i64>,
) -> Result<Json<Customer>, AppError> {
    caller.authorize(Operation::GetCustomer)?;

    let customer = CustomerDirectory::new(pool).resolve_by_id(customer_id).await?;

    Ok(Json(customer))
}

async fn get_customer_by_plate(
    State(pool): State<PgPool>,
    Extension(caller): Extension<AuthenticatedCaller>,
    Path(plate): Path<String>,
) -> Result<Json<Customer>, AppError> {
    caller.authorize(Operation::GetCustomer)?;

    let customer = CustomerDirectory::new(pool)
        .find_by_plate(&plate)
        .await?
        .ok_or_else(|| DomainError::not_found("customer", &plate))?;

    Ok(Json(customer))
}

// =========================================================================
// Commissions
// =========================================================================

async fn list_pending_commissions(
    State(pool): State<PgPool>,
    Extension(collaborators): Extension<Collaborators>,
    Extension(caller): Extension<AuthenticatedCaller>,
    Path(operator_id): Path<i64>,
) -> Result<Json<PendingCommissionsResponse>, AppError> {
    caller.authorize_for_operator(Operation::ListPendingCommissions, operator_id)?;

    // Count and total come from the same read as the list
    let commissions = CommissionLedger::new(pool, collaborators)
        .list_pending(operator_id)
        .await?;
    let summary = PendingSummary::from_records(operator_id, &commissions);

    Ok(Json(PendingCommissionsResponse {
        operator_id,
        pending_count: summary.pending_count,
        pending_total: summary.pending_total,
        commissions,
    }))
}

async fn payout(
    State(pool): State<PgPool>,
    Extension(collaborators): Extension<Collaborators>,
    Extension(caller): Extension<AuthenticatedCaller>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<PayoutRequest>,
) -> Result<Json<PayoutResult>, AppError> {
    caller.authorize(Operation::PayCommissions)?;

    let mut command = PayoutCommand::new(request.operator_id, caller.user_id);
    command.notes = request.notes;

    let result = CommissionLedger::new(pool, collaborators)
        .payout(command, &context)
        .await?;

    Ok(Json(result))
}

// =========================================================================
// Attendance
// =========================================================================

async fn check_in(
    State(pool): State<PgPool>,
    Extension(collaborators): Extension<Collaborators>,
    Extension(caller): Extension<AuthenticatedCaller>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<AttendanceRequest>,
) -> Result<Json<AttendanceRecord>, AppError> {
    caller.authorize_for_operator(Operation::CheckIn, request.operator_id)?;

    let record = AttendanceTracker::new(pool, collaborators)
        .check_in(
            CheckInCommand {
                operator_id: request.operator_id,
            },
            &context,
        )
        .await?;

    Ok(Json(record))
}

async fn check_out(
    State(pool): State<PgPool>,
    Extension(collaborators): Extension<Collaborators>,
    Extension(caller): Extension<AuthenticatedCaller>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<AttendanceRequest>,
) -> Result<Json<AttendanceRecord>, AppError> {
    caller.authorize_for_operator(Operation::CheckOut, request.operator_id)?;

    let record = AttendanceTracker::new(pool, collaborators)
        .check_out(
            CheckOutCommand {
                operator_id: request.operator_id,
            },
            &context,
        )
        .await?;

    Ok(Json(record))
}

async fn mark_leave(
    State(pool): State<PgPool>,
    Extension(collaborators): Extension<Collaborators>,
    Extension(caller): Extension<AuthenticatedCaller>,
    Extension(context): Extension<OperationContext>,
    Json(command): Json<MarkLeaveCommand>,
) -> Result<Json<AttendanceRecord>, AppError> {
    caller.authorize(Operation::MarkLeave)?;

    let record = AttendanceTracker::new(pool, collaborators)
        .mark_leave(command, &context)
        .await?;

    Ok(Json(record))
}

//! Command definitions
//!
//! Commands represent intentions to change the system state; results are what
//! the handlers hand back after the change has committed.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    CommissionRecord, PaymentMethod, Price, TransactionStatus, WashTransaction,
};

// =========================================================================
// RecordWashCommand
// =========================================================================

/// A completed wash to settle.
///
/// The customer is identified either by `customer_id` or by `license_plate`;
/// an unknown plate needs `customer_name` to create the walk-in record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordWashCommand {
    pub operator_id: i64,
    #[serde(default)]
    pub license_plate: Option<String>,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    pub original_price: Price,
    #[serde(default)]
    pub is_loyalty_free: bool,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RecordWashCommand {
    pub fn for_plate(
        operator_id: i64,
        license_plate: impl Into<String>,
        original_price: Price,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            operator_id,
            license_plate: Some(license_plate.into()),
            customer_id: None,
            customer_name: None,
            customer_phone: None,
            original_price,
            is_loyalty_free: false,
            payment_method,
            notes: None,
        }
    }

    pub fn for_customer(
        operator_id: i64,
        customer_id: i64,
        original_price: Price,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            operator_id,
            license_plate: None,
            customer_id: Some(customer_id),
            customer_name: None,
            customer_phone: None,
            original_price,
            is_loyalty_free: false,
            payment_method,
            notes: None,
        }
    }

    pub fn with_customer_name(mut self, name: impl Into<String>) -> Self {
        self.customer_name = Some(name.into());
        self
    }

    pub fn with_customer_phone(mut self, phone: impl Into<String>) -> Self {
        self.customer_phone = Some(phone.into());
        self
    }

    /// Redeem the customer's free wash
    pub fn free_wash(mut self) -> Self {
        self.is_loyalty_free = true;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Result of a settled wash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WashReceipt {
    pub id: i64,
    pub transaction_code: String,
    pub customer_id: i64,
    pub operator_id: i64,
    pub price: Decimal,
    pub original_price: Decimal,
    pub commission_amount: Decimal,
    pub is_loyalty_free: bool,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    /// Customer's loyalty counter after this wash
    pub loyalty_count: i32,
    pub free_wash_available: bool,
    pub created_at: DateTime<Utc>,
}

/// A transaction with its ledger entry
#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetails {
    pub transaction: WashTransaction,
    pub commission: CommissionRecord,
}

// =========================================================================
// UpdateTransactionCommand
// =========================================================================

/// Administrative edit; price, parties and commission are fixed at settlement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTransactionCommand {
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl UpdateTransactionCommand {
    pub fn is_empty(&self) -> bool {
        self.payment_method.is_none() && self.notes.is_none()
    }
}

// =========================================================================
// RegisterCustomerCommand
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCustomerCommand {
    pub license_plate: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl RegisterCustomerCommand {
    pub fn new(license_plate: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            license_plate: license_plate.into(),
            name: name.into(),
            phone: None,
            email: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

// =========================================================================
// PayoutCommand
// =========================================================================

/// Pay every pending commission of one operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutCommand {
    pub operator_id: i64,
    /// User settling the payout
    pub paid_by: i64,
    pub notes: Option<String>,
}

impl PayoutCommand {
    pub fn new(operator_id: i64, paid_by: i64) -> Self {
        Self {
            operator_id,
            paid_by,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Result of a successful payout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutResult {
    pub payout_id: i64,
    pub operator_id: i64,
    pub total_amount: Decimal,
    pub commissions_paid: i64,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSummary {
    pub operator_id: i64,
    pub pending_count: i64,
    pub pending_total: Decimal,
}

impl PendingSummary {
    /// Count and total of an already fetched pending list
    pub fn from_records(operator_id: i64, records: &[CommissionRecord]) -> Self {
        Self {
            operator_id,
            pending_count: records.len() as i64,
            pending_total: records.iter().map(|r| r.amount).sum(),
        }
    }
}

// =========================================================================
// Attendance commands
// =========================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CheckInCommand {
    pub operator_id: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CheckOutCommand {
    pub operator_id: i64,
}

/// Mark a day the operator will not work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkLeaveCommand {
    pub operator_id: i64,
    pub work_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

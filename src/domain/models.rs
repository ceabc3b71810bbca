//! Persistent entities
//!
//! Row shapes for the settlement tables. Status columns are stored as text
//! and converted through `TryFrom<String>` when rows are decoded.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::loyalty::LoyaltyState;
use super::DomainError;

/// Declares a text-backed status enum with `as_str`, `Display`, `FromStr`
/// and `TryFrom<String>`.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(DomainError::validation(format!(
                        concat!("unknown ", $label, ": {}"),
                        other
                    ))),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

text_enum!(
    /// How the customer paid
    PaymentMethod, "payment method" {
        Cash => "cash",
        Transfer => "transfer",
        Qris => "qris",
        Ewallet => "ewallet",
    }
);

text_enum!(
    TransactionStatus, "transaction status" {
        Completed => "completed",
        Cancelled => "cancelled",
    }
);

text_enum!(
    /// Ledger state; only ever moves pending -> paid
    CommissionStatus, "commission status" {
        Pending => "pending",
        Paid => "paid",
    }
);

text_enum!(
    AttendanceStatus, "attendance status" {
        Present => "present",
        Late => "late",
        Absent => "absent",
        OnLeave => "on_leave",
    }
);

/// Customer (member or walk-in)
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Customer {
    pub id: i64,
    pub license_plate: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub is_member: bool,
    pub loyalty_count: i32,
    pub free_wash_available: bool,
    pub total_washes: i32,
    pub total_spent: Decimal,
    pub last_wash_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn loyalty_state(&self) -> LoyaltyState {
        LoyaltyState {
            counter: self.loyalty_count,
            free_wash_available: self.free_wash_available,
        }
    }
}

/// Wash operator
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Operator {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    /// Percent, 0..=100
    pub commission_rate: Decimal,
    pub total_commission: Decimal,
    pub total_washes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A completed (or later cancelled) wash
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct WashTransaction {
    pub id: i64,
    pub transaction_code: String,
    pub customer_id: i64,
    pub operator_id: i64,
    /// Amount charged; zero for a loyalty free wash
    pub price: Decimal,
    pub original_price: Decimal,
    pub is_loyalty_free: bool,
    #[sqlx(try_from = "String")]
    pub payment_method: PaymentMethod,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One commission ledger entry, exactly one per transaction
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CommissionRecord {
    pub id: i64,
    pub operator_id: i64,
    pub transaction_id: i64,
    pub amount: Decimal,
    #[sqlx(try_from = "String")]
    pub status: CommissionStatus,
    pub paid_by: Option<i64>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payout_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Operator attendance for one business day
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: i64,
    pub operator_id: i64,
    pub work_date: NaiveDate,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

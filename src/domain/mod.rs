//! Domain module
//!
//! Settlement rules and value types. Nothing here touches the database.

pub mod attendance;
pub mod code;
pub mod commission;
pub mod context;
pub mod error;
pub mod loyalty;
pub mod models;
pub mod money;
pub mod plate;
pub mod settings;

pub use code::{CodeGenerator, RandomCodeGenerator};
pub use commission::CommissionCalculator;
pub use context::{OperationContext, Role};
pub use error::DomainError;
pub use loyalty::{LoyaltyAdvance, LoyaltyState, LoyaltyTracker, DEFAULT_FREE_WASH_THRESHOLD};
pub use models::{
    AttendanceRecord, AttendanceStatus, CommissionRecord, CommissionStatus, Customer, Operator,
    PaymentMethod, TransactionStatus, WashTransaction,
};
pub use money::{round_to_currency, MoneyError, Price, CURRENCY_DECIMALS};
pub use plate::LicensePlate;
pub use settings::SettlementSettings;

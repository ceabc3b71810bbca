//! motowash Library
//!
//! Settlement engine for a motorcycle-wash point of sale: customers, wash
//! transactions, operator commissions, loyalty and attendance.

pub mod api;
pub mod audit;
pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod rate_limit;

pub use config::Config;
pub use domain::{DomainError, OperationContext, Price, SettlementSettings};
pub use error::{AppError, AppResult, ErrorKind};

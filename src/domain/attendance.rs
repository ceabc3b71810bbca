//! Attendance rules
//!
//! One record per operator per business day, moving
//! `no record -> checked in -> checked out`. A placeholder row (absent or
//! on leave) without a check-in still accepts the day's check-in.

use chrono::NaiveTime;

use super::models::{AttendanceRecord, AttendanceStatus};
use super::DomainError;

/// Status for a check-in at local time `at`. Arriving exactly at the cutoff is on time.
pub fn classify_check_in(at: NaiveTime, late_cutoff: NaiveTime) -> AttendanceStatus {
    if at > late_cutoff {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

pub fn ensure_can_check_in(existing: Option<&AttendanceRecord>) -> Result<(), DomainError> {
    match existing {
        Some(record) if record.check_in.is_some() => Err(DomainError::conflict(format!(
            "operator {} already checked in on {}",
            record.operator_id, record.work_date
        ))),
        _ => Ok(()),
    }
}

pub fn ensure_can_check_out(existing: Option<&AttendanceRecord>) -> Result<(), DomainError> {
    match existing {
        None => Err(DomainError::validation("no check-in recorded today")),
        Some(record) if record.check_in.is_none() => Err(DomainError::validation(format!(
            "no check-in recorded on {}",
            record.work_date
        ))),
        Some(record) if record.check_out.is_some() => Err(DomainError::conflict(format!(
            "operator {} already checked out on {}",
            record.operator_id, record.work_date
        ))),
        Some(_) => Ok(()),
    }
}

/// Leave can only replace a day the operator has not worked.
pub fn ensure_can_mark_leave(existing: Option<&AttendanceRecord>) -> Result<(), DomainError> {
    match existing {
        Some(record) if record.check_in.is_some() => Err(DomainError::conflict(format!(
            "operator {} already checked in on {}",
            record.operator_id, record.work_date
        ))),
        _ => Ok(()),
    }
}

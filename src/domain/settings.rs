//! Settlement settings
//!
//! Business-level knobs shared by the handlers: loyalty threshold, late
//! check-in cutoff, and the shop's local time zone.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};

use super::loyalty::LoyaltyTracker;

/// Default late cutoff (08:15 local)
pub const DEFAULT_LATE_CUTOFF: (u32, u32) = (8, 15);

/// Default business offset: WIB, UTC+7
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementSettings {
    pub loyalty: LoyaltyTracker,
    pub late_cutoff: NaiveTime,
    pub business_offset: FixedOffset,
}

impl SettlementSettings {
    pub fn new(loyalty: LoyaltyTracker, late_cutoff: NaiveTime, business_offset: FixedOffset) -> Self {
        Self {
            loyalty,
            late_cutoff,
            business_offset,
        }
    }

    /// Calendar day at the shop for an instant
    pub fn business_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.business_offset).date_naive()
    }

    /// Wall-clock time at the shop for an instant
    pub fn business_time(&self, at: DateTime<Utc>) -> NaiveTime {
        at.with_timezone(&self.business_offset).time()
    }
}

impl Default for SettlementSettings {
    fn default() -> Self {
        let (hour, minute) = DEFAULT_LATE_CUTOFF;
        Self {
            loyalty: LoyaltyTracker::default(),
            late_cutoff: NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN),
            business_offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_HOURS * 3600)
                .unwrap_or_else(|| Utc.fix()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults() {
        let settings = SettlementSettings::default();
        assert_eq!(settings.loyalty.threshold(), 5);
        assert_eq!(settings.late_cutoff, NaiveTime::from_hms_opt(8, 15, 0).unwrap());
        assert_eq!(settings.business_offset.local_minus_utc(), 7 * 3600);
    }

    #[test]
    fn test_business_date_rolls_over_before_utc() {
        let settings = SettlementSettings::default();
        // 2026-03-01 18:30 UTC is 2026-03-02 01:30 WIB
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 18, 30, 0).unwrap();

        assert_eq!(settings.business_date(at), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(settings.business_time(at), NaiveTime::from_hms_opt(1, 30, 0).unwrap());
    }
}

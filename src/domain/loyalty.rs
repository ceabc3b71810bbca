//! Loyalty counter
//!
//! Every completed wash advances the customer's counter by one, free washes
//! included. Reaching a positive multiple of the threshold earns one free
//! wash, which stays available until a free wash is recorded.

use serde::{Deserialize, Serialize};

use super::DomainError;

/// Washes needed per earned free wash
pub const DEFAULT_FREE_WASH_THRESHOLD: i32 = 5;

/// Result of advancing the counter by one wash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoyaltyAdvance {
    pub new_count: i32,
    pub free_wash_eligible: bool,
}

/// Loyalty fields of a customer row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyState {
    pub counter: i32,
    pub free_wash_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoyaltyTracker {
    threshold: i32,
}

impl LoyaltyTracker {
    pub fn new(threshold: i32) -> Result<Self, DomainError> {
        if threshold <= 0 {
            return Err(DomainError::validation(format!(
                "loyalty threshold must be positive (got {threshold})"
            )));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    pub fn advance(&self, current_count: i32) -> Result<LoyaltyAdvance, DomainError> {
        let new_count = current_count.checked_add(1).ok_or_else(|| {
            DomainError::validation(format!("loyalty counter cannot advance past {current_count}"))
        })?;
        Ok(LoyaltyAdvance {
            new_count,
            free_wash_eligible: new_count > 0 && new_count % self.threshold == 0,
        })
    }

    pub fn consume_free_wash(&self, state: &mut LoyaltyState) {
        state.free_wash_available = false;
    }

    /// Loyalty state after one completed wash.
    ///
    /// A redeemed free wash clears the flag and never re-arms it in the same
    /// settlement, even when the new count lands on a threshold multiple.
    pub fn settle(
        &self,
        state: LoyaltyState,
        is_free_wash: bool,
    ) -> Result<LoyaltyState, DomainError> {
        let advance = self.advance(state.counter)?;

        let mut next = state;
        if is_free_wash {
            self.consume_free_wash(&mut next);
        }

        next.counter = advance.new_count;
        if advance.free_wash_eligible && !is_free_wash {
            next.free_wash_available = true;
        }
        Ok(next)
    }
}

impl Default for LoyaltyTracker {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_FREE_WASH_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_triggers_on_exact_multiples() {
        let tracker = LoyaltyTracker::default();

        assert_eq!(
            tracker.advance(4).unwrap(),
            LoyaltyAdvance { new_count: 5, free_wash_eligible: true }
        );
        assert_eq!(
            tracker.advance(5).unwrap(),
            LoyaltyAdvance { new_count: 6, free_wash_eligible: false }
        );
        assert_eq!(
            tracker.advance(9).unwrap(),
            LoyaltyAdvance { new_count: 10, free_wash_eligible: true }
        );
        assert!(!tracker.advance(0).unwrap().free_wash_eligible);
    }

    #[test]
    fn test_custom_threshold() {
        let tracker = LoyaltyTracker::new(3).unwrap();
        assert!(tracker.advance(2).unwrap().free_wash_eligible);
        assert!(!tracker.advance(3).unwrap().free_wash_eligible);
        assert!(LoyaltyTracker::new(0).is_err());
    }

    #[test]
    fn test_paid_wash_earns_free_wash() {
        let tracker = LoyaltyTracker::default();
        let next = tracker.settle(LoyaltyState { counter: 4, free_wash_available: false }, false).unwrap();

        assert_eq!(next, LoyaltyState { counter: 5, free_wash_available: true });
    }

    #[test]
    fn test_free_wash_consumes_flag() {
        let tracker = LoyaltyTracker::default();
        let next = tracker.settle(LoyaltyState { counter: 5, free_wash_available: true }, true).unwrap();

        assert_eq!(next, LoyaltyState { counter: 6, free_wash_available: false });
    }

    #[test]
    fn test_free_wash_on_threshold_does_not_rearm() {
        let tracker = LoyaltyTracker::default();
        let next = tracker.settle(LoyaltyState { counter: 4, free_wash_available: true }, true).unwrap();

        assert_eq!(next, LoyaltyState { counter: 5, free_wash_available: false });
    }

    #[test]
    fn test_unredeemed_flag_survives_paid_washes() {
        let tracker = LoyaltyTracker::default();
        let next = tracker.settle(LoyaltyState { counter: 6, free_wash_available: true }, false).unwrap();

        assert_eq!(next, LoyaltyState { counter: 7, free_wash_available: true });
    }

    #[test]
    fn test_counter_overflow_is_rejected() {
        let tracker = LoyaltyTracker::default();

        let err = tracker.advance(i32::MAX).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let state = LoyaltyState { counter: i32::MAX, free_wash_available: true };
        assert!(tracker.settle(state, true).is_err());
    }
}

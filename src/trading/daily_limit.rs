//! Daily trade cap keyed on the UTC calendar day.

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Counts trades per UTC day and enforces a maximum.
#[derive(Debug, Clone)]
pub struct DailyTradeCounter {
    max_per_day: u32,
    trades_today: u32,
    day: NaiveDate,
}

impl DailyTradeCounter {
    pub fn new(max_per_day: u32, now: DateTime<Utc>) -> Self {
        Self {
            max_per_day,
            trades_today: 0,
            day: now.date_naive(),
        }
    }

    /// Reset the count if `now` falls on a different UTC day.
    ///
    /// Returns true when a reset happened.
    pub fn roll(&mut self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        if today == self.day {
            return false;
        }
        self.day = today;
        self.trades_today = 0;
        true
    }

    pub fn can_trade(&self) -> bool {
        self.trades_today < self.max_per_day
    }

    pub fn record(&mut self) {
        self.trades_today = self.trades_today.saturating_add(1);
    }

    pub fn trades_today(&self) -> u32 {
        self.trades_today
    }

    pub fn max_per_day(&self) -> u32 {
        self.max_per_day
    }

    pub fn remaining(&self) -> u32 {
        self.max_per_day.saturating_sub(self.trades_today)
    }

    /// The UTC day the count belongs to.
    pub fn day(&self) -> NaiveDate {
        self.day
    }

    /// Next UTC midnight, when the count resets.
    pub fn next_reset(&self) -> DateTime<Utc> {
        (self.day + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap()
    }

    #[test]
    fn test_cap_blocks_after_max() {
        let mut counter = DailyTradeCounter::new(2, at(10, 8, 0));
        assert!(counter.can_trade());
        counter.record();
        assert_eq!(counter.remaining(), 1);
        counter.record();
        assert!(!counter.can_trade());
        assert_eq!(counter.remaining(), 0);

        // same day, later hour: still blocked
        assert!(!counter.roll(at(10, 23, 59)));
        assert!(!counter.can_trade());
    }

    #[test]
    fn test_resets_on_utc_day_change() {
        let mut counter = DailyTradeCounter::new(1, at(10, 23, 0));
        counter.record();
        assert!(!counter.can_trade());

        assert!(counter.roll(at(11, 0, 1)));
        assert_eq!(counter.trades_today(), 0);
        assert!(counter.can_trade());
        assert_eq!(counter.day(), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
    }

    #[test]
    fn test_resets_after_skipped_days() {
        let mut counter = DailyTradeCounter::new(3, at(10, 12, 0));
        counter.record();
        assert!(counter.roll(at(14, 12, 0)));
        assert_eq!(counter.trades_today(), 0);
    }

    #[test]
    fn test_next_reset_is_next_midnight() {
        let counter = DailyTradeCounter::new(1, at(31, 18, 45));
        assert_eq!(
            counter.next_reset(),
            Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
        );
    }
}

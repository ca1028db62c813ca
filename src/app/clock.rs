use crate::app::ports::Clock;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use std::sync::Mutex;

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Calendar date of `clock` in the reference zone
pub fn today_in(clock: &dyn Clock, zone: FixedOffset) -> NaiveDate {
    clock.now().with_timezone(&zone).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn today_follows_the_reference_zone() {
        // 23:30 UTC is already the next day one hour east
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 10, 30, 23, 30, 0).unwrap());
        let cet = FixedOffset::east_opt(3600).unwrap();
        assert_eq!(today_in(&clock, cet), NaiveDate::from_ymd_opt(2025, 10, 31).unwrap());
        assert_eq!(
            today_in(&clock, FixedOffset::east_opt(0).unwrap()),
            NaiveDate::from_ymd_opt(2025, 10, 30).unwrap()
        );
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::hours(25));
        assert_eq!(clock.now(), start + Duration::hours(25));
    }
}

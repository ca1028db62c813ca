use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

/// Daily refresh boundary: a wall-clock time in a fixed reference zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSchedule {
    at: NaiveTime,
    zone: FixedOffset,
}

impl RefreshSchedule {
    pub fn new(at: NaiveTime, zone: FixedOffset) -> Self {
        Self { at, zone }
    }

    pub fn zone(&self) -> FixedOffset {
        self.zone
    }

    /// The boundary instant on `date` (a calendar date in the reference zone)
    pub fn boundary_on(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_time(self.at);
        // a fixed offset has exactly one mapping for every local time
        self.zone
            .from_local_datetime(&local)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&local))
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.zone).date_naive()
    }

    /// True once today's boundary has passed and the last fetch predates it.
    /// Before the boundary the previous day's data keeps being served.
    pub fn needs_refresh(&self, last_fetch: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let boundary = self.boundary_on(self.today(now));
        now >= boundary && last_fetch < boundary
    }
}

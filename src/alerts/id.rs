use crate::constants::ALL_VENUES;
use chrono::NaiveDate;
use std::fmt;

/// Structured form of an alert id, `{date}_{venue or "all"}_{created millis}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertId {
    pub date: NaiveDate,
    pub venue: Option<String>,
    pub created_millis: i64,
}

impl AlertId {
    pub fn new(date: NaiveDate, venue: Option<&str>, created_millis: i64) -> Self {
        Self {
            date,
            venue: venue.map(str::to_string),
            created_millis,
        }
    }

    /// Venue names may themselves contain underscores, so the timestamp is
    /// split off from the right and the date from the left.
    pub fn parse(s: &str) -> Option<Self> {
        let (prefix, millis) = s.rsplit_once('_')?;
        if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let (date, venue) = prefix.split_once('_')?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        let venue = match venue {
            "" | ALL_VENUES => None,
            v => Some(v.to_string()),
        };
        Some(Self {
            date,
            venue,
            created_millis: millis.parse().ok()?,
        })
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.date.format("%Y-%m-%d"),
            self.venue.as_deref().unwrap_or(ALL_VENUES),
            self.created_millis
        )
    }
}

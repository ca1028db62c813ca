//! Read-only views over a feed used by the HTTP surface.

use crate::domain::{FeedData, Party, Venue};
use chrono::NaiveDate;

pub fn parties_on(data: &FeedData, date: NaiveDate) -> Vec<Party> {
    data.parties.iter().filter(|p| p.date == Some(date)).cloned().collect()
}

pub fn active_venues(data: &FeedData) -> Vec<Venue> {
    data.venues.iter().filter(|v| v.is_active).cloned().collect()
}

/// Case-insensitive match on title, description or any tag. A blank
/// query returns everything.
pub fn search(data: &FeedData, query: &str) -> Vec<Party> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return data.parties.clone();
    }
    data.parties
        .iter()
        .filter(|p| {
            p.title.to_lowercase().contains(&needle)
                || p.description.to_lowercase().contains(&needle)
                || p.tags.iter().any(|t| t.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

//! Canonical shapes served to clients and consumed by change detection.
//!
//! Everything here is plain data. Parties are produced wholesale by one
//! transformation pass and never mutated afterwards.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Raw upstream record, as returned by the scraper or document store
pub type RawRecord = serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueCategory {
    pub id: String,
    pub name: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    /// Sequential within one transformation pass; not stable across runs.
    pub id: String,
    /// Canonical, alias-resolved name. This is the venue's identity.
    pub name: String,
    pub description: String,
    pub address: String,
    pub image_url: String,
    pub website: String,
    pub phone: String,
    pub is_active: bool,
    pub category: VenueCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketType {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub is_available: bool,
    pub is_sold_out: bool,
    pub few_left: bool,
    pub is_promotion: bool,
    pub is_vip: bool,
    pub restrictions: String,
    pub purchase_url: String,
}

impl TicketType {
    /// The upstream can flag a ticket both available and sold out; only
    /// the conjunction counts.
    pub fn is_purchasable(&self) -> bool {
        self.is_available && !self.is_sold_out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub id: String,
    pub venue_id: String,
    pub venue_name: String,
    pub title: String,
    pub description: String,
    /// Calendar date; `None` when the upstream record carried none
    pub date: Option<NaiveDate>,
    pub start_time: String,
    pub end_time: String,
    /// Minimum strictly-positive ticket price, `Some(0.0)` when tickets exist
    /// but none is priced, `None` when the party has no ticket types.
    pub price: Option<f64>,
    pub image_url: String,
    pub ticket_url: String,
    pub is_available: bool,
    pub few_left: bool,
    pub capacity: u32,
    pub sold_tickets: u32,
    pub tags: Vec<String>,
    pub venue_address: String,
    pub ticket_types: Vec<TicketType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_minimum: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dress_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// Output of one transformation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedData {
    pub venues: Vec<Venue>,
    pub parties: Vec<Party>,
}

impl FeedData {
    pub fn is_empty(&self) -> bool {
        self.venues.is_empty() && self.parties.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAlert {
    pub id: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_name: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationAlert {
    /// Same date, and the venue filter (if any) is a case-insensitive
    /// substring of the party's venue name.
    pub fn matches(&self, party: &Party) -> bool {
        if party.date != Some(self.date) {
            return false;
        }
        match &self.venue_name {
            None => true,
            Some(filter) => party
                .venue_name
                .to_lowercase()
                .contains(&filter.to_lowercase()),
        }
    }

    pub fn matching<'a>(&self, parties: &'a [Party]) -> Vec<&'a Party> {
        parties.iter().filter(|p| self.matches(p)).collect()
    }
}

/// Lightweight fingerprint kept in an alert's snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFingerprint {
    pub id: String,
    pub date: Option<NaiveDate>,
    pub venue_name: String,
    pub title: String,
}

impl From<&Party> for EventFingerprint {
    fn from(party: &Party) -> Self {
        Self {
            id: party.id.clone(),
            date: party.date,
            venue_name: party.venue_name.clone(),
            title: party.title.clone(),
        }
    }
}

//! Raw upstream records -> canonical venues and parties.

pub mod fields;
pub mod tickets;

use crate::constants::*;
use crate::domain::{FeedData, Party, RawRecord, TicketType, Venue, VenueCategory};
use crate::metrics::MetricName;
use crate::pipeline::processing::normalize::VenueNormalizer;
use chrono::NaiveDate;
use fields::{
    first_array, first_f64, first_object, first_str, first_u32, normalize_time, parse_date,
    string_list,
};
use metrics::{counter, gauge};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const EVENT_WRAPPER_KEYS: &[&str] = &["evento", "event"];
const VENUE_KEYS: &[&str] = &["lugar", "venue", "local"];
const VENUE_NAME_KEYS: &[&str] = &["nombre", "name"];
const TITLE_KEYS: &[&str] = &["nombreEvento", "title", "name", "nombre"];
const DATE_KEYS: &[&str] = &["fecha", "date", "event_day"];
const TICKET_KEYS: &[&str] = &["entradas", "tickets", "ticketTypes"];

/// Why a raw record produced no party
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingVenue,
    MissingDateAndTitle,
}

impl SkipReason {
    fn label(&self) -> &'static str {
        match self {
            SkipReason::MissingVenue => "missing_venue",
            SkipReason::MissingDateAndTitle => "missing_date_and_title",
        }
    }
}

pub struct RecordTransformer {
    normalizer: VenueNormalizer,
}

impl RecordTransformer {
    pub fn new(normalizer: VenueNormalizer) -> Self {
        Self { normalizer }
    }

    /// One transformation pass. Venues come out in first-seen order and
    /// parties in input order. Malformed records are skipped, never raised.
    #[instrument(skip_all, fields(records = raw_records.len()))]
    pub fn transform(&self, raw_records: &[RawRecord]) -> FeedData {
        let mut pass = Pass::default();

        for (i, record) in raw_records.iter().enumerate() {
            match self.transform_record(record, &mut pass) {
                Ok(party) => {
                    pass.parties.push(party);
                    counter!(MetricName::RecordsTransformed.as_str()).increment(1);
                }
                Err(reason) => {
                    debug!("Skipping record {}: {}", i, reason.label());
                    counter!(MetricName::RecordsSkipped.as_str(), "reason" => reason.label()).increment(1);
                }
            }
        }

        gauge!(MetricName::VenuesResolved.as_str()).set(pass.venues.len() as f64);
        info!(
            "Transformed {} records into {} parties at {} venues",
            raw_records.len(),
            pass.parties.len(),
            pass.venues.len()
        );
        FeedData {
            venues: pass.venues,
            parties: pass.parties,
        }
    }

    fn transform_record(&self, record: &Value, pass: &mut Pass) -> std::result::Result<Party, SkipReason> {
        // Records come either wrapped as {evento: {...}} or flat
        let event = first_object(record, EVENT_WRAPPER_KEYS).unwrap_or(record);

        let raw_venue = first_object(event, VENUE_KEYS)
            .or_else(|| first_object(record, VENUE_KEYS))
            .ok_or(SkipReason::MissingVenue)?;
        let venue_name = first_str(raw_venue, VENUE_NAME_KEYS)
            .map(|n| self.normalizer.normalize(&n))
            .filter(|n| !n.is_empty())
            .ok_or(SkipReason::MissingVenue)?;

        // a date that does not parse counts as no date
        let title = first_str(event, TITLE_KEYS);
        let date = first_str(event, DATE_KEYS).as_deref().and_then(parse_date);
        if title.is_none() && date.is_none() {
            return Err(SkipReason::MissingDateAndTitle);
        }
        let title = title.unwrap_or_else(|| DEFAULT_EVENT_TITLE.to_string());

        let venue = pass.resolve_venue(&venue_name, raw_venue).clone();
        let id = party_id(record, event, &venue.name, date, &title);

        let ticket_url = first_str(event, &["url_entradas", "ticketUrl", "purchaseUrl", "url_evento", "url"])
            .unwrap_or_default();
        let ticket_types: Vec<TicketType> = first_array(event, TICKET_KEYS)
            .map(|raw| {
                raw.iter()
                    .filter(|t| t.is_object())
                    .enumerate()
                    .map(|(i, t)| tickets::build_ticket(t, &id, i, &ticket_url))
                    .collect()
            })
            .unwrap_or_default();

        let mut tags = string_list(event, &["tags", "musicGenres", "genres", "styles"]);
        if tags.is_empty() {
            tags.push(DEFAULT_TAG.to_string());
        }

        Ok(Party {
            price: min_price(&ticket_types),
            is_available: is_available(&ticket_types),
            few_left: few_left(&ticket_types),
            venue_id: venue.id.clone(),
            venue_name: venue.name.clone(),
            title,
            description: first_str(event, &["descripcion", "description"]).unwrap_or_default(),
            date,
            start_time: first_str(event, &["hora_inicio", "startTime", "start_time"])
                .map(|t| normalize_time(&t))
                .unwrap_or_default(),
            end_time: first_str(event, &["hora_fin", "endTime", "end_time"])
                .map(|t| normalize_time(&t))
                .unwrap_or_default(),
            image_url: first_str(event, &["imagen_url", "imageUrl", "image"])
                .unwrap_or_else(|| venue.image_url.clone()),
            ticket_url,
            capacity: first_u32(event, &["aforo", "capacity"]).unwrap_or(0),
            sold_tickets: first_u32(event, &["entradas_vendidas", "soldTickets"]).unwrap_or(0),
            tags,
            venue_address: if venue.address.is_empty() {
                first_str(raw_venue, &["direccion_corta", "ciudad", "city"]).unwrap_or_default()
            } else {
                venue.address.clone()
            },
            ticket_types,
            age_minimum: first_u32(event, &["edad_minima", "ageMinimum", "minAge"]),
            dress_code: first_str(event, &["codigo_vestimenta", "dressCode"]),
            latitude: first_f64(raw_venue, &["latitud", "latitude", "lat"]),
            longitude: first_f64(raw_venue, &["longitud", "longitude", "lng"]),
            id,
        })
    }
}

impl Default for RecordTransformer {
    fn default() -> Self {
        Self::new(VenueNormalizer::default())
    }
}

/// Running state of one transformation call; dropped when the call returns
#[derive(Default)]
struct Pass {
    venues: Vec<Venue>,
    by_name: HashMap<String, usize>,
    parties: Vec<Party>,
}

impl Pass {
    fn resolve_venue(&mut self, canonical: &str, raw: &Value) -> &Venue {
        if let Some(&idx) = self.by_name.get(canonical) {
            return &self.venues[idx];
        }
        let id = (self.venues.len() + 1).to_string();
        let venue = Venue {
            category: VenueCategory {
                id: DEFAULT_CATEGORY_ID.to_string(),
                name: first_str(raw, &["categoria", "category"])
                    .unwrap_or_else(|| DEFAULT_CATEGORY_NAME.to_string()),
                icon: DEFAULT_CATEGORY_ICON.to_string(),
            },
            id,
            name: canonical.to_string(),
            description: first_str(raw, &["descripcion", "description"])
                .unwrap_or_else(|| DEFAULT_VENUE_DESCRIPTION.to_string()),
            address: first_str(raw, &["direccion", "address", "direccion_corta"])
                .unwrap_or_else(|| DEFAULT_VENUE_ADDRESS.to_string()),
            image_url: first_str(raw, &["imagen_url", "imageUrl", "image", "imagen_portada"])
                .unwrap_or_else(|| DEFAULT_VENUE_IMAGE_URL.to_string()),
            website: first_str(raw, &["sitio_web", "website"])
                .unwrap_or_else(|| DEFAULT_VENUE_WEBSITE.to_string()),
            phone: first_str(raw, &["telefono", "phone"])
                .unwrap_or_else(|| DEFAULT_VENUE_PHONE.to_string()),
            is_active: true,
        };
        let idx = self.venues.len();
        self.venues.push(venue);
        self.by_name.insert(canonical.to_string(), idx);
        &self.venues[idx]
    }
}

/// Stable across fetches: change detection diffs on it
fn party_id(record: &Value, event: &Value, venue: &str, date: Option<NaiveDate>, title: &str) -> String {
    first_str(record, &["id"])
        .or_else(|| first_str(event, &["id", "code", "codigo"]))
        .unwrap_or_else(|| {
            let date = date.map(|d| d.to_string()).unwrap_or_default();
            let key = format!("{}|{}|{}", venue.to_lowercase(), date, title.to_lowercase());
            Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
        })
}

/// `None` without ticket types; otherwise the cheapest priced ticket, or 0
pub fn min_price(tickets: &[TicketType]) -> Option<f64> {
    if tickets.is_empty() {
        return None;
    }
    let cheapest = tickets
        .iter()
        .map(|t| t.price)
        .filter(|p| *p > 0.0)
        .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a| a.min(p))));
    Some(cheapest.unwrap_or(0.0))
}

/// Unticketed events are assumed visible
pub fn is_available(tickets: &[TicketType]) -> bool {
    tickets.is_empty() || tickets.iter().any(TicketType::is_purchasable)
}

pub fn few_left(tickets: &[TicketType]) -> bool {
    tickets.iter().any(|t| t.few_left && t.is_purchasable())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transformer() -> RecordTransformer {
        RecordTransformer::default()
    }

    #[test]
    fn halloween_at_luminata() {
        let raw = json!({"evento": {"lugar": {"nombre": "LUMINATA"}, "nombreEvento": "Halloween",
            "fecha": "2025-10-31", "entradas": [{"tipo": "General", "precio": "15,00", "agotadas": false}]}});
        let out = transformer().transform(&[raw]);
        assert_eq!(out.parties.len(), 1);
        let party = &out.parties[0];
        assert_eq!(party.venue_name, "Luminata Disco");
        assert_eq!(party.price, Some(15.0));
        assert!(party.is_available);
        assert_eq!(party.date, NaiveDate::from_ymd_opt(2025, 10, 31));
        assert_eq!(out.venues[0].category.id, DEFAULT_CATEGORY_ID);
    }

    #[test]
    fn price_sentinels() {
        let no_tickets = json!({"lugar": {"nombre": "OW Club"}, "title": "A", "date": "2025-10-31"});
        let free = json!({"lugar": {"nombre": "OW Club"}, "title": "B", "date": "2025-10-31",
            "entradas": [{"precio": "0"}, {"precio": "gratis"}]});
        let mixed = json!({"lugar": {"nombre": "OW Club"}, "title": "C", "date": "2025-10-31",
            "entradas": [{"precio": 0}, {"precio": "20"}, {"precio": 12.5}]});
        let out = transformer().transform(&[no_tickets, free, mixed]);
        assert_eq!(out.parties[0].price, None);
        assert!(out.parties[0].is_available);
        assert_eq!(out.parties[1].price, Some(0.0));
        assert_eq!(out.parties[2].price, Some(12.5));
    }

    #[test]
    fn few_left_requires_a_purchasable_ticket() {
        let raw = json!({"lugar": {"nombre": "OW Club"}, "title": "A", "date": "2025-10-31",
            "entradas": [{"precio": 10, "agotadas": true, "quedan_pocas": true}]});
        let out = transformer().transform(&[raw]);
        assert!(!out.parties[0].few_left);
        assert!(!out.parties[0].is_available);
    }

    #[test]
    fn records_without_date_and_title_are_skipped() {
        let raw = json!({"lugar": {"nombre": "OW Club"}, "descripcion": "nothing else"});
        let out = transformer().transform(&[raw]);
        assert!(out.parties.is_empty());
        assert!(out.venues.is_empty());
    }

    #[test]
    fn generated_ids_are_stable_between_passes() {
        let raw = json!({"lugar": {"nombre": "OW Club"}, "title": "A", "date": "2025-10-31"});
        let first = transformer().transform(&[raw.clone()]);
        let second = transformer().transform(&[raw]);
        assert_eq!(first.parties[0].id, second.parties[0].id);
    }

    #[test]
    fn document_id_takes_precedence_over_code() {
        let raw = json!({"id": "doc-7", "evento": {"code": "XY1", "lugar": {"nombre": "OW Club"},
            "nombreEvento": "A", "fecha": "2025-10-31"}});
        let out = transformer().transform(&[raw]);
        assert_eq!(out.parties[0].id, "doc-7");
    }

    #[test]
    fn title_without_date_is_kept_undated() {
        let raw = json!({"evento": {"lugar": {"nombre": "Dodo Club"}, "nombreEvento": "No date yet"}});
        let bad_date = json!({"evento": {"lugar": {"nombre": "Dodo Club"}, "nombreEvento": "TBA",
            "fecha": "pronto"}});
        let out = transformer().transform(&[raw, bad_date]);
        assert_eq!(out.parties.len(), 2);
        assert_eq!(out.parties[0].title, "No date yet");
        assert_eq!(out.parties[0].date, None);
        assert_eq!(out.parties[1].date, None);
    }

    #[test]
    fn date_without_title_gets_the_default_title() {
        let raw = json!({"evento": {"lugar": {"nombre": "Dodo Club"}, "fecha": "2025-10-31"}});
        let out = transformer().transform(&[raw]);
        assert_eq!(out.parties.len(), 1);
        assert_eq!(out.parties[0].title, DEFAULT_EVENT_TITLE);
        assert_eq!(out.parties[0].date, NaiveDate::from_ymd_opt(2025, 10, 31));
    }

    #[test]
    fn every_venue_shares_the_fallback_category() {
        let out = transformer().transform(&[
            json!({"lugar": {"nombre": "OW Club"}, "title": "A", "date": "2025-10-31"}),
            json!({"lugar": {"nombre": "Dodo Club", "categoria": "Sala"}, "title": "B", "date": "2025-10-31"}),
        ]);
        assert_eq!(out.venues[0].category.id, DEFAULT_CATEGORY_ID);
        assert_eq!(out.venues[0].category.name, DEFAULT_CATEGORY_NAME);
        assert_eq!(out.venues[1].category.id, DEFAULT_CATEGORY_ID);
        assert_eq!(out.venues[1].category.name, "Sala");
        assert_ne!(out.venues[0].id, out.venues[1].id);
    }
}

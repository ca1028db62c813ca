#![allow(dead_code)]

use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Utc};
use partyfinder::domain::{Party, RawRecord};
use partyfinder::pipeline::processing::RecordTransformer;
use serde_json::{json, Value};

pub fn zone() -> FixedOffset {
    FixedOffset::east_opt(3600).unwrap()
}

pub fn refresh_at() -> NaiveTime {
    NaiveTime::from_hms_opt(10, 0, 0).unwrap()
}

/// UTC instant for a wall-clock time in the reference zone
pub fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    zone()
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
        .with_timezone(&Utc)
}

/// Raw upstream record in the wrapped Spanish shape
pub fn record(id: &str, venue: &str, date: &str, title: &str) -> RawRecord {
    json!({
        "id": id,
        "evento": {
            "nombreEvento": title,
            "fecha": date,
            "lugar": { "nombre": venue },
            "entradas": [
                { "tipo": "General", "precio": "15,00", "agotadas": false }
            ]
        }
    })
}

pub fn parties(records: &[Value]) -> Vec<Party> {
    RecordTransformer::default().transform(records).parties
}

use crate::domain::RawRecord;
use crate::error::{FeedError, Result};
use crate::pipeline::processing::transform::fields::{first_object, first_str, parse_date};
use chrono::NaiveDate;
use serde_json::Value;

/// Wrappers some upstreams put around the record array
const WRAPPER_KEYS: &[&str] = &["data", "eventos", "events"];

/// Decode an upstream body into raw records. A bare array is the contract;
/// a single-key wrapper object around one is tolerated. Anything else is
/// the one case that rejects the whole fetch.
pub fn decode_records(bytes: &[u8]) -> Result<Vec<RawRecord>> {
    let value: Value = serde_json::from_slice(bytes)?;
    match value {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => WRAPPER_KEYS
            .iter()
            .find_map(|k| match map.remove(*k) {
                Some(Value::Array(records)) => Some(records),
                _ => None,
            })
            .ok_or_else(|| FeedError::upstream("upstream payload is not an array of records")),
        other => Err(FeedError::upstream(format!(
            "upstream payload is not an array of records (got {})",
            json_kind(&other)
        ))),
    }
}

/// Keep records dated `today` or later, ordered by date ascending. Records
/// whose date cannot be read are kept at the end for the transformer to judge.
pub fn retain_upcoming(records: Vec<RawRecord>, today: NaiveDate) -> Vec<RawRecord> {
    let mut dated: Vec<(Option<NaiveDate>, RawRecord)> = records
        .into_iter()
        .map(|r| (record_date(&r), r))
        .filter(|(d, _)| d.map_or(true, |d| d >= today))
        .collect();
    // stable: equal dates keep upstream order
    dated.sort_by_key(|(d, _)| d.map_or((1, NaiveDate::MAX), |d| (0, d)));
    dated.into_iter().map(|(_, r)| r).collect()
}

fn record_date(record: &Value) -> Option<NaiveDate> {
    let event = first_object(record, &["evento", "event"]).unwrap_or(record);
    first_str(event, &["fecha", "date", "event_day"]).and_then(|d| parse_date(&d))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_and_wrapped_arrays_decode() {
        assert_eq!(decode_records(br#"[{"a":1}]"#).unwrap().len(), 1);
        assert_eq!(decode_records(br#"{"data":[{"a":1},{"a":2}]}"#).unwrap().len(), 2);
    }

    #[test]
    fn non_iterable_payloads_fail() {
        assert!(matches!(decode_records(b"42"), Err(FeedError::Upstream { .. })));
        assert!(matches!(decode_records(br#"{"ok":true}"#), Err(FeedError::Upstream { .. })));
        assert!(matches!(decode_records(b"not json"), Err(FeedError::Json(_))));
    }

    #[test]
    fn upcoming_filter_drops_past_and_sorts() {
        let today = NaiveDate::from_ymd_opt(2025, 10, 30).unwrap();
        let records = vec![
            json!({"evento": {"fecha": "2025-11-02", "nombreEvento": "late"}}),
            json!({"evento": {"fecha": "2025-10-01", "nombreEvento": "past"}}),
            json!({"fecha": "2025-10-30", "nombreEvento": "today"}),
            json!({"nombreEvento": "undated"}),
        ];
        let kept = retain_upcoming(records, today);
        let titles: Vec<_> = kept
            .iter()
            .map(|r| r.pointer("/evento/nombreEvento").or_else(|| r.get("nombreEvento")).unwrap().as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["today", "late", "undated"]);
    }
}

//! Permissive field access over raw JSON records.
//!
//! Upstream schemas drift between scrapers, so every lookup takes a list of
//! alternate spellings and returns the first usable value.

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?[0-9][0-9.,]*").expect("valid regex"));

/// First non-empty string among `keys`. Numbers are rendered as strings.
pub fn first_str(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

pub fn first_object<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| obj.get(*k).filter(|v| v.is_object()))
}

pub fn first_array<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    keys.iter().find_map(|k| obj.get(*k)?.as_array())
}

pub fn first_bool(obj: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| as_bool(obj.get(*k)?))
}

pub fn first_u32(obj: &Value, keys: &[&str]) -> Option<u32> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

pub fn first_f64(obj: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    })
    .filter(|f: &f64| f.is_finite())
}

fn as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "si" | "sí" => Some(true),
            "false" | "0" | "no" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parse a price given as a number or as text such as "15,00", "15.5 €" or
/// "1.234,50€". Anything unparseable, negative or non-finite becomes 0.
pub fn parse_price(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_price_text(s),
        _ => None,
    };
    match parsed {
        Some(p) if p.is_finite() && p > 0.0 => p,
        _ => 0.0,
    }
}

fn parse_price_text(text: &str) -> Option<f64> {
    let token = NUMBER.find(text)?.as_str().trim_end_matches(['.', ',']);
    let last_comma = token.rfind(',');
    let last_dot = token.rfind('.');
    let canonical = match (last_comma, last_dot) {
        // both present: the later one is the decimal separator
        (Some(c), Some(d)) if c > d => token.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => token.replace(',', ""),
        (Some(_), None) => token.replace(',', "."),
        _ => token.to_string(),
    };
    canonical.parse().ok()
}

/// `YYYY-MM-DD`, an ISO timestamp starting with one, or `DD/MM/YYYY`
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Some(prefix) = text.get(..10) {
        if let Ok(d) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(d);
        }
    }
    NaiveDate::parse_from_str(text, "%d/%m/%Y").ok()
}

/// Canonical `HH:MM` when the text parses as a time, the trimmed text otherwise
pub fn normalize_time(text: &str) -> String {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .or_else(|_| NaiveTime::parse_from_str(text, "%Hh%M"))
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|_| text.to_string())
}

/// Tags as plain strings, or `{name}` objects
pub fn string_list(obj: &Value, keys: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    for key in keys {
        let Some(items) = obj.get(*key).and_then(Value::as_array) else {
            continue;
        };
        for item in items {
            let tag = match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Object(_) => item.get("name").and_then(Value::as_str).map(|s| s.trim().to_string()),
                _ => None,
            };
            if let Some(tag) = tag.filter(|t| !t.is_empty()) {
                if !out.contains(&tag) {
                    out.push(tag);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn price_accepts_numbers_and_localized_text() {
        assert_eq!(parse_price(Some(&json!(12))), 12.0);
        assert_eq!(parse_price(Some(&json!("15,00"))), 15.0);
        assert_eq!(parse_price(Some(&json!("15.5 €"))), 15.5);
        assert_eq!(parse_price(Some(&json!("1.234,50€"))), 1234.5);
        assert_eq!(parse_price(Some(&json!("Desde 9,90€"))), 9.9);
    }

    #[test]
    fn unparseable_or_negative_price_is_zero() {
        assert_eq!(parse_price(Some(&json!("gratis"))), 0.0);
        assert_eq!(parse_price(Some(&json!(-3))), 0.0);
        assert_eq!(parse_price(Some(&json!(null))), 0.0);
        assert_eq!(parse_price(None), 0.0);
    }

    #[test]
    fn booleans_tolerate_strings_and_numbers() {
        let v = json!({"a": "true", "b": 0, "c": "Sí"});
        assert_eq!(first_bool(&v, &["a"]), Some(true));
        assert_eq!(first_bool(&v, &["b"]), Some(false));
        assert_eq!(first_bool(&v, &["c"]), Some(true));
        assert_eq!(first_bool(&v, &["missing"]), None);
    }

    #[test]
    fn first_str_skips_blank_alternates() {
        let v = json!({"nombreEvento": "  ", "title": "Halloween"});
        assert_eq!(first_str(&v, &["nombreEvento", "title"]), Some("Halloween".to_string()));
    }

    #[test]
    fn dates_and_times() {
        assert_eq!(parse_date("2025-10-31"), NaiveDate::from_ymd_opt(2025, 10, 31));
        assert_eq!(parse_date("2025-10-31T23:30:00Z"), NaiveDate::from_ymd_opt(2025, 10, 31));
        assert_eq!(parse_date("31/10/2025"), NaiveDate::from_ymd_opt(2025, 10, 31));
        assert_eq!(parse_date("soon"), None);
        assert_eq!(normalize_time("23:30:00"), "23:30");
        assert_eq!(normalize_time("late"), "late");
    }

    #[test]
    fn tags_from_strings_and_objects() {
        let v = json!({"tags": ["Reggaeton", {"name": "Techno"}, "", "Reggaeton"]});
        assert_eq!(string_list(&v, &["tags"]), vec!["Reggaeton", "Techno"]);
    }
}

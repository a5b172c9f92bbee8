//! Canonical timestamps: ISO-8601, millisecond precision, `Z` suffix.

use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};

/// Types that already know their instant and can render it canonically.
pub trait ToIsoString {
    fn to_iso_string(&self) -> String;
}

impl<Tz: TimeZone> ToIsoString for DateTime<Tz> {
    fn to_iso_string(&self) -> String {
        self.with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl ToIsoString for SystemTime {
    fn to_iso_string(&self) -> String {
        DateTime::<Utc>::from(*self).to_iso_string()
    }
}

/// Normalizes a provider timestamp; unusable or missing input yields "now".
pub fn normalize(value: Option<&Value>) -> String {
    value
        .and_then(parse_value)
        .unwrap_or_else(Utc::now)
        .to_iso_string()
}

/// Accepts `{seconds, nanos}` objects and date strings. Anything else is `None`.
pub fn parse_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Object(map) => from_seconds_nanos(map),
        Value::String(s) => parse_str(s),
        _ => None,
    }
}

fn from_seconds_nanos(map: &Map<String, Value>) -> Option<DateTime<Utc>> {
    let seconds = integer(map.get("seconds")?)?;
    let nanos = match map.get("nanos") {
        None | Some(Value::Null) => 0,
        Some(v) => integer(v)?,
    };
    if !(0..1_000_000_000).contains(&nanos) {
        return None;
    }
    let truncated = (nanos / 1_000_000) * 1_000_000;
    Utc.timestamp_opt(seconds, truncated as u32).single()
}

/// Whole part of a number or numeric string; fractions are truncated.
fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate_float)),
        Value::String(s) => {
            let s = s.trim();
            s.parse()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate_float))
        }
        _ => None,
    }
}

fn truncate_float(f: f64) -> Option<i64> {
    let whole = f.trunc();
    (whole.is_finite() && whole >= i64::MIN as f64 && whole < i64::MAX as f64).then_some(whole as i64)
}

pub fn parse_str(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    // zone-less forms are taken as UTC
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .map(|naive| naive.and_utc())
}

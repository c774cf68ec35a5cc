//! Decoding of the foreign plugin's serialized recurrence column.
//!
//! The column holds a JSON object such as
//! `{"type":"monthly","interval":1,"ordinal":"second","weekday":2}`.
//! Numbers may be written as strings by the plugin, so numeric fields
//! accept both forms.

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use super::{DayRule, ForeignRecurrence, RepeatLimits};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Number {
    Int(i64),
    Text(String),
}

impl Number {
    fn value(&self) -> Option<i64> {
        match self {
            Number::Int(n) => Some(*n),
            Number::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(rename = "type", default)]
    kind: String,
    interval: Option<Number>,
    count: Option<Number>,
    end: Option<String>,
    #[serde(default)]
    days: Vec<Number>,
    weekday: Option<Number>,
    ordinal: Option<String>,
    day: Option<Number>,
    month: Option<Number>,
}

/// Decode a serialized rule.
///
/// Returns `None` for events that do not repeat (empty column or type
/// `none`). Malformed blobs decode to [`ForeignRecurrence::Unsupported`] so
/// the event still imports, as a single occurrence.
pub fn decode_recurrence(blob: &str) -> Option<ForeignRecurrence> {
    let blob = blob.trim();
    if blob.is_empty() {
        return None;
    }

    let raw: RawRule = match serde_json::from_str(blob) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Unreadable recurrence rule, importing as single event: {}", e);
            return Some(ForeignRecurrence::Unsupported {
                kind: "malformed".to_string(),
            });
        }
    };

    let kind = raw.kind.trim().to_ascii_lowercase();
    let limits = RepeatLimits {
        interval: non_negative(raw.interval.as_ref()),
        count: non_negative(raw.count.as_ref()),
        until: raw.end.as_deref().and_then(parse_end_date),
    };

    let rule = match kind.as_str() {
        "" | "none" => return None,
        "daily" => ForeignRecurrence::Daily { limits },
        "weekly" => ForeignRecurrence::Weekly {
            limits,
            weekdays: raw
                .days
                .iter()
                .filter_map(Number::value)
                .filter_map(|d| u8::try_from(d).ok())
                .collect(),
        },
        "monthly" => ForeignRecurrence::Monthly {
            limits,
            day: day_rule(&raw),
        },
        "yearly" => ForeignRecurrence::Yearly {
            limits,
            day: day_rule(&raw),
            month: small(raw.month.as_ref()),
        },
        _ => ForeignRecurrence::Unsupported { kind },
    };
    Some(rule)
}

fn day_rule(raw: &RawRule) -> DayRule {
    match (&raw.ordinal, small(raw.weekday.as_ref())) {
        (Some(ordinal), Some(weekday)) if !ordinal.trim().is_empty() => DayRule::Weekday {
            ordinal: ordinal.clone(),
            weekday,
        },
        _ => match small(raw.day.as_ref()) {
            Some(day) => DayRule::DayOfMonth(day),
            None => DayRule::Unspecified,
        },
    }
}

fn non_negative(n: Option<&Number>) -> u32 {
    n.and_then(Number::value)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

fn small(n: Option<&Number>) -> Option<u8> {
    n.and_then(Number::value).and_then(|v| u8::try_from(v).ok())
}

fn parse_end_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() || s.starts_with("0000") {
        return None;
    }
    // Dates sometimes carry a time part; only the date matters.
    let date_part = s.split([' ', 'T']).next().unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

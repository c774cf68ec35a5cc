//! Recurrence translation from the foreign plugin's rules to native rules.
//!
//! Foreign rules are decoded at the reader boundary (see [`decode`]) into
//! [`ForeignRecurrence`]. [`translate`] then maps them onto the native
//! RRULE-style representation. Only daily, weekly, monthly and yearly rules
//! translate; anything else yields `None` and the event imports as a single
//! occurrence.

pub mod decode;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use decode::decode_recurrence;

/// Repeat limits shared by all rule kinds. Zero / `None` means "no limit".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepeatLimits {
    pub interval: u32,
    pub count: u32,
    pub until: Option<NaiveDate>,
}

/// Which day(s) of the month a monthly or yearly rule falls on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayRule {
    /// e.g. "second" + 2 (Tuesday) for "the second Tuesday".
    Weekday { ordinal: String, weekday: u8 },
    /// A fixed day number, 1..=31.
    DayOfMonth(u8),
    Unspecified,
}

/// A decoded foreign recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForeignRecurrence {
    Daily {
        limits: RepeatLimits,
    },
    Weekly {
        limits: RepeatLimits,
        /// 1 = Monday .. 7 = Sunday.
        weekdays: Vec<u8>,
    },
    Monthly {
        limits: RepeatLimits,
        day: DayRule,
    },
    Yearly {
        limits: RepeatLimits,
        day: DayRule,
        month: Option<u8>,
    },
    Unsupported {
        kind: String,
    },
}

/// Native recurrence frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }
}

/// Native recurrence rule stored with an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeRecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub count: u32,
    pub until: Option<NaiveDate>,
    pub by_day: Vec<String>,
    pub by_month_day: Vec<u8>,
    pub by_set_pos: Vec<i8>,
    pub by_month: Vec<u8>,
}

impl NativeRecurrenceRule {
    fn new(frequency: Frequency, limits: &RepeatLimits) -> Self {
        Self {
            frequency,
            interval: limits.interval,
            count: limits.count,
            until: limits.until,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_set_pos: Vec::new(),
            by_month: Vec::new(),
        }
    }

    /// RFC 5545 style rule string, e.g. `FREQ=MONTHLY;BYDAY=TU;BYSETPOS=2`.
    pub fn to_rrule(&self) -> String {
        let mut parts = vec![format!("FREQ={}", self.frequency.as_str().to_uppercase())];
        if self.interval > 0 {
            parts.push(format!("INTERVAL={}", self.interval));
        }
        if self.count > 0 {
            parts.push(format!("COUNT={}", self.count));
        }
        if let Some(until) = self.until {
            parts.push(format!("UNTIL={}", until.format("%Y%m%d")));
        }
        if !self.by_day.is_empty() {
            parts.push(format!("BYDAY={}", self.by_day.join(",")));
        }
        if !self.by_month_day.is_empty() {
            parts.push(format!("BYMONTHDAY={}", join_numbers(&self.by_month_day)));
        }
        if !self.by_set_pos.is_empty() {
            parts.push(format!("BYSETPOS={}", join_numbers(&self.by_set_pos)));
        }
        if !self.by_month.is_empty() {
            parts.push(format!("BYMONTH={}", join_numbers(&self.by_month)));
        }
        parts.join(";")
    }
}

/// Translate a foreign rule. `None` for unsupported rule kinds.
pub fn translate(rule: &ForeignRecurrence) -> Option<NativeRecurrenceRule> {
    match rule {
        ForeignRecurrence::Daily { limits } => {
            Some(NativeRecurrenceRule::new(Frequency::Daily, limits))
        }
        ForeignRecurrence::Weekly { limits, weekdays } => {
            let mut native = NativeRecurrenceRule::new(Frequency::Weekly, limits);
            native.by_day = weekdays
                .iter()
                .filter_map(|d| weekday_abbreviation(*d))
                .map(str::to_string)
                .collect();
            Some(native)
        }
        ForeignRecurrence::Monthly { limits, day } => {
            let mut native = NativeRecurrenceRule::new(Frequency::Monthly, limits);
            apply_day_rule(&mut native, day);
            Some(native)
        }
        ForeignRecurrence::Yearly { limits, day, month } => {
            let mut native = NativeRecurrenceRule::new(Frequency::Yearly, limits);
            apply_day_rule(&mut native, day);
            if let Some(month) = month.filter(|m| (1..=12).contains(m)) {
                native.by_month = vec![month];
            }
            Some(native)
        }
        ForeignRecurrence::Unsupported { .. } => None,
    }
}

/// By-day + by-set-position, or by-month-day; never both. An unknown
/// ordinal drops only this sub-rule.
fn apply_day_rule(native: &mut NativeRecurrenceRule, day: &DayRule) {
    match day {
        DayRule::Weekday { ordinal, weekday } => {
            if let (Some(pos), Some(abbr)) = (ordinal_position(ordinal), weekday_abbreviation(*weekday))
            {
                native.by_day = vec![abbr.to_string()];
                native.by_set_pos = vec![pos];
            }
        }
        DayRule::DayOfMonth(d) if (1..=31).contains(d) => {
            native.by_month_day = vec![*d];
        }
        DayRule::DayOfMonth(_) | DayRule::Unspecified => {}
    }
}

/// Two-letter abbreviation for a foreign weekday number (1 = Monday).
pub fn weekday_abbreviation(day: u8) -> Option<&'static str> {
    match day {
        1 => Some("MO"),
        2 => Some("TU"),
        3 => Some("WE"),
        4 => Some("TH"),
        5 => Some("FR"),
        6 => Some("SA"),
        7 => Some("SU"),
        _ => None,
    }
}

/// Set position for an ordinal word.
pub fn ordinal_position(ordinal: &str) -> Option<i8> {
    match ordinal.trim().to_ascii_lowercase().as_str() {
        "last" => Some(-1),
        "first" => Some(1),
        "second" => Some(2),
        "third" => Some(3),
        "fourth" => Some(4),
        "fifth" => Some(5),
        "sixth" => Some(6),
        "seventh" => Some(7),
        _ => None,
    }
}

fn join_numbers<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

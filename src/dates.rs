//! Date normalization.
//!
//! Every date that enters the system (form input, workbook cells, stored
//! records) goes through [`DateNormalizer`] and comes out as a canonical
//! `YYYY-MM-DD` string, or as an empty string when it cannot be read.

use crate::errors::GymError;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde_json::Value;

const CANONICAL_FORMAT: &str = "%Y-%m-%d";

/// Last day representable by spreadsheet serials (9999-12-31).
const MAX_SERIAL: f64 = 2_958_465.0;

/// How a two-component-ambiguous date such as `05/03/2024` is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayMonthOrder {
    /// `05/03/2024` is May 3rd.
    #[default]
    MonthFirst,
    /// `05/03/2024` is March 5th.
    DayFirst,
}

impl DayMonthOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "mdy" | "month-first" => Some(Self::MonthFirst),
            "dmy" | "day-first" => Some(Self::DayFirst),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateNormalizer {
    pub order: DayMonthOrder,
}

impl DateNormalizer {
    pub fn new(order: DayMonthOrder) -> Self {
        Self { order }
    }

    /// Normalizes a loosely typed value (string, number, null).
    pub fn normalize(&self, value: &Value) -> String {
        match value {
            Value::String(text) => self.normalize_text(text),
            Value::Number(number) => number.as_f64().map(from_serial).unwrap_or_default(),
            _ => String::new(),
        }
    }

    pub fn normalize_text(&self, raw: &str) -> String {
        self.parse_text(raw).map(canonical).unwrap_or_default()
    }

    /// Reads a date typed into a form. Blank means not given; anything else
    /// has to be a readable date.
    pub fn read_field(&self, raw: &str, field: &'static str) -> Result<Option<String>, GymError> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        self.parse_text(raw)
            .map(|date| Some(canonical(date)))
            .ok_or(GymError::InvalidDate(field))
    }

    pub fn parse_text(&self, raw: &str) -> Option<NaiveDate> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }
        if let Some(date) = parse_canonical(text) {
            return Some(date);
        }
        if let Some(date) = parse_generic(text) {
            return Some(date);
        }
        if let Some(date) = self.parse_delimited(text) {
            return Some(date);
        }
        if text.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return text.parse::<f64>().ok().and_then(serial_to_date);
        }
        None
    }

    /// Day/month/year strings in unknown order. A component above 12 can only
    /// be a day; when both are 12 or below the configured order decides.
    fn parse_delimited(&self, text: &str) -> Option<NaiveDate> {
        let parts: Vec<&str> = text.split(['/', '-', '.']).collect();
        let [first, second, third] = parts.as_slice() else {
            return None;
        };
        if ![first, second, third]
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
        {
            return None;
        }

        let a: u32 = first.parse().ok()?;
        let b: u32 = second.parse().ok()?;
        let c: i32 = third.parse().ok()?;

        if first.len() == 4 {
            return NaiveDate::from_ymd_opt(a as i32, b, c as u32);
        }

        let year = if third.len() <= 2 { 2000 + c } else { c };
        let (day, month) = if a > 12 {
            (a, b)
        } else if b > 12 {
            (b, a)
        } else {
            match self.order {
                DayMonthOrder::MonthFirst => (b, a),
                DayMonthOrder::DayFirst => (a, b),
            }
        };
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

/// Normalizes with the default month-first order.
pub fn normalize(value: &Value) -> String {
    DateNormalizer::default().normalize(value)
}

pub fn canonical(date: NaiveDate) -> String {
    date.format(CANONICAL_FORMAT).to_string()
}

/// Parses a string that is already in canonical form.
pub fn parse_canonical(text: &str) -> Option<NaiveDate> {
    if text.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(text, CANONICAL_FORMAT).ok()
}

fn parse_generic(text: &str) -> Option<NaiveDate> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(text, format) {
            return Some(timestamp.date());
        }
    }
    NaiveDate::parse_from_str(text, "%Y/%m/%d").ok()
}

fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

/// Spreadsheet serial day count, day 0 being 1899-12-30. The fractional
/// part is a time of day and is dropped.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(0.0..=MAX_SERIAL).contains(&serial) {
        return None;
    }
    serial_epoch().checked_add_signed(Duration::days(serial.floor() as i64))
}

pub fn from_serial(serial: f64) -> String {
    serial_to_date(serial).map(canonical).unwrap_or_default()
}

pub fn to_serial(date: NaiveDate) -> i64 {
    (date - serial_epoch()).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn canonical_input_is_unchanged_and_idempotent() {
        let once = normalize(&json!("2024-01-10"));
        assert_eq!(once, "2024-01-10");
        assert_eq!(normalize(&json!(once)), "2024-01-10");
    }

    #[test]
    fn form_fields_reject_unreadable_dates() {
        let normalizer = DateNormalizer::new(DayMonthOrder::DayFirst);
        assert_eq!(normalizer.read_field("  ", "fecha").unwrap(), None);
        assert_eq!(
            normalizer.read_field("05/03/2024", "fecha").unwrap().as_deref(),
            Some("2024-03-05")
        );
        assert!(matches!(
            normalizer.read_field("31/02/2024", "fecha"),
            Err(GymError::InvalidDate("fecha"))
        ));
    }

    #[test]
    fn serial_maps_to_calendar_date() {
        assert_eq!(normalize(&json!(45306)), "2024-01-15");
        assert_eq!(normalize(&json!(45306.75)), "2024-01-15");
        assert_eq!(normalize(&json!("45292")), "2024-01-01");
        assert_eq!(to_serial(ymd(2024, 1, 15)), 45306);
        assert_eq!(from_serial(0.0), "1899-12-30");
        assert_eq!(from_serial(-1.0), "");
    }

    #[test]
    fn timestamps_keep_the_date_part() {
        assert_eq!(normalize(&json!("2024-03-05T10:20:30Z")), "2024-03-05");
        assert_eq!(normalize(&json!("2024-03-05 08:00:00")), "2024-03-05");
        assert_eq!(normalize(&json!("2024/03/05")), "2024-03-05");
    }

    #[test]
    fn day_above_twelve_is_read_as_day() {
        assert_eq!(normalize(&json!("15/03/2024")), "2024-03-15");
        assert_eq!(normalize(&json!("03/15/2024")), "2024-03-15");
        assert_eq!(normalize(&json!("15-03-24")), "2024-03-15");
    }

    #[test]
    fn ambiguous_order_follows_configuration() {
        let month_first = DateNormalizer::new(DayMonthOrder::MonthFirst);
        let day_first = DateNormalizer::new(DayMonthOrder::DayFirst);
        assert_eq!(month_first.normalize_text("05/03/2024"), "2024-05-03");
        assert_eq!(day_first.normalize_text("05/03/2024"), "2024-03-05");
        assert_eq!(day_first.normalize_text("05.03.2024"), "2024-03-05");
    }

    #[test]
    fn unreadable_values_become_empty() {
        assert_eq!(normalize(&json!("mañana")), "");
        assert_eq!(normalize(&json!("31/02/2024")), "");
        assert_eq!(normalize(&json!(null)), "");
        assert_eq!(normalize(&json!(true)), "");
        assert_eq!(normalize(&json!("")), "");
    }

    #[test]
    fn order_parses_from_config_strings() {
        assert_eq!(DayMonthOrder::parse("DMY"), Some(DayMonthOrder::DayFirst));
        assert_eq!(DayMonthOrder::parse("mdy"), Some(DayMonthOrder::MonthFirst));
        assert_eq!(DayMonthOrder::parse("ymd"), None);
    }
}

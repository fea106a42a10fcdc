use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use super::Constraint;
use crate::types::Value;

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;

pub(super) fn encode(constraint: &Constraint, value: Value) -> Value {
    if value.is_null() {
        return value;
    }

    let encoded = match constraint {
        Constraint::Number => encode_number(&value),
        Constraint::Percentage => encode_percentage(&value),
        Constraint::DateTime { format } => encode_date_time(&value, format.as_deref()),
        Constraint::Boolean => encode_boolean(&value),
        Constraint::Duration => encode_duration(&value),
        Constraint::Text
        | Constraint::FileAttachment
        | Constraint::Select { .. }
        | Constraint::Color
        | Constraint::User => return value,
    };

    encoded.unwrap_or_else(|| {
        tracing::debug!(
            constraint = constraint.name(),
            "value not convertible, storing as-is"
        );
        value
    })
}

pub(super) fn decode(constraint: &Constraint, value: Value) -> Value {
    match (constraint, value) {
        (Constraint::DateTime { .. }, Value::Timestamp(ts)) => {
            Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        (_, value) => value,
    }
}

fn parse_number(s: &str) -> Option<Value> {
    let mut normalized: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if normalized.contains(',') {
        normalized = decimal_comma(&normalized)?;
    }

    if let Ok(i) = normalized.parse::<i64>() {
        return Some(Value::Int(i));
    }
    normalized
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Value::Float)
}

/// Reads a single comma as the decimal separator. Input that could be a
/// thousands separator (`1,000`, `1,000,000`, `1.000,5`) is refused.
fn decimal_comma(s: &str) -> Option<String> {
    if s.contains('.') {
        return None;
    }
    let (whole, fraction) = s.split_once(',')?;
    let ambiguous = fraction.len() == 3 && fraction.chars().all(|c| c.is_ascii_digit());
    if fraction.contains(',') || ambiguous {
        return None;
    }
    Some(format!("{whole}.{fraction}"))
}

fn encode_number(value: &Value) -> Option<Value> {
    match value {
        Value::Int(_) | Value::Float(_) => Some(value.clone()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn encode_percentage(value: &Value) -> Option<Value> {
    match value {
        Value::Int(_) | Value::Float(_) => Some(value.clone()),
        Value::String(s) => {
            let trimmed = s.trim();
            match trimmed.strip_suffix('%') {
                Some(number) => parse_number(number)
                    .and_then(|v| v.as_f64())
                    .map(|f| Value::Float(f / 100.0)),
                None => parse_number(trimmed),
            }
        }
        _ => None,
    }
}

fn encode_date_time(value: &Value, format: Option<&str>) -> Option<Value> {
    let ts = match value {
        Value::Timestamp(ts) => *ts,
        Value::Int(millis) => DateTime::from_timestamp_millis(*millis)?,
        Value::String(s) => parse_date_time(s.trim(), format)?,
        _ => return None,
    };
    truncate_to_millis(ts).map(Value::Timestamp)
}

fn parse_date_time(s: &str, format: Option<&str>) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some(format) = format {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(ndt.and_utc());
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0).map(|ndt| ndt.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

fn truncate_to_millis(ts: DateTime<Utc>) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ts.timestamp_millis())
}

fn encode_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::Int(0) => Some(Value::Bool(false)),
        Value::Int(1) => Some(Value::Bool(true)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(Value::Bool(true)),
            "false" | "no" | "off" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn encode_duration(value: &Value) -> Option<Value> {
    match value {
        Value::Int(_) => Some(value.clone()),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(millis) = trimmed.parse::<i64>() {
                return Some(Value::Int(millis));
            }
            parse_duration(trimmed).map(Value::Int)
        }
        _ => None,
    }
}

/// Parses strings such as `1w 2d 3h 4m 5s` into milliseconds.
fn parse_duration(s: &str) -> Option<i64> {
    let mut total: i64 = 0;
    let mut digits = String::new();
    let mut seen_unit = false;

    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if c.is_whitespace() {
            continue;
        }

        let unit = match c.to_ascii_lowercase() {
            'w' => WEEK_MS,
            'd' => DAY_MS,
            'h' => HOUR_MS,
            'm' => MINUTE_MS,
            's' => SECOND_MS,
            _ => return None,
        };
        if digits.is_empty() {
            return None;
        }
        let amount: i64 = digits.parse().ok()?;
        total = total.checked_add(amount.checked_mul(unit)?)?;
        digits.clear();
        seen_unit = true;
    }

    if !digits.is_empty() || !seen_unit {
        return None;
    }
    Some(total)
}

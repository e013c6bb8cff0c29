// src/core/coerce.rs

//! The type coercion registry behind the `type` directive marker.
//!
//! Each target type name maps to a pure conversion function. Conversions
//! either succeed or report *why* they failed; the caller treats any failure
//! as fatal for the whole resolution pass.

use crate::models::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum CoerceError {
    #[error("Unknown target type '{target}' for type coercion.")]
    UnknownTarget { target: String },
    #[error("Cannot convert {source_type} value '{value}' to '{target}': {reason}")]
    Conversion {
        value: String,
        source_type: &'static str,
        target: String,
        reason: String,
    },
}

/// A conversion reports only the failure reason; `coerce` attaches the
/// offending value, its type, and the target.
type Conversion = fn(&Value) -> Result<Value, String>;

lazy_static! {
    static ref REGISTRY: HashMap<&'static str, Conversion> = {
        let mut registry: HashMap<&'static str, Conversion> = HashMap::new();
        registry.insert("bool", to_bool);
        registry.insert("int", to_int);
        registry.insert("float", to_float);
        registry.insert("str", to_str);
        registry.insert("decimal", to_decimal);
        registry.insert("path", to_path);
        registry.insert("datetime", to_datetime);
        registry.insert("date", to_date);
        registry.insert("time", to_time);
        registry.insert("duration", to_duration);
        registry.insert("url", to_url);
        registry
    };
    static ref DURATION_TOKEN_RE: Regex =
        Regex::new(r"(\d+)(us|ms|w|d|h|m|s)").unwrap();
}

/// Converts an already-resolved value to the named target type.
pub fn coerce(value: &Value, target: &str) -> Result<Value, CoerceError> {
    let convert = REGISTRY
        .get(target)
        .ok_or_else(|| CoerceError::UnknownTarget {
            target: target.to_string(),
        })?;

    convert(value).map_err(|reason| CoerceError::Conversion {
        value: value.to_string(),
        source_type: value.type_name(),
        target: target.to_string(),
        reason,
    })
}

// --- CONVERSIONS ---

fn to_bool(value: &Value) -> Result<Value, String> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
        Value::String(_) => Err("expected 'true' or 'false' (case-insensitive)".to_string()),
        Value::Integer(0) => Ok(Value::Bool(false)),
        Value::Integer(1) => Ok(Value::Bool(true)),
        Value::Integer(_) => Err("only 0 and 1 map to bool".to_string()),
        _ => Err("unsupported source type".to_string()),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_int(value: &Value) -> Result<Value, String> {
    match value {
        Value::Integer(_) => Ok(value.clone()),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| e.to_string()),
        Value::Float(f) => {
            let truncated = f.trunc();
            if f.is_finite() && truncated >= i64::MIN as f64 && truncated <= i64::MAX as f64 {
                Ok(Value::Integer(truncated as i64))
            } else {
                Err("float out of integer range".to_string())
            }
        }
        _ => Err("unsupported source type".to_string()),
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_float(value: &Value) -> Result<Value, String> {
    match value {
        Value::Float(_) => Ok(value.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| e.to_string()),
        Value::Integer(i) => Ok(Value::Float(*i as f64)),
        _ => Err("unsupported source type".to_string()),
    }
}

fn to_str(value: &Value) -> Result<Value, String> {
    // Everything stringifies, null and booleans included.
    Ok(Value::String(value.to_string()))
}

fn to_decimal(value: &Value) -> Result<Value, String> {
    match value {
        Value::Decimal(_) => Ok(value.clone()),
        Value::String(s) => Decimal::from_str(s.trim())
            .map(Value::Decimal)
            .map_err(|e| e.to_string()),
        Value::Integer(i) => Ok(Value::Decimal(Decimal::from(*i))),
        // Accepted with the precision loss inherent to binary floats.
        Value::Float(f) => Decimal::from_f64(*f)
            .map(Value::Decimal)
            .ok_or_else(|| "float not representable as decimal".to_string()),
        _ => Err("unsupported source type".to_string()),
    }
}

fn to_path(value: &Value) -> Result<Value, String> {
    match value {
        Value::Path(_) => Ok(value.clone()),
        Value::String(s) => Ok(Value::Path(PathBuf::from(s))),
        _ => Err("unsupported source type".to_string()),
    }
}

fn to_datetime(value: &Value) -> Result<Value, String> {
    match value {
        Value::DateTime(_) => Ok(value.clone()),
        Value::String(s) => {
            let text = s.trim();
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                return Ok(Value::DateTime(parsed));
            }
            // Naive ISO-8601 falls back to an assumed UTC offset.
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| Value::DateTime(naive.and_utc().fixed_offset()))
                .map_err(|e| e.to_string())
        }
        _ => Err("unsupported source type".to_string()),
    }
}

fn to_date(value: &Value) -> Result<Value, String> {
    match value {
        Value::Date(_) => Ok(value.clone()),
        Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|e| e.to_string()),
        _ => Err("unsupported source type".to_string()),
    }
}

fn to_time(value: &Value) -> Result<Value, String> {
    match value {
        Value::Time(_) => Ok(value.clone()),
        Value::String(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
            .map(Value::Time)
            .map_err(|e| e.to_string()),
        _ => Err("unsupported source type".to_string()),
    }
}

fn to_duration(value: &Value) -> Result<Value, String> {
    match value {
        Value::Duration(_) => Ok(value.clone()),
        // A bare number counts seconds.
        Value::Integer(i) => u64::try_from(*i)
            .map(|secs| Value::Duration(Duration::from_secs(secs)))
            .map_err(|_| "duration cannot be negative".to_string()),
        Value::Float(f) => Duration::try_from_secs_f64(*f)
            .map(Value::Duration)
            .map_err(|e| e.to_string()),
        Value::String(s) => parse_duration_text(s.trim()).map(Value::Duration),
        _ => Err("unsupported source type".to_string()),
    }
}

/// Parses the compound duration grammar: one or more `<magnitude><unit>`
/// tokens, concatenated, with units `w`, `d`, `h`, `m`, `s`, `ms`, `us`.
/// `"1w2d3h"` is one week, two days, and three hours.
fn parse_duration_text(text: &str) -> Result<Duration, String> {
    let mut total = Duration::ZERO;
    let mut consumed = 0usize;

    for caps in DURATION_TOKEN_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() != consumed {
            break; // stray characters before this token; reported below
        }
        consumed = whole.end();

        let magnitude: u64 = caps
            .get(1)
            .map(|m| m.as_str())
            .unwrap_or_default()
            .parse()
            .map_err(|_| "duration magnitude out of range".to_string())?;
        let unit = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

        let step = match unit {
            "w" => magnitude.checked_mul(604_800).map(Duration::from_secs),
            "d" => magnitude.checked_mul(86_400).map(Duration::from_secs),
            "h" => magnitude.checked_mul(3_600).map(Duration::from_secs),
            "m" => magnitude.checked_mul(60).map(Duration::from_secs),
            "s" => Some(Duration::from_secs(magnitude)),
            "ms" => Some(Duration::from_millis(magnitude)),
            "us" => Some(Duration::from_micros(magnitude)),
            other => return Err(format!("unrecognized duration unit '{}'", other)),
        };

        total = step
            .and_then(|step| total.checked_add(step))
            .ok_or_else(|| "duration out of range".to_string())?;
    }

    if consumed == 0 || consumed != text.len() {
        return Err(format!(
            "malformed duration '{}': expected tokens like '1w2d3h' with units w/d/h/m/s/ms/us",
            text
        ));
    }

    Ok(total)
}

fn to_url(value: &Value) -> Result<Value, String> {
    match value {
        Value::Url(_) => Ok(value.clone()),
        Value::String(s) => Url::parse(s.trim())
            .map(Value::Url)
            .map_err(|e| e.to_string()),
        _ => Err("unsupported source type".to_string()),
    }
}

// MARK: --- UNIT TESTS ---

//! Shared JSON wire helpers for the document model.
//!
//! # Responsibility
//! - Define the error raised when a JSON payload cannot become a model value.
//! - Parse and format ids, timestamps and colors in one place.
//!
//! # Invariants
//! - Readers are forward-additive: unknown fields are ignored and absent
//!   fields fall back to the defaults of a freshly created value.
//! - A present but unparseable id is always an error.
//! - Timestamps are UTC with millisecond precision.

use crate::model::geometry::Color;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use log::warn;
use serde::Deserialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Error raised when a JSON payload does not describe a valid model value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Payload shape does not match the expected record.
    Malformed {
        entity: &'static str,
        message: String,
    },
    /// An `id`-like field is present but not a valid UUID.
    InvalidId {
        field: &'static str,
        value: String,
    },
    /// Object `type` code outside the known variant set.
    UnknownObjectType(i64),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed { entity, message } => write!(f, "malformed {entity} json: {message}"),
            Self::InvalidId { field, value } => write!(f, "invalid uuid `{value}` in `{field}`"),
            Self::UnknownObjectType(code) => write!(f, "unknown object type code {code}"),
        }
    }
}

impl Error for SchemaError {}

/// Deserializes one wire record, tagging failures with the entity name.
pub(crate) fn read_record<'de, T: Deserialize<'de>>(
    entity: &'static str,
    value: &'de Value,
) -> SchemaResult<T> {
    if !value.is_object() {
        return Err(SchemaError::Malformed {
            entity,
            message: "expected a json object".to_string(),
        });
    }
    T::deserialize(value).map_err(|err| SchemaError::Malformed {
        entity,
        message: err.to_string(),
    })
}

/// Parses an optional id; absent ids get a fresh v4 value.
pub(crate) fn parse_id(field: &'static str, value: Option<&str>) -> SchemaResult<Uuid> {
    match value {
        None => Ok(Uuid::new_v4()),
        Some(text) => Uuid::parse_str(text).map_err(|_| SchemaError::InvalidId {
            field,
            value: text.to_string(),
        }),
    }
}

/// Current UTC instant truncated to milliseconds.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Formats as RFC 3339 with millisecond precision and a `Z` suffix.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses RFC 3339 or a naive ISO-8601 date-time (read as UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    let parsed = DateTime::parse_from_rfc3339(trimmed)
        .map(|value| value.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|value| value.and_utc())
        })
        .ok()?;
    DateTime::from_timestamp_millis(parsed.timestamp_millis())
}

/// Reads an optional timestamp field; absent or invalid values become now.
pub(crate) fn timestamp_or_now(field: &'static str, value: Option<&str>) -> DateTime<Utc> {
    match value {
        None => now_millis(),
        Some(text) => parse_timestamp(text).unwrap_or_else(|| {
            warn!("event=schema_read module=model status=error field={field} error_code=invalid_timestamp");
            now_millis()
        }),
    }
}

/// Reads an optional color field with a fallback for absent/invalid input.
pub(crate) fn color_or(field: &'static str, value: Option<&str>, fallback: Color) -> Color {
    match value {
        None => fallback,
        Some(text) => Color::from_hex(text).unwrap_or_else(|| {
            warn!("event=schema_read module=model status=error field={field} error_code=invalid_color");
            fallback
        }),
    }
}

/// Clamps a wire integer into the `u32` layer range.
pub(crate) fn clamp_layer(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

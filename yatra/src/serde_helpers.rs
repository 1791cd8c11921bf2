//! Lenient serde adapters for hand-entered and legacy document fields.
//!
//! Registration documents were written by several generations of forms, so
//! timestamps arrive as RFC 3339 strings, plain dates, epoch milliseconds or
//! `{ seconds, nanoseconds }` objects, dates may be empty strings, and text
//! fields cleared in the admin grid are stored as `null`. These adapters read
//! every such shape and write one canonical form back.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

/// Parse any supported timestamp representation.
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            DateTime::parse_from_rfc3339(text)
                .map(|t| t.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    parse_date(text)
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .map(|t| t.and_utc())
                })
        },
        Value::Number(millis) => millis.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, nanos)
        },
        _ => None,
    }
}

/// Parse a `YYYY-MM-DD` date, also accepting a full timestamp prefix.
#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok().or_else(|| {
        text.get(..10)
            .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
    })
}

/// `Option<DateTime<Utc>>` written as RFC 3339, read leniently.
///
/// Unreadable values decode as `None` rather than failing the record.
pub mod timestamp {
    use super::{DateTime, Deserialize, Deserializer, Serializer, Utc, Value, parse_timestamp};

    /// Serialize as an RFC 3339 string
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::ref_option)]
    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(time) => serializer.serialize_str(&time.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize any supported timestamp shape
    ///
    /// # Errors
    ///
    /// Only fails if the input is not valid JSON.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(parse_timestamp))
    }
}

/// `Option<NaiveDate>` written as `YYYY-MM-DD`, read leniently.
pub mod date {
    use super::{Deserialize, Deserializer, NaiveDate, Serializer, Value, parse_date};

    /// Serialize as `YYYY-MM-DD`
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::ref_option)]
    pub fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => serializer.serialize_str(&date.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize a date string; blanks and garbage become `None`
    ///
    /// # Errors
    ///
    /// Only fails if the input is not valid JSON.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(text)) => parse_date(&text),
            _ => None,
        })
    }
}

/// Text of a scalar; `None` for `null`, objects and arrays.
fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `String` field that also reads `null` (as empty) and numbers.
///
/// # Errors
///
/// Only fails if the input is not valid JSON.
pub fn loose_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(scalar_text).unwrap_or_default())
}

/// `Option<String>` field that also reads numbers.
///
/// # Errors
///
/// Only fails if the input is not valid JSON.
pub fn loose_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(scalar_text))
}

/// `bool` field: `null` is false, `"true"`/`"yes"` strings are true.
///
/// # Errors
///
/// Only fails if the input is not valid JSON.
pub fn loose_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::String(text)) => matches!(text.trim().to_lowercase().as_str(), "true" | "yes"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    })
}

/// Any field where `null` means the default.
///
/// # Errors
///
/// Fails if a non-null value does not match `T`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Whole percentage `0..=100` from a number or numeric string.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_percentage(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (number.is_finite() && (0.0..=100.0).contains(&number)).then(|| number.floor() as u8)
}

/// `Option<u8>` percentage; unreadable values become `None`.
///
/// # Errors
///
/// Only fails if the input is not valid JSON.
pub fn loose_percentage<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_percentage))
}

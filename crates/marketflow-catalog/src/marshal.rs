//! Marshalling between JSON values and declared parameter kinds.
//!
//! Coercion never fails: an argument that cannot be converted becomes
//! `Value::Null`, and the receiving method is expected to handle it
//! defensively. This is a contract: a single unparseable element must not
//! abort a whole invocation.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Number, Value};

use crate::types::{AslKind, AslType, EnumTable, Format};

/// Coerce `value` toward the declared type.
pub fn coerce(ty: &AslType, value: Value, enums: &EnumTable) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match &ty.kind {
        AslKind::Null => Value::Null,
        AslKind::Boolean => as_bool(&value).map(Value::Bool).unwrap_or(Value::Null),
        AslKind::Number => coerce_number(value),
        AslKind::String => match &ty.format {
            Some(Format::Timestamp) => parse_timestamp(&value)
                .map(|instant| Value::String(render_timestamp(&instant)))
                .unwrap_or(Value::Null),
            Some(Format::Enum(name)) => coerce_enum(name, &value, enums),
            None => stringify(&value),
        },
        AslKind::Array(element) => match value {
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| coerce(element, item, enums))
                    .collect(),
            ),
            _ => Value::Null,
        },
        // Composites pass through untouched.
        AslKind::Object(_) => value,
    }
}

fn coerce_number(value: Value) -> Value {
    match value {
        Value::Number(_) => value,
        Value::String(text) => {
            let trimmed = text.trim();
            if let Ok(integer) = trimmed.parse::<i64>() {
                return Value::Number(integer.into());
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

fn stringify(value: &Value) -> Value {
    match value {
        Value::String(_) => value.clone(),
        Value::Number(number) => Value::String(number.to_string()),
        Value::Bool(flag) => Value::String(flag.to_string()),
        // Composites pass through raw rather than being flattened to text.
        other => other.clone(),
    }
}

fn coerce_enum(type_name: &str, value: &Value, enums: &EnumTable) -> Value {
    let Some(members) = enums.get(type_name) else {
        return stringify(value);
    };
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => return Value::Null,
    };
    members
        .iter()
        .find(|member| member.eq_ignore_ascii_case(text.trim()))
        .map(|member| Value::String(member.clone()))
        .unwrap_or(Value::Null)
}

/// The argument at `index`, or null past the end.
pub fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&Value::Null)
}

/// `true`/`false`, accepting string forms.
pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Numeric value, accepting string forms.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// ISO-8601 parse, normalised to UTC.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Render an instant in the wire format workflows exchange.
pub fn render_timestamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

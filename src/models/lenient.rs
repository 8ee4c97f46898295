//! # models::lenient
//!
//! Forgiving field decoders for values written by the agent.  The agent is an
//! LLM: quantities arrive as `10`, `10.0`, `"10"` or `null` depending on the
//! day, and a single odd field must not lose the rest of the record.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Number, numeric string, or nothing.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `f64` field that falls back to `0.0` for anything non-numeric.
pub fn f64_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_f64(&value).unwrap_or(0.0))
}

/// `Option<f64>` field; non-numeric values decode as `None`.
pub fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_f64(&value))
}

/// `Option<String>` field; numbers and booleans are rendered, `null` is `None`.
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_text(&value))
}

/// `String` field; `null` and absent read as empty, other scalars are rendered.
pub fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_text(&value).unwrap_or_default())
}

/// `Option<bool>` field; `"true"`/`"false"` strings count, anything else is `None`.
pub fn opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_bool(&value))
}

pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Collection field where `null` means empty.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_f64_accepts_numbers_and_numeric_strings() {
        assert_eq!(as_f64(&json!(10)), Some(10.0));
        assert_eq!(as_f64(&json!(0.25)), Some(0.25));
        assert_eq!(as_f64(&json!(" 12.5 ")), Some(12.5));
        assert_eq!(as_f64(&json!("ten")), None);
        assert_eq!(as_f64(&json!(null)), None);
        assert_eq!(as_f64(&json!(true)), None);
    }

    #[test]
    fn test_as_text_renders_scalars() {
        assert_eq!(as_text(&json!("hi")).as_deref(), Some("hi"));
        assert_eq!(as_text(&json!(42)).as_deref(), Some("42"));
        assert_eq!(as_text(&json!(null)), None);
    }

    #[test]
    fn test_as_bool_accepts_bools_and_bool_strings() {
        assert_eq!(as_bool(&json!(true)), Some(true));
        assert_eq!(as_bool(&json!(" False ")), Some(false));
        assert_eq!(as_bool(&json!("maybe")), None);
        assert_eq!(as_bool(&json!(null)), None);
        assert_eq!(as_bool(&json!(1)), None);
    }
}

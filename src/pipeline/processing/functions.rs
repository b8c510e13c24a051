//! Column expressions used by the transforms.
//!
//! These follow dataframe-engine semantics: a `Null` input yields `Null`, and
//! a cast that cannot be performed yields `Null` instead of an error.

use regex::{NoExpand, Regex};
use serde_json::{Number, Value};

/// Renders a scalar as text. `Null` has no text form.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn double(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

fn to_f64(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Capture `group` of the first match of `re`; empty string when nothing matches
pub fn regexp_extract(value: &Value, re: &Regex, group: usize) -> Value {
    let Some(text) = as_text(value) else {
        return Value::Null;
    };
    let extracted = re
        .captures(&text)
        .and_then(|caps| caps.get(group))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    Value::String(extracted)
}

/// Replace every match of `re` with the literal `replacement`
pub fn regexp_replace(value: &Value, re: &Regex, replacement: &str) -> Value {
    match as_text(value) {
        Some(text) => Value::String(re.replace_all(&text, NoExpand(replacement)).into_owned()),
        None => Value::Null,
    }
}

pub fn cast_double(value: &Value) -> Value {
    to_f64(value).map(double).unwrap_or(Value::Null)
}

/// 32-bit integer cast. Fractional input truncates toward zero; overflow is `Null`.
pub fn cast_int(value: &Value) -> Value {
    let parsed = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i32::try_from(i).ok(),
            None => n.as_f64().and_then(truncate_to_i32),
        },
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i32>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate_to_i32))
        }
        Value::Bool(b) => Some(i32::from(*b)),
        _ => None,
    };
    parsed.map(Value::from).unwrap_or(Value::Null)
}

fn truncate_to_i32(v: f64) -> Option<i32> {
    if !v.is_finite() {
        return None;
    }
    let t = v.trunc();
    (t >= i32::MIN as f64 && t <= i32::MAX as f64).then_some(t as i32)
}

/// `a - b` with both sides coerced to double
pub fn subtract(a: &Value, b: &Value) -> Value {
    match (to_f64(a), to_f64(b)) {
        (Some(a), Some(b)) => double(a - b),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_price_and_quantity() {
        let price = Regex::new(r"([\d.]+)").unwrap();
        let qty = Regex::new(r"\((\d+)\)").unwrap();
        assert_eq!(regexp_extract(&json!("12.34(500)"), &price, 1), json!("12.34"));
        assert_eq!(regexp_extract(&json!("12.34(500)"), &qty, 1), json!("500"));
    }

    #[test]
    fn extract_without_match_is_empty_string() {
        let qty = Regex::new(r"\((\d+)\)").unwrap();
        assert_eq!(regexp_extract(&json!("12.34"), &qty, 1), json!(""));
        assert_eq!(regexp_extract(&Value::Null, &qty, 1), Value::Null);
    }

    #[test]
    fn replace_is_literal() {
        let dollar = Regex::new(r"\$").unwrap();
        assert_eq!(regexp_replace(&json!("$AAPL"), &dollar, ""), json!("AAPL"));
        let pct = Regex::new("%").unwrap();
        assert_eq!(regexp_replace(&json!("5%"), &pct, "$1"), json!("5$1"));
    }

    #[test]
    fn replace_renders_numbers_as_text() {
        let pct = Regex::new("%").unwrap();
        assert_eq!(regexp_replace(&json!(1.5), &pct, ""), json!("1.5"));
    }

    #[test]
    fn cast_double_parses_trimmed_strings() {
        assert_eq!(cast_double(&json!(" -1.25 ")), json!(-1.25));
        assert_eq!(cast_double(&json!(7)), json!(7.0));
    }

    #[test]
    fn failed_casts_are_null() {
        assert_eq!(cast_double(&json!("")), Value::Null);
        assert_eq!(cast_double(&json!("1.2.3")), Value::Null);
        assert_eq!(cast_double(&json!("NaN")), Value::Null);
        assert_eq!(cast_int(&json!("abc")), Value::Null);
        assert_eq!(cast_int(&json!("99999999999")), Value::Null);
    }

    #[test]
    fn cast_int_truncates_fractions() {
        assert_eq!(cast_int(&json!("500")), json!(500));
        assert_eq!(cast_int(&json!("12.9")), json!(12));
        assert_eq!(cast_int(&json!(-3.7)), json!(-3));
    }

    #[test]
    fn subtract_coerces_strings() {
        assert_eq!(subtract(&json!("10.5"), &json!(0.5)), json!(10.0));
        assert_eq!(subtract(&json!("x"), &json!(1)), Value::Null);
        assert_eq!(subtract(&Value::Null, &json!(1)), Value::Null);
    }
}

//! Lenient numeric reading of model-produced JSON
//!
//! Models emit prices as numbers, numeric strings or garbage. Anything that
//! is not a number reads as NaN, which fails every comparison.

use serde_json::Value;

/// Read a JSON value as a float; missing or non-numeric values are NaN
pub fn number_or_nan(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => f64::NAN,
    }
}

/// `None` for NaN, the value otherwise
pub fn defined(value: f64) -> Option<f64> {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_or_nan() {
        assert_eq!(number_or_nan(Some(&json!(50))), 50.0);
        assert_eq!(number_or_nan(Some(&json!(" 72.5 "))), 72.5);
        assert!(number_or_nan(Some(&json!("fifty"))).is_nan());
        assert!(number_or_nan(Some(&json!(null))).is_nan());
        assert!(number_or_nan(None).is_nan());
    }

    #[test]
    fn test_defined() {
        assert_eq!(defined(1.5), Some(1.5));
        assert_eq!(defined(f64::NAN), None);
    }
}

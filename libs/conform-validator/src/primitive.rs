//! Primitive type checker: regex and numeric-shape validation for leaf
//! values, dispatched on a resolved element's type code (§4.4).

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s]+( [^\s]+)*$").unwrap());
static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9.\-]{1,64}$").unwrap());
static OID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^urn:oid:[012](\.(0|[1-9]\d*))+$").unwrap());
static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^urn:uuid:[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}(-(0[1-9]|1[0-2])(-(0[1-9]|[12]\d|3[01]))?)?$").unwrap());
static TIME_PORTION: &str = r"([01]\d|2[0-3]):[0-5]\d:[0-5]\d(\.\d+)?(Z|[+\-]\d{2}:\d{2})";
static DATE_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\d{{4}}(-(0[1-9]|1[0-2])(-(0[1-9]|[12]\d|3[01])(T{TIME_PORTION})?)?)?$"
    ))
    .unwrap()
});
static INSTANT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\d{{4}}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])T{TIME_PORTION}$"
    ))
    .unwrap()
});
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d:[0-5]\d(\.\d+)?$").unwrap());

/// Whether a JSON value matches the declared shape/grammar for `type_code`.
/// Returns `Ok(())` or a human-readable mismatch description.
pub fn check(type_code: &str, value: &Value) -> Result<(), String> {
    match type_code {
        "boolean" => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err("expected a boolean".to_string())
            }
        }
        "integer" => check_integer(value, None),
        "positiveInt" => check_integer(value, Some(|n| n > 0)),
        "unsignedInt" => check_integer(value, Some(|n| n >= 0)),
        "decimal" => {
            if value.is_number() {
                Ok(())
            } else {
                Err("expected a decimal".to_string())
            }
        }
        "string" | "markdown" | "uri" | "url" | "canonical" => {
            if value.is_string() {
                Ok(())
            } else {
                Err(format!("expected a {type_code}"))
            }
        }
        "code" => check_string_pattern(value, &CODE_RE, "code"),
        "id" => check_string_pattern(value, &ID_RE, "id"),
        "oid" => check_string_pattern(value, &OID_RE, "oid"),
        "uuid" => check_string_pattern(value, &UUID_RE, "uuid"),
        "date" => check_string_pattern(value, &DATE_RE, "date"),
        "dateTime" => check_string_pattern(value, &DATE_TIME_RE, "dateTime"),
        "instant" => check_string_pattern(value, &INSTANT_RE, "instant"),
        "time" => check_string_pattern(value, &TIME_RE, "time"),
        "base64Binary" => {
            if value.is_string() {
                Ok(())
            } else {
                Err("expected a base64Binary string".to_string())
            }
        }
        _ => Ok(()), // complex types and unrecognized codes aren't this checker's concern
    }
}

fn check_integer(value: &Value, constraint: Option<fn(i64) -> bool>) -> Result<(), String> {
    let n = match value.as_i64() {
        Some(n) => n,
        None => match value.as_f64() {
            Some(f) if f.fract() == 0.0 => f as i64,
            _ => return Err("expected an integer-valued number".to_string()),
        },
    };
    match constraint {
        Some(f) if !f(n) => Err(format!("integer {n} is out of the allowed range")),
        _ => Ok(()),
    }
}

fn check_string_pattern(value: &Value, re: &Regex, label: &str) -> Result<(), String> {
    match value.as_str() {
        Some(s) if re.is_match(s) => Ok(()),
        Some(s) => Err(format!("'{s}' is not a valid {label}")),
        None => Err(format!("expected a {label} string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn boolean_rejects_string() {
        assert!(check("boolean", &json!("yes")).is_err());
    }

    #[test]
    fn date_accepts_partial_precision() {
        assert!(check("date", &json!("1990")).is_ok());
        assert!(check("date", &json!("1990-01")).is_ok());
        assert!(check("date", &json!("1990-01-01")).is_ok());
        assert!(check("date", &json!("not-a-date")).is_err());
    }

    #[test]
    fn date_time_requires_valid_time_zone_when_time_present() {
        assert!(check("dateTime", &json!("2020-01-01T10:00:00Z")).is_ok());
        assert!(check("dateTime", &json!("2020-01-01T10:00:00")).is_err());
    }

    #[test]
    fn instant_requires_full_precision() {
        assert!(check("instant", &json!("2020-01-01T10:00:00Z")).is_ok());
        assert!(check("instant", &json!("2020-01-01")).is_err());
    }

    #[test]
    fn positive_int_rejects_zero() {
        assert!(check("positiveInt", &json!(1)).is_ok());
        assert!(check("positiveInt", &json!(0)).is_err());
    }

    #[test]
    fn id_rejects_overlong_strings() {
        let long = "a".repeat(65);
        assert!(check("id", &json!(long)).is_err());
    }

    #[test]
    fn uuid_requires_urn_prefix() {
        assert!(check("uuid", &json!("urn:uuid:123e4567-e89b-12d3-a456-426614174000")).is_ok());
        assert!(check("uuid", &json!("123e4567-e89b-12d3-a456-426614174000")).is_err());
    }
}

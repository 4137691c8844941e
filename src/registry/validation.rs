//! Parameter validation.
//!
//! One pure predicate per parameter type, applied to the value exactly as
//! received. Nothing here performs I/O: dynamic select suppliers are never
//! consulted and free-text dates are never parsed.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

use crate::error::RegistryError;
use crate::model::{
    Command, DateSpec, FileDelivery, FileSpec, NumberSpec, Parameter, ParameterKind, SelectSpec,
};

/// Why a value does not satisfy its parameter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Invalid {
    #[error("no value supplied")]
    Missing,
    #[error("expected a {expected}")]
    WrongType { expected: &'static str },
    #[error("value is blank")]
    Blank,
    #[error("value is outside the allowed range")]
    OutOfRange,
    #[error("not an ISO calendar date (YYYY-MM-DD)")]
    NotIsoDate,
    #[error("not one of the allowed options")]
    NotAnOption,
    #[error("not a {delivery} delivery")]
    WrongDelivery { delivery: &'static str },
}

/// Check `value` (absent or JSON `null` counts as missing) against `param`.
pub fn validate_value(param: &Parameter, value: Option<&Value>) -> Result<(), Invalid> {
    let value = match value {
        None | Some(Value::Null) => return Err(Invalid::Missing),
        Some(v) => v,
    };
    match &param.kind {
        ParameterKind::String(_) => validate_string(value),
        ParameterKind::Number(spec) => validate_number(spec, value),
        ParameterKind::Date(spec) => validate_date(spec, value),
        ParameterKind::Select(spec) => validate_select(spec, value),
        ParameterKind::File(spec) => validate_file(spec, value),
    }
}

fn validate_string(value: &Value) -> Result<(), Invalid> {
    let s = value.as_str().ok_or(Invalid::WrongType { expected: "string" })?;
    if s.trim().is_empty() {
        return Err(Invalid::Blank);
    }
    Ok(())
}

fn validate_number(spec: &NumberSpec, value: &Value) -> Result<(), Invalid> {
    let n = value
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or(Invalid::WrongType { expected: "number" })?;
    if spec.min.is_some_and(|min| n < min) || spec.max.is_some_and(|max| n > max) {
        return Err(Invalid::OutOfRange);
    }
    Ok(())
}

fn validate_date(spec: &DateSpec, value: &Value) -> Result<(), Invalid> {
    let s = value.as_str().ok_or(Invalid::WrongType { expected: "date string" })?;
    let date = parse_iso_date(s).ok_or(Invalid::NotIsoDate)?;
    let min = spec.min.as_deref().and_then(parse_iso_date);
    let max = spec.max.as_deref().and_then(parse_iso_date);
    if min.is_some_and(|min| date < min) || max.is_some_and(|max| date > max) {
        return Err(Invalid::OutOfRange);
    }
    Ok(())
}

fn validate_select(spec: &SelectSpec, value: &Value) -> Result<(), Invalid> {
    let s = value.as_str().ok_or(Invalid::WrongType { expected: "string" })?;
    if spec.is_dynamic() {
        // Options only the UI knows about: any non-empty choice is provisionally valid.
        return if s.trim().is_empty() { Err(Invalid::Blank) } else { Ok(()) };
    }
    if spec.options.iter().any(|o| o.value == s) {
        Ok(())
    } else {
        Err(Invalid::NotAnOption)
    }
}

fn validate_file(spec: &FileSpec, value: &Value) -> Result<(), Invalid> {
    let shaped = |v: &Value| match spec.delivery {
        FileDelivery::File => is_file_handle(v),
        FileDelivery::Base64 => is_data_url(v),
    };
    let ok = match value {
        Value::Array(items) if spec.multiple => !items.is_empty() && items.iter().all(shaped),
        single => shaped(single),
    };
    if ok {
        Ok(())
    } else {
        Err(Invalid::WrongDelivery {
            delivery: match spec.delivery {
                FileDelivery::File => "file handle",
                FileDelivery::Base64 => "data: URL",
            },
        })
    }
}

fn is_file_handle(value: &Value) -> bool {
    value
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|name| !name.trim().is_empty())
}

fn is_data_url(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.starts_with("data:") && s.contains(','))
}

/// Parse a strict `YYYY-MM-DD` calendar date. Rejects short forms such as
/// `2026-1-8` and anything that is not a real day.
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let shape_ok = s.len() == 10
        && s.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

// ── Registration checks ─────────────────────────────────────────

/// Reject commands that could never be completed or matched.
pub fn validate_command(command: &Command) -> Result<(), RegistryError> {
    let invalid = |reason: String| RegistryError::InvalidCommand {
        trigger: command.command.clone(),
        reason,
    };

    if command.command.trim().is_empty() {
        return Err(invalid("trigger phrase is empty".to_string()));
    }
    if command.id.as_deref().is_some_and(|id| id.trim().is_empty()) {
        return Err(invalid("id is empty".to_string()));
    }

    let mut seen = HashSet::new();
    for param in &command.parameters {
        if param.name.trim().is_empty() {
            return Err(invalid("parameter with an empty name".to_string()));
        }
        if !seen.insert(param.name.as_str()) {
            return Err(invalid(format!("duplicate parameter \"{}\"", param.name)));
        }
        match &param.kind {
            ParameterKind::Number(spec) => {
                if let (Some(min), Some(max)) = (spec.min, spec.max) {
                    if min > max {
                        return Err(invalid(format!(
                            "parameter \"{}\" has min {min} > max {max}",
                            param.name
                        )));
                    }
                }
            }
            ParameterKind::Date(spec) => {
                let min = check_bound(&param.name, spec.min.as_deref()).map_err(invalid)?;
                let max = check_bound(&param.name, spec.max.as_deref()).map_err(invalid)?;
                if let (Some(min), Some(max)) = (min, max) {
                    if min > max {
                        return Err(invalid(format!(
                            "parameter \"{}\" has min date after max date",
                            param.name
                        )));
                    }
                }
            }
            ParameterKind::Select(spec) => {
                if spec.options.is_empty() && !spec.is_dynamic() {
                    return Err(invalid(format!(
                        "select parameter \"{}\" has no options",
                        param.name
                    )));
                }
            }
            ParameterKind::String(_) | ParameterKind::File(_) => {}
        }
    }
    Ok(())
}

fn check_bound(name: &str, bound: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match bound {
        None => Ok(None),
        Some(b) => parse_iso_date(b)
            .map(Some)
            .ok_or_else(|| format!("parameter \"{name}\" has a non-ISO date bound \"{b}\"")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::{CommandAction, SelectOption};

    fn check(param: &Parameter, value: Value) -> Result<(), Invalid> {
        validate_value(param, Some(&value))
    }

    #[test]
    fn missing_and_null_are_missing() {
        let p = Parameter::string("name");
        assert_eq!(validate_value(&p, None), Err(Invalid::Missing));
        assert_eq!(check(&p, Value::Null), Err(Invalid::Missing));
    }

    #[test]
    fn string_rejects_blank_and_non_strings() {
        let p = Parameter::string("fullName");
        assert!(check(&p, json!("Ada Lovelace")).is_ok());
        assert_eq!(check(&p, json!("   ")), Err(Invalid::Blank));
        assert_eq!(check(&p, json!("")), Err(Invalid::Blank));
        assert!(matches!(check(&p, json!(42)), Err(Invalid::WrongType { .. })));
    }

    #[test]
    fn number_respects_bounds() {
        let p = Parameter::number_in("age", Some(18.0), Some(99.0));
        assert!(check(&p, json!(30)).is_ok());
        assert!(check(&p, json!(18)).is_ok());
        assert!(check(&p, json!(99.0)).is_ok());
        assert_eq!(check(&p, json!(17)), Err(Invalid::OutOfRange));
        assert_eq!(check(&p, json!(100)), Err(Invalid::OutOfRange));
    }

    #[test]
    fn number_rejects_numeric_strings() {
        let p = Parameter::number("age");
        assert!(matches!(check(&p, json!("30")), Err(Invalid::WrongType { .. })));
        assert!(check(&p, json!(-5.5)).is_ok());
    }

    #[test]
    fn date_requires_strict_iso() {
        let p = Parameter::date("date");
        assert!(check(&p, json!("2026-01-08")).is_ok());
        assert_eq!(check(&p, json!("next week thursday")), Err(Invalid::NotIsoDate));
        assert_eq!(check(&p, json!("2026-1-8")), Err(Invalid::NotIsoDate));
        assert_eq!(check(&p, json!("2026-02-30")), Err(Invalid::NotIsoDate));
        assert_eq!(check(&p, json!("2026-01-08T10:00:00Z")), Err(Invalid::NotIsoDate));
    }

    #[test]
    fn date_respects_bounds() {
        let p = Parameter::new(
            "date",
            ParameterKind::Date(DateSpec {
                min: Some("2026-01-01".to_string()),
                max: Some("2026-12-31".to_string()),
                default_value: None,
            }),
        );
        assert!(check(&p, json!("2026-06-15")).is_ok());
        assert_eq!(check(&p, json!("2025-12-31")), Err(Invalid::OutOfRange));
        assert_eq!(check(&p, json!("2027-01-01")), Err(Invalid::OutOfRange));
    }

    #[test]
    fn select_matches_static_values_only() {
        let p = Parameter::select(
            "plan",
            vec![SelectOption::new("Basic", "basic"), SelectOption::new("Pro", "pro")],
        );
        assert!(check(&p, json!("pro")).is_ok());
        assert_eq!(check(&p, json!("Pro")), Err(Invalid::NotAnOption));
        assert_eq!(check(&p, json!("enterprise")), Err(Invalid::NotAnOption));
    }

    #[test]
    fn dynamic_select_is_permissive() {
        let p = Parameter::new(
            "city",
            ParameterKind::Select(SelectSpec {
                dynamic_options: true,
                ..SelectSpec::default()
            }),
        );
        assert!(check(&p, json!("anything the UI offered")).is_ok());
        assert_eq!(check(&p, json!("  ")), Err(Invalid::Blank));
    }

    #[test]
    fn file_checks_delivery_shape() {
        let handle = Parameter::file("attachment", FileDelivery::File);
        assert!(check(&handle, json!({ "name": "report.csv", "size": 12 })).is_ok());
        assert!(check(&handle, json!("csv file")).is_err());

        let b64 = Parameter::file("attachment", FileDelivery::Base64);
        assert!(check(&b64, json!("data:text/csv;base64,SGVsbG8sV29ybGQ=")).is_ok());
        assert!(check(&b64, json!({ "name": "report.csv" })).is_err());
        assert!(check(&b64, json!("csv file")).is_err());
    }

    #[test]
    fn multiple_files_accept_arrays() {
        let p = Parameter::new(
            "photos",
            ParameterKind::File(FileSpec {
                multiple: true,
                ..FileSpec::default()
            }),
        );
        assert!(check(&p, json!([{ "name": "a.png" }, { "name": "b.png" }])).is_ok());
        assert!(check(&p, json!([])).is_err());
        assert!(check(&p, json!([{ "name": "a.png" }, "b.png"])).is_err());

        let single = Parameter::file("photo", FileDelivery::File);
        assert!(check(&single, json!([{ "name": "a.png" }])).is_err());
    }

    #[test]
    fn command_shape_checks() {
        let action = CommandAction::sync(|_| ());
        let ok = Command::new("book", action.clone()).parameter(Parameter::string("service"));
        assert!(validate_command(&ok).is_ok());

        let blank = Command::new("  ", action.clone());
        assert!(validate_command(&blank).is_err());

        let dup = Command::new("book", action.clone())
            .parameter(Parameter::string("service"))
            .parameter(Parameter::date("service"));
        assert!(validate_command(&dup).is_err());

        let no_opts = Command::new("pick", action.clone()).parameter(Parameter::select("x", vec![]));
        assert!(validate_command(&no_opts).is_err());

        let inverted = Command::new("age", action.clone())
            .parameter(Parameter::number_in("age", Some(10.0), Some(1.0)));
        assert!(validate_command(&inverted).is_err());

        let bad_bound = Command::new("when", action).parameter(Parameter::new(
            "date",
            ParameterKind::Date(DateSpec {
                min: Some("tomorrow".to_string()),
                ..DateSpec::default()
            }),
        ));
        assert!(validate_command(&bad_bound).is_err());
    }
}

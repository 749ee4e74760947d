//! Parameter value handling: defaults, text coercion, visibility and the
//! final parameter map sent to the backend.

use crate::error::{ForgeError, Result};
use crate::schema::spec::{FieldKind, ParameterSpec};
use serde_json::{Map, Value};

pub type ParameterValues = Map<String, Value>;

/// Declared defaults of every field that has one
pub fn defaults(specs: &[ParameterSpec]) -> ParameterValues {
    specs
        .iter()
        .filter_map(|s| s.default.clone().map(|d| (s.key.clone(), d)))
        .collect()
}

/// Parse raw user text for a field into a typed value.
///
/// Empty text maps to `Null` for optional fields. Unparseable text is a
/// `MalformedInput` error and must never be submitted.
pub fn coerce_text(spec: &ParameterSpec, raw: &str) -> Result<Value> {
    let text = raw.trim();
    let value = match &spec.kind {
        FieldKind::Text { .. } => Value::String(raw.to_string()),
        FieldKind::Number { integer, nullable, .. } => {
            if text.is_empty() {
                if *nullable || !spec.required {
                    Value::Null
                } else {
                    return Err(ForgeError::malformed(&spec.key, "a number is required"));
                }
            } else if *integer {
                text.parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| ForgeError::malformed(&spec.key, format!("'{text}' is not an integer")))?
            } else {
                text.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| ForgeError::malformed(&spec.key, format!("'{text}' is not a number")))?
            }
        }
        FieldKind::Enum { .. } => Value::String(text.to_string()),
        FieldKind::Flag => match text.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Value::Bool(true),
            "false" | "no" | "0" | "off" | "" => Value::Bool(false),
            _ => return Err(ForgeError::malformed(&spec.key, format!("'{text}' is not a boolean"))),
        },
        FieldKind::Columns { .. } => Value::Array(
            text.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(|c| Value::String(c.to_string()))
                .collect(),
        ),
        FieldKind::RenameMap { .. } | FieldKind::Json { .. } => {
            if text.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(text)
                    .map_err(|e| ForgeError::malformed(&spec.key, e.to_string()))?
            }
        }
    };
    check_value(spec, &value)?;
    Ok(value)
}

/// Check an already-typed value against the field's constraints
pub fn check_value(spec: &ParameterSpec, value: &Value) -> Result<()> {
    if value.is_null() {
        return Ok(());
    }
    let bad = |reason: String| Err(ForgeError::malformed(&spec.key, reason));
    match &spec.kind {
        FieldKind::Number { min, max, integer, .. } => {
            let Some(n) = value.as_f64() else {
                return bad(format!("expected a number, got {value}"));
            };
            if *integer && n.fract() != 0.0 {
                return bad(format!("{n} is not an integer"));
            }
            if let Some(lo) = min.filter(|lo| n < *lo) {
                return bad(format!("{n} is below the minimum {lo}"));
            }
            if let Some(hi) = max.filter(|hi| n > *hi) {
                return bad(format!("{n} is above the maximum {hi}"));
            }
            Ok(())
        }
        FieldKind::Enum { options } => match value.as_str() {
            Some(v) if options.is_empty() || options.iter().any(|o| o.value == v) => Ok(()),
            _ => bad(format!("{value} is not one of the allowed options")),
        },
        FieldKind::Columns { options } => {
            let Some(items) = value.as_array() else {
                return bad("expected a list of columns".to_string());
            };
            match items.iter().find(|c| !c.as_str().is_some_and(|c| options.iter().any(|o| o == c))) {
                Some(unknown) => bad(format!("unknown column {unknown}")),
                None => Ok(()),
            }
        }
        FieldKind::RenameMap { columns } => {
            let Some(map) = value.as_object() else {
                return bad("expected an object of old to new names".to_string());
            };
            if let Some(old) = map.keys().find(|k| !columns.contains(k)) {
                return bad(format!("unknown column '{old}'"));
            }
            match map.values().find(|v| !v.is_string()) {
                Some(v) => bad(format!("new name {v} is not text")),
                None => Ok(()),
            }
        }
        FieldKind::Flag if !value.is_boolean() => bad(format!("{value} is not a boolean")),
        _ => Ok(()),
    }
}

/// Drop column references that no longer exist in `columns`.
///
/// Column lists keep only present names; rename maps keep only present
/// keys. A value that empties out is removed entirely.
pub fn retain_present_columns(specs: &[ParameterSpec], values: &mut ParameterValues, columns: &[String]) {
    let present = |name: &str| columns.iter().any(|c| c == name);
    for spec in specs.iter().filter(|s| s.kind.references_columns()) {
        let Some(value) = values.get_mut(&spec.key) else {
            continue;
        };
        let emptied = match value {
            Value::Array(items) => {
                items.retain(|c| c.as_str().is_some_and(present));
                items.is_empty()
            }
            Value::Object(map) => {
                map.retain(|k, _| present(k));
                map.is_empty()
            }
            _ => false,
        };
        if emptied {
            values.remove(&spec.key);
        }
    }
}

/// Whether `key` is visible given the current values.
///
/// A field is visible when its condition holds and the field it depends on
/// is itself visible. Conditions form a shallow acyclic chain; the walk is
/// bounded by the number of fields.
pub fn is_visible(specs: &[ParameterSpec], values: &ParameterValues, key: &str) -> bool {
    let mut current = key;
    for _ in 0..=specs.len() {
        let Some(spec) = specs.iter().find(|s| s.key == current) else {
            return true;
        };
        let Some(cond) = &spec.visible_when else {
            return true;
        };
        let actual = values
            .get(&cond.key)
            .or_else(|| specs.iter().find(|s| s.key == cond.key).and_then(|s| s.default.as_ref()));
        if actual != Some(&cond.equals) {
            return false;
        }
        current = &cond.key;
    }
    false
}

/// Keys of visible required fields that have no usable value
pub fn missing_required(specs: &[ParameterSpec], values: &ParameterValues) -> Vec<String> {
    specs
        .iter()
        .filter(|s| s.required && is_visible(specs, values, &s.key))
        .filter(|s| match values.get(&s.key) {
            None | Some(Value::Null) => true,
            Some(Value::String(t)) => t.trim().is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(Value::Object(map)) => map.is_empty(),
            Some(_) => false,
        })
        .map(|s| s.key.clone())
        .collect()
}

/// Validate the visible values and check required fields
pub fn validate(specs: &[ParameterSpec], values: &ParameterValues) -> Result<()> {
    for spec in specs.iter().filter(|s| is_visible(specs, values, &s.key)) {
        if let Some(value) = values.get(&spec.key) {
            check_value(spec, value)?;
        }
    }
    let missing = missing_required(specs, values);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ForgeError::validation(format!("Missing required parameters: {}", missing.join(", "))))
    }
}

/// The parameter map to submit: hidden fields are dropped, keys with no
/// declared field (e.g. model defaults such as `random_state`) pass through.
pub fn submission_params(specs: &[ParameterSpec], values: &ParameterValues) -> ParameterValues {
    values
        .iter()
        .filter(|(key, _)| is_visible(specs, values, key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

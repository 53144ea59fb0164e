//! Request body validation for `/predict`.
//!
//! Every field problem is collected rather than stopping at the first one, so
//! a caller sees the full list in a single 400 response.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::schema::{Categorical, FeatureRecord, Island, Sex, UnknownColumn};

/// One field-level validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Path to the offending value, starting with `"body"`.
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl FieldError {
    fn body(kind: &'static str, msg: impl Into<String>) -> Self {
        Self {
            loc: vec!["body".to_string()],
            msg: msg.into(),
            kind,
        }
    }

    fn field(name: &str, kind: &'static str, msg: impl Into<String>) -> Self {
        Self {
            loc: vec!["body".to_string(), name.to_string()],
            msg: msg.into(),
            kind,
        }
    }

    /// A valid input that produced a column the model was not trained on.
    pub fn unknown_column(unknown: &UnknownColumn) -> Self {
        match unknown.category {
            Some(value) => Self::field(
                unknown.field,
                "unseen_category",
                format!("Category '{value}' was not present in the model's training data"),
            ),
            None => Self::field(
                unknown.field,
                "unused_field",
                "Field was not used when the model was trained",
            ),
        }
    }
}

/// Parse and validate a JSON request body into a record.
pub fn parse_record(body: &[u8]) -> Result<FeatureRecord, Vec<FieldError>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(vec![FieldError::body("missing", "Field required")]);
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| vec![FieldError::body("json_invalid", format!("JSON decode error: {err}"))])?;
    let Value::Object(fields) = value else {
        return Err(vec![FieldError::body(
            "model_attributes_type",
            "Input should be a valid dictionary or object",
        )]);
    };

    let mut errors = Vec::new();
    let parsed = (
        float_field(&fields, "bill_length_mm", &mut errors),
        float_field(&fields, "bill_depth_mm", &mut errors),
        float_field(&fields, "flipper_length_mm", &mut errors),
        float_field(&fields, "body_mass_g", &mut errors),
        int_field(&fields, "year", &mut errors),
        enum_field::<Sex>(&fields, &mut errors),
        enum_field::<Island>(&fields, &mut errors),
    );
    let (
        Some(bill_length_mm),
        Some(bill_depth_mm),
        Some(flipper_length_mm),
        Some(body_mass_g),
        Some(year),
        Some(sex),
        Some(island),
    ) = parsed
    else {
        return Err(errors);
    };
    Ok(FeatureRecord {
        bill_length_mm,
        bill_depth_mm,
        flipper_length_mm,
        body_mass_g,
        year,
        sex,
        island,
    })
}

fn required<'a>(
    fields: &'a Map<String, Value>,
    name: &str,
    errors: &mut Vec<FieldError>,
) -> Option<&'a Value> {
    match fields.get(name) {
        Some(Value::Null) | None => {
            errors.push(FieldError::field(name, "missing", "Field required"));
            None
        }
        Some(value) => Some(value),
    }
}

fn float_field(fields: &Map<String, Value>, name: &str, errors: &mut Vec<FieldError>) -> Option<f64> {
    let value = required(fields, name, errors)?;
    let parsed = match value {
        Value::String(text) => numeric_text(text)
            .and_then(|text| text.parse::<f64>().ok())
            .filter(|value| value.is_finite()),
        other => other.as_f64(),
    };
    if parsed.is_none() {
        errors.push(FieldError::field(
            name,
            "float_type",
            "Input should be a valid number",
        ));
    }
    parsed
}

fn int_field(fields: &Map<String, Value>, name: &str, errors: &mut Vec<FieldError>) -> Option<i64> {
    let value = required(fields, name, errors)?;
    if let Value::String(text) = value {
        let parsed = numeric_text(text).and_then(|text| {
            let whole = match text.split_once('.') {
                Some((whole, fraction)) if fraction.chars().all(|c| c == '0') => whole,
                _ => text,
            };
            whole.parse::<i64>().ok()
        });
        if parsed.is_none() {
            errors.push(FieldError::field(
                name,
                "int_parsing",
                "Input should be a valid integer, unable to parse string as an integer",
            ));
        }
        return parsed;
    }
    if let Some(int) = value.as_i64() {
        return Some(int);
    }
    match value.as_f64() {
        Some(float) if float.fract() == 0.0 && float.abs() < i64::MAX as f64 => Some(float as i64),
        Some(_) => {
            errors.push(FieldError::field(
                name,
                "int_from_float",
                "Input should be a valid integer, got a number with a fractional part",
            ));
            None
        }
        None => {
            errors.push(FieldError::field(name, "int_type", "Input should be a valid integer"));
            None
        }
    }
}

/// Trimmed text of a numeric string, refusing spellings like `inf` or `NaN`
/// that `str::parse` would otherwise accept.
fn numeric_text(text: &str) -> Option<&str> {
    let text = text.trim();
    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    let numeric = digits.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && digits
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'));
    numeric.then_some(text)
}

fn enum_field<C: Categorical>(fields: &Map<String, Value>, errors: &mut Vec<FieldError>) -> Option<C> {
    let value = required(fields, C::FIELD, errors)?;
    let parsed = value.as_str().and_then(C::parse);
    if parsed.is_none() {
        errors.push(FieldError::field(
            C::FIELD,
            "enum",
            format!("Input should be {}", expected_values::<C>()),
        ));
    }
    parsed
}

/// `'a', 'b' or 'c'`
fn expected_values<C: Categorical>() -> String {
    let quoted: Vec<String> = C::VALUES
        .iter()
        .map(|value| format!("'{}'", value.as_str()))
        .collect();
    match quoted.split_last() {
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {last}", rest.join(", ")),
        None => String::new(),
    }
}

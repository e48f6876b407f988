//! Schema checks for raw submissions.
//!
//! Producers send JSON bodies. These functions turn a body into a typed
//! [`Event`] or report the first field that does not match. Unknown fields,
//! including any producer-supplied `id`, are ignored.

use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::event::{Event, EventKind, TestResult, UsageLog};

/// Validate a raw body as an event of the given kind.
pub fn validate(kind: EventKind, raw: &Value) -> Result<Event, ValidationError> {
    match kind {
        EventKind::TestResult => validate_test_result(raw).map(Event::from),
        EventKind::UsageLog => validate_usage_log(raw).map(Event::from),
    }
}

/// Validate a `{type, timestamp, result}` body.
pub fn validate_test_result(raw: &Value) -> Result<TestResult, ValidationError> {
    let fields = as_object(raw)?;
    Ok(TestResult {
        kind: string_field(fields, "type")?,
        timestamp: string_field(fields, "timestamp")?,
        payload: object_field(fields, "result")?,
    })
}

/// Validate a `{domain, timestamp, duration}` body.
pub fn validate_usage_log(raw: &Value) -> Result<UsageLog, ValidationError> {
    let fields = as_object(raw)?;
    Ok(UsageLog {
        domain: string_field(fields, "domain")?,
        timestamp: string_field(fields, "timestamp")?,
        duration: integer_field(fields, "duration")?,
    })
}

fn as_object(raw: &Value) -> Result<&Map<String, Value>, ValidationError> {
    raw.as_object().ok_or(ValidationError::NotAnObject)
}

fn required<'a>(
    fields: &'a Map<String, Value>,
    name: &'static str,
) -> Result<&'a Value, ValidationError> {
    match fields.get(name) {
        None | Some(Value::Null) => Err(ValidationError::MissingField(name)),
        Some(value) => Ok(value),
    }
}

fn string_field(fields: &Map<String, Value>, name: &'static str) -> Result<String, ValidationError> {
    required(fields, name)?
        .as_str()
        .map(str::to_owned)
        .ok_or(ValidationError::WrongType {
            field: name,
            expected: "a string",
        })
}

fn object_field(
    fields: &Map<String, Value>,
    name: &'static str,
) -> Result<Map<String, Value>, ValidationError> {
    required(fields, name)?
        .as_object()
        .cloned()
        .ok_or(ValidationError::WrongType {
            field: name,
            expected: "an object",
        })
}

fn integer_field(fields: &Map<String, Value>, name: &'static str) -> Result<i64, ValidationError> {
    required(fields, name)?
        .as_i64()
        .ok_or(ValidationError::WrongType {
            field: name,
            expected: "an integer",
        })
}

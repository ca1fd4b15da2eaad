//! Request validation shared by the API layer.
//!
//! Every check runs against the raw JSON body before it is decoded into a
//! typed input, so a rejected request never reaches the store.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// Field key of the pinned serial-number column.
pub const SERIAL_NO_FIELD: &str = "serialNo";

/// Row attributes managed by the server; never usable as a bulk column.
pub const RESERVED_ROW_KEYS: &[&str] = &["_id", SERIAL_NO_FIELD, "completed", "createdAt", "updatedAt"];

/// Largest accepted `serialNo`: the largest integer a JSON client can hold
/// exactly as a double.
pub const MAX_SERIAL_NO: u64 = (1 << 53) - 1;

static FIELD_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_$][a-zA-Z0-9_$]*$").expect("field key pattern"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));

/// A request body rejected before reaching the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

pub type ValidationResult<T = ()> = Result<T, ValidationError>;

/// Identifier-like: leading letter, `_` or `$`, then letters, digits, `_` or `$`.
pub fn is_valid_field_key(key: &str) -> bool {
    FIELD_KEY_RE.is_match(key)
}

pub fn is_reserved_row_key(key: &str) -> bool {
    RESERVED_ROW_KEYS.contains(&key)
}

fn as_object(body: &Value) -> ValidationResult<&Map<String, Value>> {
    body.as_object()
        .ok_or_else(|| ValidationError::new("Request body must be a JSON object"))
}

/// Present and not `null`.
fn provided<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn check_field_key(field: &str) -> ValidationResult {
    if is_valid_field_key(field) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "Field name must be a valid identifier (letter, _ or $ followed by letters, digits, _ or $)",
        ))
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|n| u32::try_from(n).ok())
}

/// Checks shared by full and partial column bodies.
fn check_column_attrs(obj: &Map<String, Value>) -> ValidationResult {
    if let Some(order) = obj.get("order") {
        if as_u32(order).is_none() {
            return Err(ValidationError::new("Order must be a non-negative integer"));
        }
    }
    if let Some(width) = obj.get("width") {
        if !as_u32(width).is_some_and(|n| n >= 1) {
            return Err(ValidationError::new("Width must be a positive integer"));
        }
    }
    if let Some(editable) = obj.get("editable") {
        if !editable.is_boolean() {
            return Err(ValidationError::new("Editable must be a boolean"));
        }
    }
    Ok(())
}

/// Validate a row body for create or update.
pub fn validate_row(body: &Value) -> ValidationResult {
    let obj = as_object(body)?;

    match obj.get("email") {
        None | Some(Value::Null) => {}
        Some(Value::String(email)) if email.is_empty() => {}
        Some(Value::String(email)) if EMAIL_RE.is_match(email) => {}
        Some(_) => return Err(ValidationError::new("Invalid email format")),
    }

    if let Some(age) = provided(obj, "age") {
        if !age.as_f64().is_some_and(|n| (0.0..=150.0).contains(&n)) {
            return Err(ValidationError::new("Age must be a number between 0 and 150"));
        }
    }

    if let Some(serial) = provided(obj, SERIAL_NO_FIELD) {
        if !serial.as_u64().is_some_and(|n| n >= 1) {
            return Err(ValidationError::new("Serial number must be a positive number"));
        }
        if serial.as_u64().is_some_and(|n| n > MAX_SERIAL_NO) {
            return Err(ValidationError::new(format!(
                "Serial number must not exceed {MAX_SERIAL_NO}"
            )));
        }
    }

    if let Some(completed) = provided(obj, "completed") {
        if !completed.is_boolean() {
            return Err(ValidationError::new("Completed must be a boolean"));
        }
    }

    Ok(())
}

/// Validate a whole table-config body (create, replace or update).
pub fn validate_table_config(body: &Value) -> ValidationResult {
    let obj = as_object(body)?;

    if non_empty_str(obj.get("name")).is_none() {
        return Err(ValidationError::new("Table name is required"));
    }

    let Some(columns) = provided(obj, "columns") else {
        return Ok(());
    };
    let columns = columns
        .as_array()
        .ok_or_else(|| ValidationError::new("Columns must be an array"))?;

    let mut fields = HashSet::new();
    let mut ids = HashSet::new();
    for (i, column) in columns.iter().enumerate() {
        let col = column.as_object();
        let title = non_empty_str(col.and_then(|c| c.get("title")));
        let field = non_empty_str(col.and_then(|c| c.get("field")));
        let (Some(col), Some(_), Some(field)) = (col, title, field) else {
            return Err(ValidationError::new(format!(
                "Column {} must have both title and field properties",
                i + 1
            )));
        };
        check_field_key(field)?;
        check_column_attrs(col)?;

        if !fields.insert(field) {
            return Err(ValidationError::new(format!(
                "Column field '{field}' appears more than once"
            )));
        }
        if let Some(id) = provided(col, "_id") {
            let Some(id) = id.as_str() else {
                return Err(ValidationError::new("Column _id must be a string"));
            };
            if !ids.insert(id) {
                return Err(ValidationError::new(format!(
                    "Column _id '{id}' appears more than once"
                )));
            }
        }
    }

    Ok(())
}

/// Validate a new column body: `title` and `field` are mandatory.
pub fn validate_column(body: &Value) -> ValidationResult {
    let obj = as_object(body)?;

    let title = non_empty_str(obj.get("title"));
    let field = non_empty_str(obj.get("field"));
    let (Some(_), Some(field)) = (title, field) else {
        return Err(ValidationError::new("Column title and field are required"));
    };

    check_field_key(field)?;
    check_column_attrs(obj)
}

/// Validate a partial column update: only supplied attributes are checked.
pub fn validate_partial_column(body: &Value) -> ValidationResult {
    let obj = as_object(body)?;

    if let Some(title) = obj.get("title") {
        if non_empty_str(Some(title)).is_none() {
            return Err(ValidationError::new("Column title cannot be empty"));
        }
    }

    if let Some(field) = obj.get("field") {
        match field.as_str() {
            Some(field) => check_field_key(field)?,
            None => return Err(ValidationError::new("Field name must be a string")),
        }
    }

    check_column_attrs(obj)
}

/// Validate a bulk column body and return the target field key.
pub fn validate_bulk_column(body: &Value) -> ValidationResult<String> {
    let obj = as_object(body)?;

    let field = non_empty_str(obj.get("columnField"))
        .ok_or_else(|| ValidationError::new("Column field is required"))?;

    check_field_key(field)?;
    if is_reserved_row_key(field) {
        return Err(ValidationError::new(format!("Column field '{field}' is reserved")));
    }

    Ok(field.to_string())
}

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected an array at {pointer:?}, found {found}")]
pub struct RowShapeError {
    pub pointer: String,
    pub found: &'static str,
}

/// Pull the row array out of an upstream payload.
///
/// `pointer` is an RFC 6901 JSON pointer: `""` for a bare array, `"/data"`
/// for `{"data": [...]}`, `"/1"` for `[meta, rows]` envelopes.
pub fn extract_rows(payload: &Value, pointer: &str) -> Result<Vec<Value>, RowShapeError> {
    match payload.pointer(pointer) {
        Some(Value::Array(rows)) => Ok(rows.clone()),
        Some(other) => Err(RowShapeError {
            pointer: pointer.to_string(),
            found: kind_name(other),
        }),
        None => Err(RowShapeError {
            pointer: pointer.to_string(),
            found: "nothing",
        }),
    }
}

/// Add constant fields to every object row, without overwriting upstream values.
pub fn inject_constants(rows: &mut [Value], constants: &[(&str, &str)]) {
    if constants.is_empty() {
        return;
    }
    for row in rows.iter_mut() {
        if let Value::Object(map) = row {
            for (key, value) in constants {
                map.entry(key.to_string())
                    .or_insert_with(|| Value::String(value.to_string()));
            }
        }
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

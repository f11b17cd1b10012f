//! Request body parsing, ahead of event synthesis.
//!
//! JSON and urlencoded form bodies are parsed; anything else (including
//! an empty body) becomes the empty object.

use serde_json::{Map, Value};
use sls_core::parse_form;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("failed to read request body: {0}")]
    Read(String),
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid JSON body, only objects and arrays are supported")]
    NotObjectOrArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Other,
}

fn body_kind(content_type: Option<&str>) -> BodyKind {
    let Some(content_type) = content_type else {
        return BodyKind::Other;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "application/json" | "application/csp-report" => BodyKind::Json,
        "application/x-www-form-urlencoded" => BodyKind::Form,
        other if other.ends_with("+json") => BodyKind::Json,
        _ => BodyKind::Other,
    }
}

/// Parse `bytes` according to `content_type`.
pub fn parse_body(content_type: Option<&str>, bytes: &[u8]) -> Result<Value, BodyError> {
    let empty = bytes.iter().all(u8::is_ascii_whitespace);
    match body_kind(content_type) {
        _ if empty => Ok(Value::Object(Map::new())),
        BodyKind::Json => {
            let value: Value = serde_json::from_slice(bytes)?;
            match value {
                Value::Object(_) | Value::Array(_) => Ok(value),
                _ => Err(BodyError::NotObjectOrArray),
            }
        }
        BodyKind::Form => Ok(Value::Object(parse_form(&String::from_utf8_lossy(bytes)))),
        BodyKind::Other => Ok(Value::Object(Map::new())),
    }
}

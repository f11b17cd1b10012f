//! Response descriptor returned by a handler.
//!
//! Handlers hand back loosely-typed JSON; [`ResponseDescriptor::from_value`]
//! is the validation boundary that turns it into an explicit structure or
//! rejects it as an [`InvocationError`].

use std::collections::BTreeMap;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InvocationError;

/// Status used when the handler gives none. Deliberately not 200.
pub const DEFAULT_STATUS: u16 = 404;

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent)
    .with_decode_allow_trailing_bits(true);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Lower-cased header name to one or more values; each value becomes
    /// its own header line.
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl ResponseDescriptor {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into().to_ascii_lowercase();
        self.headers.entry(name).or_default().push(value.into());
        self
    }

    pub fn base64(mut self) -> Self {
        self.is_base64_encoded = true;
        self
    }

    /// Validate a handler's raw result.
    ///
    /// `body` is required. A falsy `statusCode` (absent, `null`, `0`,
    /// `false`, `""`) means "no status". Header values may be strings,
    /// numbers, booleans or arrays of those. Names differing only in case
    /// name the same header; the later one replaces the earlier.
    pub fn from_value(value: Value) -> Result<Self, InvocationError> {
        let Value::Object(mut fields) = value else {
            return Err(InvocationError::msg(format!(
                "handler result must be an object, got {}",
                kind_of(&value)
            )));
        };

        let status_code = match fields.remove("statusCode") {
            None => None,
            Some(v) if is_falsy(&v) => None,
            Some(Value::Number(n)) => match n.as_u64() {
                Some(code @ 100..=999) => Some(code as u16),
                _ => {
                    return Err(InvocationError::msg(format!("invalid status code: {n}")));
                }
            },
            Some(other) => {
                return Err(InvocationError::msg(format!(
                    "statusCode must be an integer, got {}",
                    kind_of(&other)
                )));
            }
        };

        let headers = match fields.remove("headers") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Object(map)) => {
                let mut headers = BTreeMap::new();
                for (name, value) in map {
                    let values = header_values(&name, value)?;
                    if !values.is_empty() {
                        headers.insert(name.to_ascii_lowercase(), values);
                    }
                }
                headers
            }
            Some(other) => {
                return Err(InvocationError::msg(format!(
                    "headers must be an object, got {}",
                    kind_of(&other)
                )));
            }
        };

        let body = match fields.remove("body") {
            None | Some(Value::Null) => {
                return Err(InvocationError::msg("handler result is missing `body`"));
            }
            Some(Value::String(body)) => body,
            Some(other) => other.to_string(),
        };

        let is_base64_encoded = match fields.remove("isBase64Encoded") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => flag,
            Some(other) => {
                return Err(InvocationError::msg(format!(
                    "isBase64Encoded must be a boolean, got {}",
                    kind_of(&other)
                )));
            }
        };

        Ok(Self {
            status_code,
            headers,
            body,
            is_base64_encoded,
        })
    }

    /// The status to send: `statusCode` when given, else [`DEFAULT_STATUS`].
    pub fn status(&self) -> u16 {
        self.status_code.unwrap_or(DEFAULT_STATUS)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|key| key.eq_ignore_ascii_case(name))
    }

    /// The body text to write, decoding base64 when flagged.
    ///
    /// Standard and URL-safe characters are accepted, even mixed, whitespace is
    /// ignored and padding is optional. Decoded bytes are read as UTF-8,
    /// replacing invalid sequences.
    pub fn decoded_body(&self) -> Result<String, InvocationError> {
        if !self.is_base64_encoded {
            return Ok(self.body.clone());
        }

        // URL-safe characters may be mixed with standard ones in one body.
        let compact: String = self
            .body
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                '-' => '+',
                '_' => '/',
                c => c,
            })
            .collect();
        let bytes = STANDARD_LENIENT.decode(compact.as_bytes()).map_err(|e| {
            InvocationError::new(anyhow::Error::new(e).context("failed to decode base64 body"))
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn header_values(name: &str, value: Value) -> Result<Vec<String>, InvocationError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .filter(|item| !item.is_null())
            .map(|item| scalar_header(name, item))
            .collect(),
        other => Ok(vec![scalar_header(name, other)?]),
    }
}

fn scalar_header(name: &str, value: Value) -> Result<String, InvocationError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(InvocationError::msg(format!(
            "header {name} has unsupported value type {}",
            kind_of(&other)
        ))),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

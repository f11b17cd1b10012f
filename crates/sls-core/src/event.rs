//! Invocation event synthesis.
//!
//! Builds an HTTP API payload-version-2.0 style event from an inbound
//! request. Field names and nesting are a compatibility contract with
//! handlers written against the cloud platform, so every struct here
//! serializes with the platform's camelCase names.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::InvocationError;
use crate::ids::{self, ApiId};

pub const PAYLOAD_VERSION: &str = "2.0";
pub const DEFAULT_ROUTE_KEY: &str = "$default";
pub const DEFAULT_STAGE: &str = "$default";
pub const LOCAL_ACCOUNT_ID: &str = "123456789012";

/// The inbound request, already reduced to plain values by the HTTP layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestParts {
    pub method: String,
    /// Host without port.
    pub hostname: String,
    /// Path without the query component.
    pub path: String,
    /// Query string exactly as received, without the leading `?`.
    pub raw_query: String,
    pub headers: BTreeMap<String, String>,
    pub source_ip: String,
    pub protocol: String,
    /// Body as produced by the body-parsing layer.
    pub body: serde_json::Value,
}

impl RequestParts {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationEvent {
    pub version: String,
    pub route_key: String,
    pub raw_path: String,
    pub raw_query_string: String,
    pub headers: BTreeMap<String, String>,
    pub query_string_parameters: BTreeMap<String, String>,
    pub request_context: RequestContext,
    pub body: String,
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub account_id: String,
    pub api_id: String,
    pub domain_name: String,
    pub http: HttpDescription,
    pub request_id: String,
    pub route_key: String,
    pub stage: String,
    /// Epoch milliseconds at synthesis time.
    pub time_epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpDescription {
    pub method: String,
    pub path: String,
    pub protocol: String,
    pub source_ip: String,
    pub user_agent: String,
}

/// Build the invocation event for one request.
///
/// Headers and query parameters are copied, so the event does not
/// observe later changes to `request`. A fresh request id and timestamp
/// are taken on every call.
pub fn synthesize_event(
    api_id: &ApiId,
    request: &RequestParts,
) -> Result<InvocationEvent, InvocationError> {
    let body = serde_json::to_string(&request.body).map_err(|e| {
        InvocationError::new(anyhow::Error::new(e).context("failed to serialize request body"))
    })?;

    Ok(InvocationEvent {
        version: PAYLOAD_VERSION.to_string(),
        route_key: DEFAULT_ROUTE_KEY.to_string(),
        raw_path: request.path.clone(),
        raw_query_string: request.raw_query.clone(),
        headers: request.headers.clone(),
        query_string_parameters: parse_query(&request.raw_query),
        request_context: RequestContext {
            account_id: LOCAL_ACCOUNT_ID.to_string(),
            api_id: api_id.to_string(),
            domain_name: request.hostname.clone(),
            http: HttpDescription {
                method: request.method.clone(),
                path: request.path.clone(),
                protocol: request.protocol.clone(),
                source_ip: request.source_ip.clone(),
                user_agent: request.header("user-agent").unwrap_or_default().to_string(),
            },
            request_id: ids::request_id(),
            route_key: DEFAULT_ROUTE_KEY.to_string(),
            stage: DEFAULT_STAGE.to_string(),
            time_epoch: epoch_millis(),
        },
        body,
        is_base64_encoded: false,
    })
}

/// Decode a raw query string into parameters. Repeated keys are joined
/// with `,` the way the platform's 2.0 payload does.
pub fn parse_query(raw_query: &str) -> BTreeMap<String, String> {
    let mut params: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(raw_query.as_bytes()) {
        params
            .entry(key.into_owned())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert_with(|| value.clone().into_owned());
    }
    params
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

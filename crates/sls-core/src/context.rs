//! Invocation context synthesis.
//!
//! The literal values below are what handlers that introspect their
//! context see when running locally; keep them stable.

use serde::{Deserialize, Serialize};

use crate::ids;

pub const LOCAL_FUNCTION_NAME: &str = "local-function-name";
pub const LOCAL_FUNCTION_VERSION: &str = "$LOCAL";
pub const LOCAL_MEMORY_LIMIT_MB: &str = "1024";
pub const LOCAL_LOG_GROUP: &str = "/aws/lambda/local-function-name";
pub const LOCAL_FUNCTION_ARN: &str =
    "arn:aws:lambda:LOCAL:123456789012:function:local-function-name";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationContext {
    pub callback_waits_for_empty_event_loop: bool,
    pub function_version: String,
    pub function_name: String,
    #[serde(rename = "memoryLimitInMB")]
    pub memory_limit_in_mb: String,
    pub log_group_name: String,
    pub log_stream_name: String,
    pub invoked_function_arn: String,
    pub aws_request_id: String,
}

/// Build a fresh context. The request id and log stream discriminator
/// are generated per call and independent of the event's request id.
pub fn synthesize_context() -> InvocationContext {
    InvocationContext {
        callback_waits_for_empty_event_loop: false,
        function_version: LOCAL_FUNCTION_VERSION.to_string(),
        function_name: LOCAL_FUNCTION_NAME.to_string(),
        memory_limit_in_mb: LOCAL_MEMORY_LIMIT_MB.to_string(),
        log_group_name: LOCAL_LOG_GROUP.to_string(),
        log_stream_name: format!("[{LOCAL_FUNCTION_VERSION}]{}", ids::stream_id()),
        invoked_function_arn: LOCAL_FUNCTION_ARN.to_string(),
        aws_request_id: ids::request_id(),
    }
}

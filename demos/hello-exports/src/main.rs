//! Two named handlers served by serverless-http-dev.
//!
//! ```text
//! cargo run -p hello-exports -- --handler http --http-port 3000
//! curl 'localhost:3000/greet?name=ada'
//! ```
//!
//! `--handler fail` serves a handler that always errors, to see fault
//! translation from the client side.

use std::process::ExitCode;

use serde_json::{Value, json};
use sls_core::{InvocationContext, InvocationError, InvocationEvent};
use sls_runtime::{Exports, handler_fn};

async fn http(event: InvocationEvent, context: InvocationContext) -> anyhow::Result<Value> {
    let name = event
        .query_string_parameters
        .get("name")
        .cloned()
        .unwrap_or_else(|| "world".to_string());

    Ok(json!({
        "statusCode": 200,
        "headers": {"content-type": "application/json"},
        "body": {
            "message": format!("hello, {name}"),
            "method": event.request_context.http.method,
            "path": event.raw_path,
            "requestId": context.aws_request_id,
        },
    }))
}

async fn fail(
    _event: InvocationEvent,
    _context: InvocationContext,
) -> Result<Value, InvocationError> {
    Err(InvocationError::msg("this handler always fails").with_status(503))
}

fn main() -> ExitCode {
    let exports = Exports::new()
        .export("http", handler_fn(http))
        .export("fail", handler_fn(fail));
    sls_dev::run_with_exports(exports)
}

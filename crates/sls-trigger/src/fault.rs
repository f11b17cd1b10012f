//! Invocation failures → HTTP error response.
//!
//! The response body is the full diagnostic (error chain, stack trace or
//! backtrace). That is only acceptable because this server is a local
//! development tool; never put it in front of real traffic.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use http_body_util::Full;
use sls_core::InvocationError;
use tracing::error;

use crate::ResponseBody;

/// Status carried by the error, or 500.
pub fn fault_status(err: &InvocationError) -> StatusCode {
    err.status_code()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Log the error for the operator and build the one response for it.
pub fn translate_fault(err: &InvocationError) -> Response<ResponseBody> {
    let status = fault_status(err);
    let diagnostic = err.diagnostic();
    error!(status = status.as_u16(), error = %err, "invocation failed\n{diagnostic}");

    let mut response = Response::new(Full::new(Bytes::from(diagnostic)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

//! Response descriptor → HTTP response.

use anyhow::Context;
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderName, HeaderValue, Response, StatusCode};
use http_body_util::Full;
use sls_core::{InvocationError, ResponseDescriptor};

use crate::ResponseBody;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";

/// Build the one HTTP response for a successful invocation.
///
/// Status defaults to 404 when the descriptor has none. Headers are
/// applied as given, except `content-length`, which always reflects the
/// body actually written. Names are case-insensitive: a later entry for
/// the same header replaces an earlier one.
pub fn map_response(
    descriptor: &ResponseDescriptor,
) -> Result<Response<ResponseBody>, InvocationError> {
    let status = StatusCode::from_u16(descriptor.status())
        .with_context(|| format!("invalid status code: {}", descriptor.status()))?;

    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, values) in &descriptor.headers {
        let header = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid header name: {name}"))?;
        if header == CONTENT_LENGTH {
            continue;
        }
        headers.remove(&header);
        for value in values {
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header {name}"))?;
            headers.append(header.clone(), value);
        }
    }

    if is_empty_status(status) {
        return Ok(response);
    }

    let body = descriptor.decoded_body()?;
    if !descriptor.has_header(CONTENT_TYPE.as_str()) {
        let content_type = if body.trim_start().starts_with('<') {
            TEXT_HTML
        } else {
            TEXT_PLAIN
        };
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    *response.body_mut() = Full::new(Bytes::from(body));
    Ok(response)
}

fn is_empty_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT | StatusCode::NOT_MODIFIED
    )
}

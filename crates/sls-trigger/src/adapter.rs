//! The per-request pipeline.
//!
//! `Received → Synthesizing → Invoking → Mapping | Translating → Sent`.
//! Nothing is written to the connection until the handler has settled,
//! and every request leaves with exactly one response.

use std::fmt;
use std::net::SocketAddr;

use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use sls_core::{
    ApiId, InvocationError, RequestParts, ResponseDescriptor, synthesize_context,
    synthesize_event,
};
use sls_runtime::Invoker;
use tracing::{debug, warn};

use crate::body::{BodyError, parse_body};
use crate::{ResponseBody, convert, fault, mapper};

/// Holds the process-wide API id and the resolved handler. Cheap to
/// clone; every connection gets its own copy.
#[derive(Clone)]
pub struct Adapter {
    api_id: ApiId,
    invoker: Invoker,
}

impl Adapter {
    pub fn new(api_id: ApiId, invoker: Invoker) -> Self {
        Self { api_id, invoker }
    }

    pub fn api_id(&self) -> &ApiId {
        &self.api_id
    }

    /// Handle one inbound request.
    pub async fn handle<B>(&self, req: Request<B>, peer: SocketAddr) -> Response<ResponseBody>
    where
        B: Body,
        B::Error: fmt::Display,
    {
        let (parts, body) = req.into_parts();

        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => return bad_request(&BodyError::Read(e.to_string())),
        };
        let content_type = parts.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        let parsed = match parse_body(content_type, &bytes) {
            Ok(parsed) => parsed,
            Err(e) => return bad_request(&e),
        };

        let request = convert::request_parts(&parts, peer, parsed);
        match self.dispatch(&request).await {
            Ok(response) => response,
            Err(err) => fault::translate_fault(&err),
        }
    }

    /// Synthesize, invoke and map. Any failure along the way is returned
    /// for fault translation.
    pub async fn dispatch(
        &self,
        request: &RequestParts,
    ) -> Result<Response<ResponseBody>, InvocationError> {
        let event = synthesize_event(&self.api_id, request)?;
        let context = synthesize_context();
        debug!(
            request_id = %event.request_context.request_id,
            aws_request_id = %context.aws_request_id,
            "invoking handler"
        );

        let raw = self.invoker.invoke(event, context).await?;
        let descriptor = ResponseDescriptor::from_value(raw)?;
        mapper::map_response(&descriptor)
    }
}

fn bad_request(err: &BodyError) -> Response<ResponseBody> {
    warn!(error = %err, "rejecting request body");
    let mut response = Response::new(Full::new(bytes::Bytes::from(err.to_string())));
    *response.status_mut() = StatusCode::BAD_REQUEST;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde_json::{Value, json};
    use sls_core::{InvocationContext, InvocationEvent};
    use sls_runtime::handler_fn;

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn adapter_returning(value: Value) -> Adapter {
        let handler = handler_fn(move |_e, _c| {
            let value = value.clone();
            async move { Ok::<_, anyhow::Error>(value) }
        });
        Adapter::new(ApiId::generate(), Invoker::new(Arc::new(handler)))
    }

    fn get(uri: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .uri(uri)
            .header("host", "localhost:3000")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    async fn text(response: Response<ResponseBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn success_maps_descriptor() {
        let adapter = adapter_returning(json!({
            "statusCode": 201,
            "headers": {"x-a": "1"},
            "body": "ok",
            "isBase64Encoded": false,
        }));
        let response = adapter.handle(get("/"), peer()).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-a"], "1");
        assert_eq!(text(response).await, "ok");
    }

    #[tokio::test]
    async fn missing_status_is_404() {
        let adapter = adapter_returning(json!({
            "headers": {},
            "body": "x",
            "isBase64Encoded": false,
        }));
        let response = adapter.handle(get("/"), peer()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(text(response).await, "x");
    }

    #[tokio::test]
    async fn base64_body_is_decoded() {
        let adapter = adapter_returning(json!({
            "statusCode": 200,
            "body": STANDARD.encode("héllo"),
            "isBase64Encoded": true,
        }));
        let response = adapter.handle(get("/"), peer()).await;
        assert_eq!(text(response).await, "héllo");
    }

    #[tokio::test]
    async fn thrown_error_is_500_with_diagnostic() {
        let handler = handler_fn(|_e, _c| async {
            Err::<Value, _>(anyhow::anyhow!("TypeError: cannot read property 'id'"))
        });
        let adapter = Adapter::new(ApiId::generate(), Invoker::new(Arc::new(handler)));
        let response = adapter.handle(get("/"), peer()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(text(response).await.contains("cannot read property 'id'"));
    }

    #[tokio::test]
    async fn error_status_is_respected() {
        let handler = handler_fn(|_e, _c| async {
            Err::<Value, _>(InvocationError::msg("unauthorized").with_status(401))
        });
        let adapter = Adapter::new(ApiId::generate(), Invoker::new(Arc::new(handler)));
        let response = adapter.handle(get("/"), peer()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn descriptor_without_body_is_a_fault() {
        let adapter = adapter_returning(json!({"statusCode": 200}));
        let response = adapter.handle(get("/"), peer()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(text(response).await.contains("body"));
    }

    #[tokio::test]
    async fn malformed_json_is_rejected_before_invocation() {
        let invoked = Arc::new(Mutex::new(false));
        let flag = invoked.clone();
        let handler = handler_fn(move |_e, _c| {
            *flag.lock().unwrap() = true;
            async { Ok::<_, anyhow::Error>(json!({"statusCode": 200, "body": ""})) }
        });
        let adapter = Adapter::new(ApiId::generate(), Invoker::new(Arc::new(handler)));

        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from_static(b"{oops")))
            .unwrap();
        let response = adapter.handle(req, peer()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!*invoked.lock().unwrap());
    }

    #[tokio::test]
    async fn handler_receives_synthesized_event() {
        let handler = handler_fn(|event: InvocationEvent, ctx: InvocationContext| async move {
            Ok::<_, anyhow::Error>(json!({
                "statusCode": 200,
                "body": serde_json::to_string(&json!({"event": event, "context": ctx})).unwrap(),
            }))
        });
        let adapter = Adapter::new(ApiId::generate(), Invoker::new(Arc::new(handler)));

        let req = Request::builder()
            .method("POST")
            .uri("/things?color=red&size=l")
            .header("host", "localhost:3000")
            .header("content-type", "application/json")
            .header("user-agent", "adapter-test")
            .body(Full::new(Bytes::from_static(br#"{"name":"widget"}"#)))
            .unwrap();
        let response = adapter.handle(req, peer()).await;
        let echoed: Value = serde_json::from_str(&text(response).await).unwrap();

        let event = &echoed["event"];
        assert_eq!(event["rawPath"], "/things");
        assert_eq!(event["rawQueryString"], "color=red&size=l");
        assert_eq!(event["queryStringParameters"], json!({"color": "red", "size": "l"}));
        assert_eq!(event["body"], r#"{"name":"widget"}"#);
        assert_eq!(event["headers"]["user-agent"], "adapter-test");
        assert_eq!(event["requestContext"]["domainName"], "localhost");
        assert_eq!(event["requestContext"]["apiId"], adapter.api_id().as_str());
        assert_eq!(event["requestContext"]["http"]["method"], "POST");
        assert_ne!(
            event["requestContext"]["requestId"],
            echoed["context"]["awsRequestId"]
        );
    }

    fn echo_body_adapter() -> Adapter {
        let handler = handler_fn(|event: InvocationEvent, _c| async move {
            Ok::<_, anyhow::Error>(json!({"statusCode": 200, "body": event.body}))
        });
        Adapter::new(ApiId::generate(), Invoker::new(Arc::new(handler)))
    }

    fn post(content_type: &str, body: &'static [u8]) -> Request<Full<Bytes>> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", content_type)
            .body(Full::new(Bytes::from_static(body)))
            .unwrap()
    }

    #[tokio::test]
    async fn repeated_form_fields_reach_the_handler_as_arrays() {
        let req = post("application/x-www-form-urlencoded", b"tag=a&tag=b&tag=c%2Cd");
        let response = echo_body_adapter().handle(req, peer()).await;
        let body: Value = serde_json::from_str(&text(response).await).unwrap();
        assert_eq!(body, json!({"tag": ["a", "b", "c,d"]}));
    }

    #[tokio::test]
    async fn json_body_keeps_client_key_order() {
        let req = post("application/json", br#"{"zeta":1,"alpha":2,"price":1.0}"#);
        let response = echo_body_adapter().handle(req, peer()).await;
        assert_eq!(text(response).await, r#"{"zeta":1,"alpha":2,"price":1.0}"#);
    }

    #[tokio::test]
    async fn request_ids_are_unique_across_concurrent_requests() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = handler_fn(move |event: InvocationEvent, ctx: InvocationContext| {
            sink.lock()
                .unwrap()
                .push((event.request_context.request_id, ctx.aws_request_id));
            async { Ok::<_, anyhow::Error>(json!({"statusCode": 204, "body": ""})) }
        });
        let adapter = Adapter::new(ApiId::generate(), Invoker::new(Arc::new(handler)));

        let mut tasks = Vec::new();
        for _ in 0..50 {
            let adapter = adapter.clone();
            tasks.push(tokio::spawn(async move { adapter.handle(get("/"), peer()).await }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().status(), StatusCode::NO_CONTENT);
        }

        let pairs = seen.lock().unwrap();
        assert_eq!(pairs.len(), 50);
        let mut ids = HashSet::new();
        for (request_id, aws_request_id) in pairs.iter() {
            assert_ne!(request_id, aws_request_id);
            assert!(ids.insert(request_id.clone()));
            assert!(ids.insert(aws_request_id.clone()));
        }
    }
}

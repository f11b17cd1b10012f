//! The handler extension point.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use sls_core::{InvocationContext, InvocationError, InvocationEvent};

/// Future returned by a handler: the raw (not yet validated) response
/// descriptor, or the error the handler raised.
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<serde_json::Value, InvocationError>> + Send>>;

/// A user function exercised by the dev server.
///
/// Called at most once per request with that request's own event and
/// context.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, event: InvocationEvent, context: InvocationContext) -> HandlerFuture;
}

pub type SharedHandler = Arc<dyn Handler>;

/// Handler backed by an async closure. Built with [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a [`Handler`].
///
/// The closure may return any serializable response (typically a
/// [`sls_core::ResponseDescriptor`]) and any error convertible to
/// `anyhow::Error`. Returning an [`InvocationError`] keeps its status code.
pub fn handler_fn<F, Fut, R, E>(f: F) -> FnHandler<F>
where
    F: Fn(InvocationEvent, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Serialize,
    E: Into<anyhow::Error>,
{
    FnHandler { f }
}

impl<F, Fut, R, E> Handler for FnHandler<F>
where
    F: Fn(InvocationEvent, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Serialize,
    E: Into<anyhow::Error>,
{
    fn call(&self, event: InvocationEvent, context: InvocationContext) -> HandlerFuture {
        let fut = (self.f)(event, context);
        Box::pin(async move {
            let response = fut.await.map_err(|e| InvocationError::from_anyhow(e.into()))?;
            serde_json::to_value(response).map_err(|e| {
                InvocationError::new(
                    anyhow::Error::new(e).context("failed to serialize handler response"),
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sls_core::{ApiId, RequestParts, ResponseDescriptor, synthesize_context, synthesize_event};

    fn invocation() -> (InvocationEvent, InvocationContext) {
        let request = RequestParts {
            method: "GET".to_string(),
            hostname: "localhost".to_string(),
            path: "/".to_string(),
            raw_query: String::new(),
            headers: Default::default(),
            source_ip: "127.0.0.1".to_string(),
            protocol: "HTTP/1.1".to_string(),
            body: serde_json::json!({}),
        };
        let event = synthesize_event(&ApiId::generate(), &request).unwrap();
        (event, synthesize_context())
    }

    #[tokio::test]
    async fn fn_handler_serializes_descriptor() {
        let handler = handler_fn(|event: InvocationEvent, _ctx| async move {
            Ok::<_, anyhow::Error>(ResponseDescriptor::new(event.raw_path).with_status(200))
        });
        let (event, ctx) = invocation();
        let value = handler.call(event, ctx).await.unwrap();
        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["body"], "/");
    }

    #[tokio::test]
    async fn fn_handler_keeps_invocation_error_status() {
        let handler = handler_fn(|_event, _ctx| async move {
            Err::<ResponseDescriptor, _>(InvocationError::msg("nope").with_status(403))
        });
        let (event, ctx) = invocation();
        let err = handler.call(event, ctx).await.unwrap_err();
        assert_eq!(err.status_code(), Some(403));
    }

    #[tokio::test]
    async fn fn_handler_wraps_plain_errors() {
        let handler = handler_fn(|_event, _ctx| async move {
            Err::<ResponseDescriptor, _>(std::io::Error::other("disk on fire"))
        });
        let (event, ctx) = invocation();
        let err = handler.call(event, ctx).await.unwrap_err();
        assert_eq!(err.status_code(), None);
        assert!(err.diagnostic().contains("disk on fire"));
    }
}

//! Per-request handler invocation.

use std::any::Any;
use std::time::Instant;

use serde_json::Value;
use sls_core::{InvocationContext, InvocationError, InvocationEvent};
use tracing::debug;

use crate::handler::SharedHandler;

tokio::task_local! {
    static INVOCATION: ();
}

/// Whether the current code runs inside a handler call made by an
/// [`Invoker`]. Tasks the handler spawns for itself are outside it.
pub fn in_invocation() -> bool {
    INVOCATION.try_with(|_| ()).is_ok()
}

/// Invokes a resolved handler.
///
/// Each call runs the handler on its own task, so a handler that panics
/// surfaces as an [`InvocationError`] for that request instead of taking
/// the connection down.
#[derive(Clone)]
pub struct Invoker {
    handler: SharedHandler,
}

impl Invoker {
    pub fn new(handler: SharedHandler) -> Self {
        Self { handler }
    }

    /// Call the handler once and wait for it to settle. No timeout is
    /// applied; a handler that never settles holds its request open.
    pub async fn invoke(
        &self,
        event: InvocationEvent,
        context: InvocationContext,
    ) -> Result<Value, InvocationError> {
        let request_id = context.aws_request_id.clone();
        let started = Instant::now();
        let handler = self.handler.clone();
        let call = INVOCATION.scope((), async move { handler.call(event, context).await });

        let result = match tokio::spawn(call).await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => {
                let message = panic_message(join_error.into_panic());
                Err(InvocationError::msg(format!("handler panicked: {message}"))
                    .with_diagnostic(format!("handler panicked: {message}")))
            }
            Err(join_error) => Err(InvocationError::new(join_error)),
        };

        debug!(
            request_id = %request_id,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            ok = result.is_ok(),
            "handler settled"
        );
        result
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

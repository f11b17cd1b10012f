//! Per-request invocation failures.

use std::fmt;

/// Any failure between synthesis and a mapped response.
///
/// Covers errors raised by the user handler as well as synthesis and
/// response-validation failures. Recovered per request and turned into
/// an HTTP error response; never fatal to the process.
pub struct InvocationError {
    status_code: Option<u16>,
    diagnostic: Option<String>,
    source: anyhow::Error,
}

impl InvocationError {
    pub fn new(source: impl Into<anyhow::Error>) -> Self {
        Self {
            status_code: None,
            diagnostic: None,
            source: source.into(),
        }
    }

    pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self::new(anyhow::Error::msg(message))
    }

    /// Attach the HTTP status the error should be reported with.
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Replace the rendered diagnostic, e.g. with a stack trace reported
    /// by an out-of-process handler.
    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Full diagnostic text: an explicit diagnostic when one was attached,
    /// otherwise the error chain (plus backtrace, when captured).
    pub fn diagnostic(&self) -> String {
        match &self.diagnostic {
            Some(diagnostic) => diagnostic.clone(),
            None => format!("{:?}", self.source),
        }
    }

    /// Recover an `InvocationError` that was boxed into an `anyhow::Error`,
    /// keeping its status code; wrap anything else.
    pub fn from_anyhow(error: anyhow::Error) -> Self {
        match error.downcast::<InvocationError>() {
            Ok(invocation) => invocation,
            Err(other) => Self::new(other),
        }
    }
}

impl From<anyhow::Error> for InvocationError {
    fn from(error: anyhow::Error) -> Self {
        Self::from_anyhow(error)
    }
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl fmt::Debug for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationError")
            .field("status_code", &self.status_code)
            .field("source", &self.source)
            .finish()
    }
}

impl std::error::Error for InvocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

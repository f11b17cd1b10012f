//! sls-trigger — HTTP trigger for serverless-http-dev.
//!
//! Bridges inbound HTTP requests to a single serverless handler. Every
//! request, whatever its method or path, goes through the same pipeline:
//!
//! ```text
//! HTTP client
//!   │
//!   ▼
//! hyper server (access log)
//!   │
//!   ├── Parse body (JSON / form)          ── malformed ──► 400
//!   ├── Synthesize event + context
//!   ├── Invoke handler
//!   ├── Map response descriptor ──────────── ok ──────► status/headers/body
//!   └── Translate fault ───────────────────── err ────► status + diagnostic
//!   │
//!   ▼
//! HTTP response (exactly one per request)
//! ```

pub mod adapter;
pub mod body;
pub mod convert;
pub mod fault;
pub mod mapper;
pub mod server;

pub use adapter::Adapter;
pub use server::{BindError, HttpTrigger};

/// Response body type produced by the trigger.
pub type ResponseBody = http_body_util::Full<bytes::Bytes>;

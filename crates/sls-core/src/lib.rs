//! sls-core — the translation layer between HTTP and the serverless
//! invocation contract.
//!
//! Synthesizes the `event` and `context` objects a cloud function
//! platform would hand to a handler, and validates the response
//! descriptor a handler hands back.
//!
//! ```text
//! RequestParts ──► synthesize_event ──► InvocationEvent ─┐
//!                  synthesize_context ─► InvocationContext ├─► handler
//!                                                         │
//! serde_json::Value ◄─────────────────────────────────────┘
//!   └─► ResponseDescriptor::from_value ──► status / headers / body
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod form;
pub mod ids;
pub mod response;

pub use config::{ConfigError, DevConfig, PartialConfig};
pub use context::{InvocationContext, synthesize_context};
pub use error::InvocationError;
pub use event::{InvocationEvent, RequestContext, RequestParts, synthesize_event};
pub use form::parse_form;
pub use ids::ApiId;
pub use response::ResponseDescriptor;

//! sls-runtime — resolves and invokes the user handler.
//!
//! The handler is resolved exactly once, before the listener binds, and
//! then shared by every request:
//!
//! - **In-process exports**: named Rust handlers registered in an
//!   [`Exports`] table.
//! - **Command entries**: an executable speaking JSON over stdin/stdout,
//!   see [`CommandHandler`].
//!
//! The [`Invoker`] only sees a resolved [`SharedHandler`]; it does not
//! care how resolution happened.

pub mod command;
pub mod exports;
pub mod handler;
pub mod invoker;

use std::path::PathBuf;

use thiserror::Error;

pub use command::CommandHandler;
pub use exports::Exports;
pub use handler::{FnHandler, Handler, HandlerFuture, SharedHandler, handler_fn};
pub use invoker::{Invoker, in_invocation};

/// Startup resolution failures. Always fatal: the listener never binds.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to find entry {}", .0.display())]
    EntryNotFound(PathBuf),
    #[error("expected entry {} to be an executable file", .0.display())]
    NotCallable(PathBuf),
    #[error("expected entry to export a function {name} (available: {})", .available.join(", "))]
    ExportNotFound { name: String, available: Vec<String> },
    #[error("failed to inspect entry {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

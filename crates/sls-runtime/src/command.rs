//! Handlers that live in an external executable.
//!
//! Protocol, one process per invocation:
//!
//! - argv: `<entry> <export-name>`
//! - stdin: `{"event": <InvocationEvent>, "context": <InvocationContext>}`
//! - stdout on exit 0: the response descriptor as JSON
//! - non-zero exit: failure. If stdout holds a JSON object, its
//!   `statusCode`/`status`, `errorMessage` and `stack` describe the error;
//!   otherwise stderr is the diagnostic.
//!
//! Stderr is always forwarded to the log under the `handler` target.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use sls_core::{InvocationContext, InvocationError, InvocationEvent};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::ResolveError;
use crate::handler::{Handler, HandlerFuture};

#[derive(Debug, Clone)]
pub struct CommandHandler {
    program: PathBuf,
    export: String,
}

#[derive(Serialize)]
struct Payload<'a> {
    event: &'a InvocationEvent,
    context: &'a InvocationContext,
}

impl CommandHandler {
    /// Resolve `entry` (relative to `cwd`) to an executable file.
    pub fn resolve(cwd: &Path, entry: &Path, export: &str) -> Result<Self, ResolveError> {
        let program = cwd.join(entry);
        let metadata = match std::fs::metadata(&program) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ResolveError::EntryNotFound(program));
            }
            Err(source) => {
                return Err(ResolveError::Io {
                    path: program,
                    source,
                });
            }
        };

        if !metadata.is_file() || !is_executable(&metadata) {
            return Err(ResolveError::NotCallable(program));
        }

        debug!(program = %program.display(), export, "resolved command handler");
        Ok(Self {
            program,
            export: export.to_string(),
        })
    }
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    true
}

impl Handler for CommandHandler {
    fn call(&self, event: InvocationEvent, context: InvocationContext) -> HandlerFuture {
        let payload = serde_json::to_vec(&Payload {
            event: &event,
            context: &context,
        });
        let program = self.program.clone();
        let export = self.export.clone();

        Box::pin(async move {
            let payload = payload.context("failed to serialize invocation payload")?;
            run(&program, &export, payload).await
        })
    }
}

async fn run(program: &Path, export: &str, payload: Vec<u8>) -> Result<Value, InvocationError> {
    let mut child = Command::new(program)
        .arg(export)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn handler {}", program.display()))?;

    let mut stdin = child.stdin.take().context("handler stdin unavailable")?;
    let write = async move {
        let result = stdin.write_all(&payload).await;
        drop(stdin);
        result
    };
    let (written, output) = tokio::join!(write, child.wait_with_output());
    let output = output.context("failed to wait for handler process")?;

    forward_stderr(&output.stderr);

    if !output.status.success() {
        return Err(process_failure(output.status, &output.stdout, &output.stderr));
    }
    if let Err(e) = written {
        // The process is allowed to ignore its input.
        debug!(error = %e, "handler did not consume the invocation payload");
    }

    serde_json::from_slice(&output.stdout).map_err(|e| {
        InvocationError::new(anyhow::Error::new(e).context("handler wrote invalid JSON to stdout"))
            .with_diagnostic(format!(
                "handler wrote invalid JSON to stdout:\n{}",
                String::from_utf8_lossy(&output.stdout)
            ))
    })
}

fn forward_stderr(stderr: &[u8]) {
    for line in String::from_utf8_lossy(stderr).lines() {
        info!(target: "handler", "{line}");
    }
}

fn process_failure(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> InvocationError {
    let stderr = String::from_utf8_lossy(stderr);
    let report = serde_json::from_slice::<Value>(stdout)
        .ok()
        .filter(Value::is_object);

    let Some(report) = report else {
        let err = InvocationError::msg(format!("handler process exited with {status}"));
        return if stderr.trim().is_empty() {
            err
        } else {
            err.with_diagnostic(stderr.into_owned())
        };
    };

    let message = report
        .get("errorMessage")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("handler process exited with {status}"));
    let mut err = InvocationError::msg(message);

    let status_code = ["statusCode", "status"]
        .iter()
        .find_map(|key| report.get(*key).and_then(Value::as_u64).filter(|code| *code != 0));
    if let Some(code @ 100..=999) = status_code {
        err = err.with_status(code as u16);
    }

    let diagnostic = report
        .get("stack")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| (!stderr.trim().is_empty()).then(|| stderr.into_owned()));
    match diagnostic {
        Some(diagnostic) => err.with_diagnostic(diagnostic),
        None => err,
    }
}

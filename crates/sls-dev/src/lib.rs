//! serverless-http-dev — serve one serverless HTTP handler on a local port.
//!
//! Startup is strictly ordered and every step before `serve` is fatal:
//!
//! ```text
//! flags + config file ──▶ resolve handler ──▶ ApiId ──▶ bind ──▶ serve
//!                              │                          │
//!                          exit 1 on error            exit 1 on error
//! ```
//!
//! Two ways in:
//!
//! - the `serverless-http-dev` binary, whose `--entry` is an executable
//!   speaking the command protocol (see [`sls_runtime::CommandHandler`]);
//! - [`run_with_exports`], for a crate that registers its handlers in
//!   process and calls it from its own `main`.

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use sls_core::{ApiId, ConfigError, DevConfig, PartialConfig};
use sls_runtime::{CommandHandler, Exports, Invoker, SharedHandler, in_invocation};
use sls_trigger::{Adapter, HttpTrigger};
use tokio::sync::{Notify, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,serverless_http_dev=debug,sls=debug";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "serverless-http-dev",
    about = "Run a serverless HTTP handler behind a local HTTP server",
    version
)]
pub struct Cli {
    /// Handler entry, relative to the working directory.
    #[arg(long)]
    pub entry: Option<PathBuf>,

    /// Name of the handler export to invoke.
    #[arg(long)]
    pub handler: Option<String>,

    /// Interface to listen on (default: all interfaces).
    #[arg(long)]
    pub http_host: Option<String>,

    /// Port to listen on (default: 3000).
    #[arg(long)]
    pub http_port: Option<u16>,

    /// TOML file with the same keys as the flags. Flags win.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> PartialConfig {
        PartialConfig {
            entry: self.entry.clone(),
            handler: self.handler.clone(),
            http_host: self.http_host.clone(),
            http_port: self.http_port,
        }
    }

    /// Layer the flags over the config file, if any.
    pub fn partial_config(&self) -> Result<PartialConfig, ConfigError> {
        let file = match &self.config {
            Some(path) => PartialConfig::from_file(path)?,
            None => PartialConfig::default(),
        };
        Ok(file.merge(self.overrides()))
    }

    pub fn load_config(&self) -> Result<DevConfig, ConfigError> {
        self.partial_config()?.build()
    }
}

/// How the server was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// Ctrl-C.
    Interrupted,
    /// SIGTERM.
    Terminated,
}

impl Shutdown {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Shutdown::Interrupted => ExitCode::SUCCESS,
            Shutdown::Terminated => ExitCode::FAILURE,
        }
    }
}

pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // A host binary may already have installed a subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Entry point of the `serverless-http-dev` binary.
pub fn run_command(cli: Cli) -> ExitCode {
    init_tracing();
    run(|| resolve_command(&cli))
}

/// Config plus an executable entry, resolved against the working directory.
pub fn resolve_command(cli: &Cli) -> anyhow::Result<(DevConfig, SharedHandler)> {
    let config = cli.load_config()?;
    let cwd = std::env::current_dir().context("failed to read working directory")?;
    let handler = CommandHandler::resolve(&cwd, &config.entry, &config.handler)?;
    Ok((config, Arc::new(handler) as SharedHandler))
}

/// Serve a handler from an in-process [`Exports`] table.
///
/// Parses the same flags as the binary. `--entry` is optional here and
/// only labels the listening banner; it defaults to the running executable.
pub fn run_with_exports(exports: Exports) -> ExitCode {
    run_exports(Cli::parse(), exports)
}

/// [`run_with_exports`] with flags supplied by the caller.
pub fn run_exports(cli: Cli, exports: Exports) -> ExitCode {
    init_tracing();
    run(|| resolve_exports(&cli, &exports))
}

/// Config plus the named export. Without `--entry`, the running
/// executable labels the banner.
pub fn resolve_exports(
    cli: &Cli,
    exports: &Exports,
) -> anyhow::Result<(DevConfig, SharedHandler)> {
    let mut partial = cli.partial_config()?;
    if partial.entry.is_none() {
        partial.entry = std::env::current_exe().ok();
    }
    let config = partial.build()?;
    let handler = exports.resolve(&config.handler)?;
    Ok((config, handler))
}

fn run<R>(resolve: R) -> ExitCode
where
    R: FnOnce() -> anyhow::Result<(DevConfig, SharedHandler)>,
{
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => return fatal(anyhow::Error::new(e).context("failed to start runtime")),
    };

    let stray_panics = escalate_stray_panics();
    let stop = async move {
        tokio::select! {
            reason = shutdown_signal() => reason,
            _ = stray_panics.notified() => {
                bail!("a task outside any handler invocation panicked")
            }
        }
    };

    match runtime.block_on(launch(resolve, stop)) {
        Ok(shutdown) => {
            info!(?shutdown, "serverless-http-dev stopped");
            shutdown.exit_code()
        }
        Err(e) => fatal(e),
    }
}

/// Resolve the handler, then bind and serve. Nothing is bound when
/// resolution fails.
pub async fn launch<R, S>(resolve: R, stop: S) -> anyhow::Result<Shutdown>
where
    R: FnOnce() -> anyhow::Result<(DevConfig, SharedHandler)>,
    S: Future<Output = anyhow::Result<Shutdown>>,
{
    let (config, handler) = resolve()?;
    serve(&config, handler, stop).await
}

/// Panics inside a handler call fail only that request. Any other panic,
/// such as one in a task a handler spawned and left running, is fatal
/// for the process.
fn escalate_stray_panics() -> Arc<Notify> {
    let stray = Arc::new(Notify::new());
    let notify = stray.clone();
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        previous(info);
        flag_stray_panic(&notify);
    }));
    stray
}

fn flag_stray_panic(notify: &Notify) {
    if !in_invocation() {
        notify.notify_one();
    }
}

fn fatal(err: anyhow::Error) -> ExitCode {
    error!("{err:#}");
    ExitCode::FAILURE
}

/// Bind, announce and serve until `stop` resolves.
///
/// Bind failures come back as a [`sls_trigger::BindError`] inside the
/// `anyhow::Error`. The server loop ending on its own, by error or by
/// panic, is an error too.
pub async fn serve<S>(
    config: &DevConfig,
    handler: SharedHandler,
    stop: S,
) -> anyhow::Result<Shutdown>
where
    S: Future<Output = anyhow::Result<Shutdown>>,
{
    let api_id = ApiId::generate();
    let adapter = Adapter::new(api_id, Invoker::new(handler));
    let trigger = HttpTrigger::bind(config.host(), config.http_port, adapter).await?;
    let addr = trigger.local_addr().context("failed to read listen address")?;

    info!(
        "serverless-http-dev {} listening on http://{addr}",
        config.label()
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server = tokio::spawn(trigger.serve(shutdown_rx));

    let reason = tokio::select! {
        result = &mut server => match result {
            Ok(Ok(())) => bail!("server stopped unexpectedly"),
            Ok(Err(e)) => return Err(e.context("server failed")),
            Err(e) => bail!("server task failed: {e}"),
        },
        reason = stop => reason?,
    };

    info!(?reason, "shutdown signal received");
    let _ = shutdown_tx.send(true);
    if let Err(e) = server.await {
        warn!(error = %e, "server task did not stop cleanly");
    }
    Ok(reason)
}

async fn shutdown_signal() -> anyhow::Result<Shutdown> {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to install Ctrl-C handler")?;
            Ok(Shutdown::Interrupted)
        }
        result = terminate() => {
            result.context("failed to install SIGTERM handler")?;
            Ok(Shutdown::Terminated)
        }
    }
}

#[cfg(unix)]
async fn terminate() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate() -> std::io::Result<()> {
    std::future::pending().await
}

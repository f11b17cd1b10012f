//! HTTP trigger server.
//!
//! `HttpTrigger` owns a bound listener and serves every connection
//! through the [`Adapter`], one tokio task per connection using HTTP/1.1.

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::Context;
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, Uri};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::ResponseBody;
use crate::adapter::Adapter;

/// Listen-time failures. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("Port {port} requires elevated privileges")]
    ElevatedPrivileges { port: u16, source: io::Error },
    #[error("Port {port} is already in use")]
    AddrInUse { port: u16, source: io::Error },
    #[error("failed to listen on {host}:{port}: {source}")]
    Io {
        host: String,
        port: u16,
        source: io::Error,
    },
}

impl BindError {
    fn classify(host: &str, port: u16, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::PermissionDenied => BindError::ElevatedPrivileges { port, source },
            io::ErrorKind::AddrInUse => BindError::AddrInUse { port, source },
            _ => BindError::Io {
                host: host.to_string(),
                port,
                source,
            },
        }
    }
}

pub struct HttpTrigger {
    listener: TcpListener,
    adapter: Adapter,
}

impl HttpTrigger {
    /// Bind `host:port`. Port 0 picks a free port; see [`local_addr`].
    ///
    /// [`local_addr`]: HttpTrigger::local_addr
    pub async fn bind(host: &str, port: u16, adapter: Adapter) -> Result<Self, BindError> {
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| BindError::classify(host, port, e))?;
        Ok(Self { listener, adapter })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` flips (or its sender is dropped).
    ///
    /// Returns an error only for listener failures; per-request and
    /// per-connection failures are logged and contained.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    let (stream, peer_addr) = accept_result.context("accept failed")?;
                    let adapter = self.adapter.clone();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let svc = service_fn(move |req: Request<Incoming>| {
                            let adapter = adapter.clone();
                            async move {
                                Ok::<_, Infallible>(logged(&adapter, req, peer_addr).await)
                            }
                        });

                        if let Err(e) = http1::Builder::new()
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(%peer_addr, error = %e, "connection error");
                        }
                    });
                }
                _ = shutdown.changed() => {
                    info!("HTTP trigger shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Access log around one request.
async fn logged(
    adapter: &Adapter,
    req: Request<Incoming>,
    peer_addr: SocketAddr,
) -> Response<ResponseBody> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();

    let response = adapter.handle(req, peer_addr).await;

    let line = access_line(&method, &uri, &response, started.elapsed());
    info!(target: "access", %peer_addr, "{line}");
    response
}

/// `METHOD url status elapsed ms - length`, where `url` keeps the query.
fn access_line(
    method: &Method,
    uri: &Uri,
    response: &Response<ResponseBody>,
    elapsed: Duration,
) -> String {
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    let status = response.status().as_u16();
    let length = response
        .body()
        .size_hint()
        .exact()
        .map(|len| len.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{method} {uri} {status} {elapsed_ms:.3} ms - {length}")
}

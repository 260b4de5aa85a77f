//! HTTP server lifecycle for one WebDAV instance.
//!
//! A [`WebDavServer`] owns a bound listener and an accept loop spawned on the
//! caller's tokio runtime. Every accepted connection runs in a [`JoinSet`]
//! owned by the loop, so [`WebDavServer::stop`] can wait for in-flight
//! requests to finish before tearing anything down.

use crate::error::{ServerError, ServerResult};
use crate::service::RequestContext;
use crate::tls;
use davhost_core::ServerConfig;
use hyper::Request;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

/// Pause after a failed `accept` (e.g. EMFILE) before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// How a graceful stop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every connection finished within the grace period.
    Drained,
    /// The grace period elapsed; the remaining connections were aborted.
    TimedOut {
        /// Number of connections still open when the deadline hit.
        aborted: usize,
    },
}

/// A running WebDAV server instance.
pub struct WebDavServer {
    /// The actual bound address.
    pub addr: SocketAddr,
    scheme: &'static str,
    prefix: String,
    /// Shutdown signal sender.
    shutdown_tx: Option<watch::Sender<bool>>,
    /// Accept loop; yields the still-open connections once it exits.
    server_handle: Option<JoinHandle<JoinSet<()>>>,
}

impl WebDavServer {
    /// Start serving `config` on the current tokio runtime.
    ///
    /// With `verify_root` the root directory must exist and be a directory
    /// before anything is bound. TLS material is loaded before binding, so a
    /// bad certificate never leaves a listener behind.
    pub async fn start(config: &ServerConfig, verify_root: bool) -> ServerResult<Self> {
        if verify_root {
            check_root(config.root_directory()).await?;
        }

        let acceptor = config.tls().map(tls::load_acceptor).transpose()?;

        let bind_addr = config.socket_addr();
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: bind_addr,
                source,
            })?;
        let actual_addr = listener.local_addr()?;

        info!(
            addr = %actual_addr,
            scheme = config.scheme(),
            prefix = config.path_prefix(),
            root = %config.root_directory().display(),
            "Starting WebDAV server"
        );

        let ctx = RequestContext::new(config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server_handle = tokio::spawn(run_server(listener, acceptor, ctx, shutdown_rx));

        Ok(Self {
            addr: actual_addr,
            scheme: config.scheme(),
            prefix: config.path_prefix().to_string(),
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Get the base URL for this server, including the path prefix.
    pub fn url(&self) -> String {
        let prefix = self.prefix.trim_end_matches('/');
        format!("{}://{}{}/", self.scheme, self.addr, prefix)
    }

    /// Stop accepting, then give open connections `grace` to finish.
    ///
    /// Idle keep-alive connections are closed right away; connections in
    /// the middle of a request are aborted when the grace period runs out.
    pub async fn stop(mut self, grace: Duration) -> DrainOutcome {
        self.signal_shutdown();

        let Some(handle) = self.server_handle.take() else {
            return DrainOutcome::Drained;
        };
        let mut connections = match handle.await {
            Ok(connections) => connections,
            Err(e) => {
                error!(error = %e, "Accept loop ended abnormally");
                return DrainOutcome::Drained;
            }
        };

        let open = connections.len();
        if open > 0 {
            debug!(connections = open, grace_ms = grace.as_millis(), "Draining connections");
        }

        let outcome = match tokio::time::timeout(grace, drain(&mut connections)).await {
            Ok(()) => DrainOutcome::Drained,
            Err(_) => {
                let aborted = connections.len();
                warn!(
                    addr = %self.addr,
                    aborted,
                    "Grace period elapsed, aborting open connections"
                );
                connections.shutdown().await;
                DrainOutcome::TimedOut { aborted }
            }
        };

        info!(addr = %self.addr, "WebDAV server stopped");
        outcome
    }

    fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
    }
}

impl Drop for WebDavServer {
    fn drop(&mut self) {
        self.signal_shutdown();
        if let Some(handle) = self.server_handle.take() {
            handle.abort();
        }
    }
}

async fn check_root(path: &Path) -> ServerResult<()> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|source| ServerError::RootUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
    if !metadata.is_dir() {
        return Err(ServerError::RootUnavailable {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        });
    }
    Ok(())
}

async fn drain(connections: &mut JoinSet<()>) {
    while let Some(result) = connections.join_next().await {
        if let Err(e) = result
            && e.is_panic()
        {
            warn!(error = %e, "Connection task panicked");
        }
    }
}

/// Run the accept loop until shutdown is signalled.
///
/// Returns the connections that were still open at that point.
async fn run_server(
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    ctx: RequestContext,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinSet<()> {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(handle_connection(
                        stream,
                        peer,
                        acceptor.clone(),
                        ctx.clone(),
                        shutdown_rx.clone(),
                    ));
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(result) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = result
                    && e.is_panic()
                {
                    warn!(error = %e, "Connection task panicked");
                }
            }
            _ = shutdown_rx.changed() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    connections
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: Option<TlsAcceptor>,
    ctx: RequestContext,
    shutdown_rx: watch::Receiver<bool>,
) {
    match acceptor {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(tls_stream) => serve(tls_stream, peer, ctx, shutdown_rx).await,
            Err(e) => debug!(peer = %peer, error = %e, "TLS handshake failed"),
        },
        None => serve(stream, peer, ctx, shutdown_rx).await,
    }
}

async fn serve<S>(stream: S, peer: SocketAddr, ctx: RequestContext, mut shutdown_rx: watch::Receiver<bool>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let service = service_fn(move |req: Request<Incoming>| {
        let ctx = ctx.clone();
        async move { Ok::<_, Infallible>(ctx.handle(req, peer).await) }
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(io, service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown_rx.changed() => {
            // Finish the in-flight request, then close
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = result {
        // With auto protocol negotiation, incomplete messages cannot be told
        // apart from real failures. Log all connection errors at warn level.
        warn!(peer = %peer, error = %e, "HTTP connection error");
    }
}

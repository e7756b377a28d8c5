//! Async TCP transport using Tokio.
//!
//! Accepts connections, parses HTTP/1.1 requests off the socket and hands each one to
//! [`Engine::serve`]. Handler chains are synchronous, so every request runs on
//! Tokio's blocking pool and never stalls the reactor. HTTP/1.1 persistent
//! connections (keep-alive) are supported.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::engine::Engine;
use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};

pub use config::ServerConfig;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// A bound listener waiting to serve an [`Engine`].
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use gantry::{Context, Engine, StatusCode};
/// use gantry::server::{Server, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut engine = Engine::with_defaults();
///     engine.get("/", |ctx: &mut Context| ctx.string(StatusCode::Ok, "Hello!"));
///
///     let config = ServerConfig::new().with_max_request_size(1024 * 1024);
///     let server = Server::bind_with_config("127.0.0.1:9000", config).await?;
///     server.serve(Arc::new(engine)).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
}

impl Server {
    /// Binds to `addr` with the default [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        Self::bind_with_config(addr, ServerConfig::default()).await
    }

    /// Binds to `addr` with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind_with_config(
        addr: impl AsRef<str>,
        config: ServerConfig,
    ) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections forever, dispatching every request to `engine`.
    ///
    /// # Errors
    ///
    /// Accept failures are logged and skipped; this only returns if the listener
    /// itself cannot be used.
    pub async fn serve(self, engine: Arc<Engine>) -> Result<(), ServerError> {
        info!(address = %self.local_addr, "gantry listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let engine = Arc::clone(&engine);
            let config = self.config.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, engine, config).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Serves requests on one connection until the peer closes it or asks to.
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    engine: Arc<Engine>,
    config: ServerConfig,
) -> Result<(), std::io::Error> {
    let mut buf = BytesMut::with_capacity(config.initial_buffer_size());

    loop {
        // Bytes left over from a pipelined request are parsed before reading again.
        if buf.is_empty() && stream.read_buf(&mut buf).await? == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            break;
        }

        if buf.len() > config.max_request_size() {
            warn!(peer = %peer_addr, "request too large — sending 413");
            let response = Response::new(StatusCode::PayloadTooLarge)
                .body("Request entity too large")
                .keep_alive(false);
            stream.write_all(&response.into_bytes()).await?;
            break;
        }

        let (request, body_offset) = match Request::parse(&buf) {
            Ok(pair) => pair,
            Err(RequestError::Incomplete) => {
                if stream.read_buf(&mut buf).await? == 0 {
                    break;
                }
                continue;
            }
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request — sending 400");
                let response = Response::new(StatusCode::BadRequest)
                    .body(format!("Bad Request: {e}"))
                    .keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                break;
            }
        };

        let total_needed = body_offset + request.content_length().unwrap_or(0);
        if buf.len() < total_needed {
            if stream.read_buf(&mut buf).await? == 0 {
                break;
            }
            continue;
        }
        let _ = buf.split_to(total_needed);

        let keep_alive = request.is_keep_alive();
        debug!(
            peer = %peer_addr,
            method = %request.method(),
            path = %request.path(),
            "dispatching request"
        );

        let engine = Arc::clone(&engine);
        let response = match tokio::task::spawn_blocking(move || engine.serve(request)).await {
            Ok(response) => {
                let keep = keep_alive && response.is_keep_alive();
                response.keep_alive(keep)
            }
            Err(e) => {
                error!(peer = %peer_addr, error = %e, "handler fault escaped the chain");
                Response::new(StatusCode::InternalServerError)
                    .body("Internal Server Error")
                    .keep_alive(false)
            }
        };

        let close = !response.is_keep_alive();
        stream.write_all(&response.into_bytes()).await?;
        stream.flush().await?;

        if close {
            debug!(peer = %peer_addr, "closing connection");
            break;
        }
    }

    Ok(())
}

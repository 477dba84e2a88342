// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only metrics endpoint.
//!
//! A single accept loop, one request per connection, no keep-alive. Three
//! request shapes: the static dashboard at `/` (or `/dashboard`), the JSON
//! snapshot at `/api/metrics`, and 404 for everything else. The endpoint
//! never mutates core state.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use ptc_core::{Metrics, StopSignal};
use ptc_engine::WatcherShared;

/// Per-request receive and send budget.
const IO_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound on the request head we are willing to read.
const MAX_REQUEST_BYTES: usize = 8 * 1024;

/// The dashboard is an opaque static payload; its contents are not part of
/// the core contract.
const DASHBOARD_HTML: &str = include_str!("assets/dashboard.html");

/// Read-only view of the pipeline handed to the endpoint.
#[derive(Clone)]
pub struct ServerCtx {
    pub metrics: Metrics,
    pub watchers: Vec<Arc<WatcherShared>>,
    pub stop: StopSignal,
}

impl ServerCtx {
    fn snapshot_json(&self) -> String {
        let folders = self.watchers.iter().map(|w| w.status()).collect();
        let snapshot = self.metrics.snapshot(folders, true);
        serde_json::to_string(&snapshot).unwrap_or_else(|e| {
            warn!(error = %e, "metrics serialization failed");
            "{}".to_string()
        })
    }
}

/// The metrics TCP listener.
pub struct MetricsServer {
    listener: TcpListener,
}

impl MetricsServer {
    /// Bind the configured port. A failure here disables the endpoint; the
    /// core continues without it.
    pub async fn bind(port: u16) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        info!(port, "metrics endpoint listening");
        Ok(Self { listener })
    }

    /// Actual bound port (differs from the configured one only in tests,
    /// which bind port 0).
    pub fn port(&self) -> std::io::Result<u16> {
        self.listener.local_addr().map(|a| a.port())
    }

    /// Accept until the stop signal fires. Connections are handled inline:
    /// the endpoint is read-only and each exchange is bounded by
    /// [`IO_TIMEOUT`], so serialized handling keeps shutdown prompt.
    pub async fn run(self, ctx: ServerCtx) {
        loop {
            tokio::select! {
                _ = ctx.stop.wait() => break,

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "connection accepted");
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            debug!(%peer, error = %e, "connection error");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                },
            }
        }
        info!("metrics endpoint stopped");
    }
}

/// Serve exactly one request, then close.
async fn handle_connection(mut stream: TcpStream, ctx: &ServerCtx) -> std::io::Result<()> {
    let head = tokio::time::timeout(IO_TIMEOUT, read_request_head(&mut stream))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "recv timeout"))??;

    let response = match parse_request_line(&head) {
        Some(("GET", "/")) | Some(("GET", "/dashboard")) => {
            render_response("200 OK", "text/html; charset=utf-8", DASHBOARD_HTML)
        }
        Some(("GET", "/api/metrics")) => {
            render_response("200 OK", "application/json", &ctx.snapshot_json())
        }
        _ => render_response("404 Not Found", "text/plain", "Not Found"),
    };

    tokio::time::timeout(IO_TIMEOUT, stream.write_all(response.as_bytes()))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "send timeout"))??;
    stream.shutdown().await
}

/// Read until the end of the request head (blank line) or EOF.
async fn read_request_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::with_capacity(512);
    let mut chunk = [0u8; 512];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// `"GET /api/metrics HTTP/1.1"` -> `("GET", "/api/metrics")`.
fn parse_request_line(head: &str) -> Option<(&str, &str)> {
    let line = head.lines().next()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let path = parts.next()?;
    Some((method, path))
}

fn render_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len(),
    )
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;

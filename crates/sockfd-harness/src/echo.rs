//! Blocking echo server and one-shot ping built on the primitives.
//!
//! The server handles one connection at a time on the calling thread. Every
//! accept, read and write goes through the timeout-aware primitives, so an
//! idle listener or a silent peer is observed as a `timeout` event instead
//! of hanging the loop.

use std::time::Instant;

use serde_json::json;
use sockfd_core::{Handle, Operation, SocketError};

use crate::error::HarnessError;
use crate::fd::OwnedHandle;
use crate::structured_log::{LogEmitter, LogLevel, Outcome};

#[derive(Debug, Clone)]
pub struct EchoOptions {
    pub accept_timeout: Option<f64>,
    pub io_timeout: Option<f64>,
    /// Stop after serving this many connections. `None` serves forever.
    pub max_connections: Option<usize>,
    pub buffer_size: usize,
}

impl Default for EchoOptions {
    fn default() -> Self {
        Self {
            accept_timeout: Some(1.0),
            io_timeout: Some(5.0),
            max_connections: None,
            buffer_size: 4096,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EchoStats {
    pub connections: usize,
    pub bytes_echoed: usize,
    pub idle_accepts: usize,
}

/// Creates, binds and listens on `host:port`. Returns the listener and the
/// port actually bound, which differs from `port` when it is 0.
pub fn bind_listener(host: &str, port: u16, backlog: i32) -> Result<(OwnedHandle, u16), HarnessError> {
    let listener = OwnedHandle::new(sockfd::create()?);
    sockfd::bind(listener.get(), host, port)?;
    sockfd::listen(listener.get(), backlog)?;
    let port = listener.local_port()?;
    Ok((listener, port))
}

/// Serves connections on `listener` until `max_connections` is reached.
///
/// Accept timeouts are idle ticks, not errors. Per-connection failures are
/// logged and end that connection only.
pub fn serve(
    listener: Handle,
    options: &EchoOptions,
    emitter: &mut LogEmitter,
) -> Result<EchoStats, HarnessError> {
    let mut stats = EchoStats::default();
    let mut buf = vec![0u8; options.buffer_size.max(1)];

    while options.max_connections.is_none_or(|max| stats.connections < max) {
        let conn = match sockfd::accept(listener, options.accept_timeout) {
            Ok(handle) => OwnedHandle::new(handle),
            Err(SocketError::Timeout) => {
                stats.idle_accepts += 1;
                let idle = emitter
                    .entry(LogLevel::Trace, "accept_idle")
                    .with_op(Operation::Accept)
                    .with_handle(listener)
                    .with_timeout(options.accept_timeout)
                    .with_outcome(Outcome::Timeout);
                emitter.emit_entry(idle)?;
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        stats.connections += 1;
        let opened = emitter
            .entry(LogLevel::Info, "connection_open")
            .with_op(Operation::Accept)
            .with_handle(conn.get());
        emitter.emit_entry(opened)?;

        let started = Instant::now();
        let (echoed, ended) = echo_connection(conn.get(), &mut buf, options.io_timeout);
        stats.bytes_echoed += echoed;

        let mut closed = emitter
            .entry(LogLevel::Info, "connection_close")
            .with_handle(conn.get())
            .with_bytes(echoed)
            .with_latency_ns(u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX));
        closed = match ended {
            ConnectionEnd::PeerClosed => closed.with_outcome(Outcome::Pass),
            ConnectionEnd::Failed(op, err) => {
                let outcome = if err.is_timeout() {
                    Outcome::Timeout
                } else {
                    Outcome::Error
                };
                closed.level = LogLevel::Warn;
                closed
                    .with_op(op)
                    .with_timeout(options.io_timeout)
                    .with_outcome(outcome)
                    .with_error(&err)
            }
        };
        emitter.emit_entry(closed)?;
        emitter.flush()?;
    }
    Ok(stats)
}

enum ConnectionEnd {
    PeerClosed,
    Failed(Operation, SocketError),
}

fn echo_connection(conn: Handle, buf: &mut [u8], timeout: Option<f64>) -> (usize, ConnectionEnd) {
    let mut echoed = 0;
    loop {
        let n = match sockfd::recv(conn, buf, timeout) {
            Ok(0) => return (echoed, ConnectionEnd::PeerClosed),
            Ok(n) => n,
            Err(err) => return (echoed, ConnectionEnd::Failed(Operation::Recv, err)),
        };
        if let Err(err) = send_all(conn, &buf[..n], timeout) {
            return (echoed, ConnectionEnd::Failed(Operation::Send, err));
        }
        echoed += n;
    }
}

/// Sends all of `data`, looping over partial sends.
pub fn send_all(handle: Handle, mut data: &[u8], timeout: Option<f64>) -> Result<(), SocketError> {
    while !data.is_empty() {
        let n = sockfd::send(handle, data, timeout)?;
        data = &data[n..];
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Ping
// ---------------------------------------------------------------------------

/// Result of one ping exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingReply {
    pub sent: usize,
    pub reply: Vec<u8>,
}

/// Connects to `host:port`, sends `payload`, and reads until as many bytes
/// come back, the peer closes, or a read waits longer than `timeout`.
pub fn ping(
    host: &str,
    port: u16,
    payload: &[u8],
    timeout: Option<f64>,
) -> Result<PingReply, SocketError> {
    let conn = OwnedHandle::new(sockfd::create()?);
    sockfd::connect(conn.get(), host, port)?;
    send_all(conn.get(), payload, timeout)?;

    let mut reply = Vec::with_capacity(payload.len());
    let mut buf = [0u8; 4096];
    while reply.len() < payload.len() {
        let n = sockfd::recv(conn.get(), &mut buf, timeout)?;
        if n == 0 {
            break;
        }
        reply.extend_from_slice(&buf[..n]);
    }
    Ok(PingReply {
        sent: payload.len(),
        reply,
    })
}

/// Logs a ping result as one JSONL record.
pub fn log_ping(
    emitter: &mut LogEmitter,
    host: &str,
    port: u16,
    timeout: Option<f64>,
    result: &Result<PingReply, SocketError>,
) -> std::io::Result<()> {
    let entry = emitter
        .entry(LogLevel::Info, "ping")
        .with_timeout(timeout);
    let entry = match result {
        Ok(reply) => entry
            .with_outcome(Outcome::Pass)
            .with_bytes(reply.reply.len())
            .with_details(json!({
                "target": format!("{host}:{port}"),
                "sent": reply.sent,
                "reply": String::from_utf8_lossy(&reply.reply),
            })),
        Err(err) => {
            let outcome = if err.is_timeout() {
                Outcome::Timeout
            } else {
                Outcome::Error
            };
            let mut entry = entry
                .with_outcome(outcome)
                .with_error(err)
                .with_details(json!({
                    "target": format!("{host}:{port}"),
                    "error": err.to_string(),
                }));
            entry.level = LogLevel::Error;
            entry
        }
    };
    emitter.emit_entry(entry)?;
    emitter.flush()
}

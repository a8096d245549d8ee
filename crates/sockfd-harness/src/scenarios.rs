//! Conformance scenarios.
//!
//! Each scenario drives the primitives over live loopback sockets and checks
//! one observable property: handle identity, the timeout/immediate split of
//! the readiness phase, byte delivery, and the failure taxonomy.

use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;
use sockfd_core::{ErrorKind, Handle, Operation, OsError, SocketError};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, ensure};
use crate::fd::OwnedHandle;

/// What every scenario needs from the run configuration.
#[derive(Debug, Clone)]
pub struct ScenarioContext {
    pub host: String,
    pub short_timeout: f64,
}

impl From<&HarnessConfig> for ScenarioContext {
    fn from(cfg: &HarnessConfig) -> Self {
        Self {
            host: cfg.host.clone(),
            short_timeout: cfg.short_timeout,
        }
    }
}

impl Default for ScenarioContext {
    fn default() -> Self {
        Self::from(&HarnessConfig::default())
    }
}

/// What a passing scenario saw.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    pub timeout: Option<f64>,
    pub bytes: Option<usize>,
    pub details: serde_json::Value,
}

impl Observation {
    fn new(details: serde_json::Value) -> Self {
        Self {
            details,
            ..Self::default()
        }
    }

    fn with_timeout(mut self, timeout: f64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn with_bytes(mut self, bytes: usize) -> Self {
        self.bytes = Some(bytes);
        self
    }
}

type ScenarioFn = fn(&ScenarioContext) -> Result<Observation, HarnessError>;

/// A named property check.
pub struct Scenario {
    pub name: &'static str,
    pub op: Operation,
    pub summary: &'static str,
    run: ScenarioFn,
}

/// Result of one scenario run.
#[derive(Debug)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub op: Operation,
    pub latency_ns: u64,
    pub result: Result<Observation, HarnessError>,
}

impl ScenarioReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

impl Scenario {
    pub fn run(&self, ctx: &ScenarioContext) -> ScenarioReport {
        let start = Instant::now();
        let result = (self.run)(ctx);
        ScenarioReport {
            name: self.name,
            op: self.op,
            latency_ns: u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX),
            result,
        }
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("op", &self.op)
            .finish_non_exhaustive()
    }
}

static SCENARIOS: [Scenario; 14] = [
    Scenario {
        name: "accept_yields_new_handle",
        op: Operation::Accept,
        summary: "accept with a long timeout returns a handle distinct from the listener",
        run: accept_yields_new_handle,
    },
    Scenario {
        name: "accept_zero_timeout_is_immediate",
        op: Operation::Accept,
        summary: "accept with no or zero timeout calls accept(2) directly",
        run: accept_zero_timeout_is_immediate,
    },
    Scenario {
        name: "recv_zero_timeout_is_immediate",
        op: Operation::Recv,
        summary: "recv with no or zero timeout calls recv(2) directly",
        run: recv_zero_timeout_is_immediate,
    },
    Scenario {
        name: "send_zero_timeout_is_immediate",
        op: Operation::Send,
        summary: "send with no or zero timeout calls send(2) directly",
        run: send_zero_timeout_is_immediate,
    },
    Scenario {
        name: "accept_times_out",
        op: Operation::Accept,
        summary: "accept on an idle listener fails with timeout near the deadline",
        run: accept_times_out,
    },
    Scenario {
        name: "recv_times_out",
        op: Operation::Recv,
        summary: "recv on a silent connection fails with timeout near the deadline",
        run: recv_times_out,
    },
    Scenario {
        name: "send_times_out",
        op: Operation::Send,
        summary: "send on a full connection fails with timeout near the deadline",
        run: send_times_out,
    },
    Scenario {
        name: "send_recv_in_order",
        op: Operation::Recv,
        summary: "bytes sent arrive unchanged and in order",
        run: send_recv_in_order,
    },
    Scenario {
        name: "recv_bounded_by_buffer",
        op: Operation::Recv,
        summary: "recv never reports or writes more than the buffer holds",
        run: recv_bounded_by_buffer,
    },
    Scenario {
        name: "fractional_timeout",
        op: Operation::Accept,
        summary: "a 1.5 s timeout keeps its 500 000 us sub-second part",
        run: fractional_timeout,
    },
    Scenario {
        name: "bind_address_in_use",
        op: Operation::Bind,
        summary: "binding an already-bound address fails with a bind error",
        run: bind_address_in_use,
    },
    Scenario {
        name: "connect_rejects_bad_host",
        op: Operation::Connect,
        summary: "connect to a non-IPv4 host fails with an address parse error",
        run: connect_rejects_bad_host,
    },
    Scenario {
        name: "connect_refused",
        op: Operation::Connect,
        summary: "connect to a port nobody listens on fails with ECONNREFUSED",
        run: connect_refused,
    },
    Scenario {
        name: "invalid_handle_reports_ebadf",
        op: Operation::Accept,
        summary: "operations on an invalid handle surface EBADF",
        run: invalid_handle_reports_ebadf,
    },
];

/// Every scenario, in run order.
#[must_use]
pub fn all() -> &'static [Scenario] {
    &SCENARIOS
}

#[must_use]
pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const LONG_TIMEOUT: f64 = 10.0;
// poll(2) may return a hair early on coarse clocks.
const EARLY_SLACK: Duration = Duration::from_millis(10);
const LATE_SLACK: Duration = Duration::from_secs(2);

fn create() -> Result<OwnedHandle, HarnessError> {
    Ok(OwnedHandle::new(sockfd::create()?))
}

fn bound(ctx: &ScenarioContext) -> Result<(OwnedHandle, u16), HarnessError> {
    let handle = create()?;
    sockfd::bind(handle.get(), &ctx.host, 0)?;
    let port = handle.local_port()?;
    Ok((handle, port))
}

fn listener(ctx: &ScenarioContext) -> Result<(OwnedHandle, u16), HarnessError> {
    let (handle, port) = bound(ctx)?;
    sockfd::listen(handle.get(), 8)?;
    Ok((handle, port))
}

fn connect(host: &str, port: u16) -> Result<OwnedHandle, SocketError> {
    let handle = OwnedHandle::new(sockfd::create()?);
    sockfd::connect(handle.get(), host, port)?;
    Ok(handle)
}

fn connect_later(
    host: &str,
    port: u16,
    delay: Duration,
) -> thread::JoinHandle<Result<OwnedHandle, SocketError>> {
    let host = host.to_string();
    thread::spawn(move || {
        thread::sleep(delay);
        connect(&host, port)
    })
}

fn join(
    connector: thread::JoinHandle<Result<OwnedHandle, SocketError>>,
) -> Result<OwnedHandle, HarnessError> {
    connector
        .join()
        .map_err(|_| HarnessError::check("connector thread panicked"))?
        .map_err(HarnessError::from)
}

/// A connected `(client, server)` pair.
fn connected_pair(ctx: &ScenarioContext) -> Result<(OwnedHandle, OwnedHandle), HarnessError> {
    let (listener, port) = listener(ctx)?;
    let client = connect(&ctx.host, port)?;
    let server = OwnedHandle::new(sockfd::accept(listener.get(), Some(LONG_TIMEOUT))?);
    Ok((client, server))
}

fn is_would_block(err: &SocketError) -> bool {
    matches!(
        err.os_error().map(|e| e.name()),
        Some("EAGAIN" | "EWOULDBLOCK")
    )
}

/// Fills `writer`'s send path until the kernel refuses more. Leaves `writer`
/// non-blocking.
fn saturate(writer: &OwnedHandle) -> Result<usize, HarnessError> {
    writer.set_nonblocking(true)?;
    let chunk = vec![0x5a_u8; 64 * 1024];
    let mut total = 0;
    loop {
        loop {
            match sockfd::send(writer.get(), &chunk, None) {
                Ok(n) => total += n,
                Err(err) if is_would_block(&err) => break,
                Err(err) => return Err(err.into()),
            }
        }
        // In-flight segments may still be acknowledged; settle and re-check.
        thread::sleep(Duration::from_millis(50));
        match sockfd::send(writer.get(), &chunk, None) {
            Err(err) if is_would_block(&err) => return Ok(total),
            Ok(n) => total += n,
            Err(err) => return Err(err.into()),
        }
    }
}

fn expect_err<T: std::fmt::Debug>(
    result: Result<T, SocketError>,
    what: &str,
) -> Result<SocketError, HarnessError> {
    match result {
        Err(err) => Ok(err),
        Ok(value) => Err(HarnessError::check(format!(
            "{what}: expected a failure, got {value:?}"
        ))),
    }
}

fn ensure_kind(err: &SocketError, kind: ErrorKind) -> Result<(), HarnessError> {
    ensure(err.kind() == kind, || {
        format!("expected {kind} failure, got {err}")
    })
}

fn ensure_immediate(err: &SocketError, kind: ErrorKind) -> Result<(), HarnessError> {
    ensure_kind(err, kind)?;
    ensure(is_would_block(err), || {
        format!("expected EAGAIN from the bare syscall, got {err}")
    })
}

fn ensure_waited(elapsed: Duration, secs: f64) -> Result<(), HarnessError> {
    let target = Duration::from_secs_f64(secs);
    ensure(
        elapsed + EARLY_SLACK >= target && elapsed < target + LATE_SLACK,
        || format!("waited {elapsed:?}, expected about {secs}s"),
    )
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

fn accept_yields_new_handle(ctx: &ScenarioContext) -> Result<Observation, HarnessError> {
    let (listener, port) = listener(ctx)?;
    let connector = connect_later(&ctx.host, port, Duration::from_millis(20));
    let accepted = OwnedHandle::new(sockfd::accept(listener.get(), Some(LONG_TIMEOUT))?);
    let client = join(connector)?;

    ensure(accepted.get() != listener.get(), || {
        format!("accepted handle {} equals the listener", accepted.get())
    })?;
    ensure(accepted.get() != client.get(), || {
        format!("accepted handle {} equals the client", accepted.get())
    })?;
    Ok(Observation::new(json!({
        "listener": listener.get().as_raw(),
        "accepted": accepted.get().as_raw(),
    }))
    .with_timeout(LONG_TIMEOUT))
}

fn accept_zero_timeout_is_immediate(ctx: &ScenarioContext) -> Result<Observation, HarnessError> {
    let (listener, _) = listener(ctx)?;
    listener.set_nonblocking(true)?;
    let mut seen = Vec::new();
    for timeout in [None, Some(0.0)] {
        let err = expect_err(sockfd::accept(listener.get(), timeout), "accept")?;
        ensure_immediate(&err, ErrorKind::Accept)?;
        seen.push(err.to_string());
    }
    Ok(Observation::new(json!({ "errors": seen })).with_timeout(0.0))
}

fn recv_zero_timeout_is_immediate(ctx: &ScenarioContext) -> Result<Observation, HarnessError> {
    let (_client, server) = connected_pair(ctx)?;
    server.set_nonblocking(true)?;
    let mut buf = [0u8; 16];
    let mut seen = Vec::new();
    for timeout in [None, Some(0.0)] {
        let err = expect_err(sockfd::recv(server.get(), &mut buf, timeout), "recv")?;
        ensure_immediate(&err, ErrorKind::Recv)?;
        seen.push(err.to_string());
    }
    Ok(Observation::new(json!({ "errors": seen })).with_timeout(0.0))
}

fn send_zero_timeout_is_immediate(ctx: &ScenarioContext) -> Result<Observation, HarnessError> {
    let (client, _server) = connected_pair(ctx)?;
    let queued = saturate(&client)?;
    let mut seen = Vec::new();
    for timeout in [None, Some(0.0)] {
        let err = expect_err(sockfd::send(client.get(), b"x", timeout), "send")?;
        ensure_immediate(&err, ErrorKind::Send)?;
        seen.push(err.to_string());
    }
    Ok(Observation::new(json!({ "errors": seen, "queued": queued })).with_timeout(0.0))
}

fn accept_times_out(ctx: &ScenarioContext) -> Result<Observation, HarnessError> {
    let (listener, _) = listener(ctx)?;
    let start = Instant::now();
    let err = expect_err(sockfd::accept(listener.get(), Some(ctx.short_timeout)), "accept")?;
    let elapsed = start.elapsed();
    ensure_kind(&err, ErrorKind::Timeout)?;
    ensure_waited(elapsed, ctx.short_timeout)?;
    Ok(Observation::new(json!({ "elapsed_ns": elapsed.as_nanos() as u64 }))
        .with_timeout(ctx.short_timeout))
}

fn recv_times_out(ctx: &ScenarioContext) -> Result<Observation, HarnessError> {
    let (_client, server) = connected_pair(ctx)?;
    let mut buf = [0xffu8; 8];
    let start = Instant::now();
    let err = expect_err(
        sockfd::recv(server.get(), &mut buf, Some(ctx.short_timeout)),
        "recv",
    )?;
    let elapsed = start.elapsed();
    ensure_kind(&err, ErrorKind::Timeout)?;
    ensure_waited(elapsed, ctx.short_timeout)?;
    ensure(buf == [0xff; 8], || {
        "a timed-out recv wrote into the buffer".to_string()
    })?;
    Ok(Observation::new(json!({ "elapsed_ns": elapsed.as_nanos() as u64 }))
        .with_timeout(ctx.short_timeout))
}

fn send_times_out(ctx: &ScenarioContext) -> Result<Observation, HarnessError> {
    let (client, _server) = connected_pair(ctx)?;
    let queued = saturate(&client)?;
    client.set_nonblocking(false)?;

    let start = Instant::now();
    let err = expect_err(
        sockfd::send(client.get(), b"more", Some(ctx.short_timeout)),
        "send",
    )?;
    let elapsed = start.elapsed();
    ensure_kind(&err, ErrorKind::Timeout)?;
    ensure_waited(elapsed, ctx.short_timeout)?;
    Ok(Observation::new(json!({
        "elapsed_ns": elapsed.as_nanos() as u64,
        "queued": queued,
    }))
    .with_timeout(ctx.short_timeout))
}

fn send_recv_in_order(ctx: &ScenarioContext) -> Result<Observation, HarnessError> {
    let (client, server) = connected_pair(ctx)?;
    let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();

    let mut sent = 0;
    while sent < payload.len() {
        sent += sockfd::send(client.get(), &payload[sent..], Some(LONG_TIMEOUT))?;
    }

    let mut received = Vec::with_capacity(payload.len());
    let mut buf = [0u8; 97];
    while received.len() < payload.len() {
        let n = sockfd::recv(server.get(), &mut buf, Some(LONG_TIMEOUT))?;
        ensure(n <= buf.len(), || format!("recv reported {n} bytes into {}", buf.len()))?;
        ensure(n > 0, || "peer closed before all bytes arrived".to_string())?;
        received.extend_from_slice(&buf[..n]);
    }
    ensure(received == payload, || "received bytes differ from sent bytes".to_string())?;
    Ok(Observation::new(json!({ "chunk": buf.len() }))
        .with_timeout(LONG_TIMEOUT)
        .with_bytes(received.len()))
}

fn recv_bounded_by_buffer(ctx: &ScenarioContext) -> Result<Observation, HarnessError> {
    let (client, server) = connected_pair(ctx)?;
    sockfd::send(client.get(), &[1, 2, 3], None)?;
    thread::sleep(Duration::from_millis(50));

    let mut small = [0u8; 2];
    let first = sockfd::recv(server.get(), &mut small, None)?;
    ensure(first == 2 && small == [1, 2], || {
        format!("first read: {first} bytes, buffer {small:?}")
    })?;
    let second = sockfd::recv(server.get(), &mut small, None)?;
    ensure(second == 1 && small == [3, 2], || {
        format!("second read: {second} bytes, buffer {small:?}")
    })?;

    sockfd::send(client.get(), &[1, 2, 3], None)?;
    let mut roomy = [0u8; 4];
    let n = sockfd::recv(server.get(), &mut roomy, Some(LONG_TIMEOUT))?;
    ensure(n == 3 && roomy == [1, 2, 3, 0], || {
        format!("roomy read: {n} bytes, buffer {roomy:?}")
    })?;
    Ok(Observation::new(json!({ "reads": [first, second, n] })).with_bytes(first + second + n))
}

fn fractional_timeout(ctx: &ScenarioContext) -> Result<Observation, HarnessError> {
    const TIMEOUT: f64 = 1.5;
    let (listener, port) = listener(ctx)?;

    // Inside the window but past the whole-second part.
    let connector = connect_later(&ctx.host, port, Duration::from_millis(1200));
    let start = Instant::now();
    let accepted = sockfd::accept(listener.get(), Some(TIMEOUT)).map(OwnedHandle::new)?;
    let inside = start.elapsed();
    drop(accepted);
    drop(join(connector)?);
    ensure(inside >= Duration::from_millis(1100), || {
        format!("accepted after {inside:?}, before the peer connected")
    })?;

    // Past the window.
    let connector = connect_later(&ctx.host, port, Duration::from_millis(1900));
    let start = Instant::now();
    let err = expect_err(
        sockfd::accept(listener.get(), Some(TIMEOUT)).map(OwnedHandle::new),
        "late accept",
    )?;
    let outside = start.elapsed();
    drop(join(connector)?);
    ensure_kind(&err, ErrorKind::Timeout)?;
    ensure(
        outside >= Duration::from_millis(1490) && outside < Duration::from_millis(1900),
        || format!("timed out after {outside:?}, expected about 1.5s"),
    )?;
    Ok(Observation::new(json!({
        "inside_ns": inside.as_nanos() as u64,
        "outside_ns": outside.as_nanos() as u64,
    }))
    .with_timeout(TIMEOUT))
}

fn bind_address_in_use(ctx: &ScenarioContext) -> Result<Observation, HarnessError> {
    let (_first, port) = bound(ctx)?;
    let second = create()?;
    let err = expect_err(sockfd::bind(second.get(), &ctx.host, port), "second bind")?;
    ensure_kind(&err, ErrorKind::Bind)?;
    ensure(err.os_error().map(|e| e.name()) == Some("EADDRINUSE"), || {
        format!("expected EADDRINUSE, got {err}")
    })?;
    Ok(Observation::new(json!({ "port": port, "error": err.to_string() })))
}

fn connect_rejects_bad_host(_ctx: &ScenarioContext) -> Result<Observation, HarnessError> {
    // An invalid handle: had connect(2) run, the failure would be EBADF.
    let err = expect_err(
        sockfd::connect(Handle::from_raw(-1), "not-an-ip", 80),
        "connect",
    )?;
    ensure_kind(&err, ErrorKind::AddressParse)?;
    ensure(err.os_error().map(OsError::name) == Some("EINVAL"), || {
        format!("expected EINVAL on the address parse failure, got {err}")
    })?;
    Ok(Observation::new(json!({ "error": err.to_string() })))
}

fn connect_refused(ctx: &ScenarioContext) -> Result<Observation, HarnessError> {
    // Held bound so nothing else can start listening on it.
    let (_holder, port) = bound(ctx)?;
    let client = create()?;
    let err = expect_err(sockfd::connect(client.get(), &ctx.host, port), "connect")?;
    ensure_kind(&err, ErrorKind::Connect)?;
    ensure(err.os_error().map(|e| e.name()) == Some("ECONNREFUSED"), || {
        format!("expected ECONNREFUSED, got {err}")
    })?;
    Ok(Observation::new(json!({ "port": port, "error": err.to_string() })))
}

fn invalid_handle_reports_ebadf(_ctx: &ScenarioContext) -> Result<Observation, HarnessError> {
    let bad = Handle::from_raw(-1);
    let mut buf = [0u8; 4];
    let failures = [
        (ErrorKind::Listen, sockfd::listen(bad, 1).map(drop)),
        (ErrorKind::Accept, sockfd::accept(bad, None).map(drop)),
        (ErrorKind::Recv, sockfd::recv(bad, &mut buf, None).map(drop)),
        (ErrorKind::Send, sockfd::send(bad, &[1, 2, 3], None).map(drop)),
    ];
    let mut seen = Vec::new();
    for (kind, result) in failures {
        let err = expect_err(result, kind.as_str())?;
        ensure_kind(&err, kind)?;
        ensure(err.os_error().map(|e| e.name()) == Some("EBADF"), || {
            format!("expected EBADF, got {err}")
        })?;
        seen.push(err.to_string());
    }
    Ok(Observation::new(json!({ "errors": seen })))
}

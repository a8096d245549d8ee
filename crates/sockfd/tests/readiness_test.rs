//! Timing behaviour of the readiness phase on real loopback sockets.

mod common;

use std::time::{Duration, Instant};

use common::{
    close, connect_later, connected_pair, dup_to, is_would_block, listener, saturate,
    set_nonblocking,
};
use sockfd::{ErrorKind, Handle, Interest, SocketError};

const SHORT: f64 = 0.05;

fn assert_waited(elapsed: Duration, secs: f64) {
    // poll(2) may return a hair early on coarse clocks.
    let lower = Duration::from_secs_f64(secs) - Duration::from_millis(10);
    assert!(elapsed >= lower, "returned after {elapsed:?}, expected ~{secs}s");
    assert!(elapsed < Duration::from_secs_f64(secs) + Duration::from_secs(2));
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

#[test]
fn accept_times_out_with_no_pending_connection() {
    let (listener, _) = listener();
    let start = Instant::now();
    let err = sockfd::accept(listener, Some(SHORT)).unwrap_err();
    assert_eq!(err, SocketError::Timeout);
    assert_eq!(err.to_string(), "timeout");
    assert_waited(start.elapsed(), SHORT);
    close(listener);
}

#[test]
fn recv_times_out_with_no_data() {
    let (client, server) = connected_pair();
    let mut buf = [0xffu8; 8];
    let start = Instant::now();
    let err = sockfd::recv(server, &mut buf, Some(SHORT)).unwrap_err();
    assert!(err.is_timeout());
    assert_waited(start.elapsed(), SHORT);
    assert_eq!(buf, [0xff; 8], "a timed-out read leaves the buffer untouched");
    close(client);
    close(server);
}

#[test]
fn send_times_out_when_the_send_path_is_full() {
    let (client, server) = connected_pair();
    saturate(client, server);
    set_nonblocking(client, false);

    let start = Instant::now();
    let err = sockfd::send(client, b"more", Some(SHORT)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_waited(start.elapsed(), SHORT);
    close(client);
    close(server);
}

#[test]
fn fractional_timeout_keeps_its_sub_second_part() {
    let (listener, port) = listener();

    // Arrives inside 1.5s but after the whole-second part.
    let client = connect_later(port, Duration::from_millis(1200));
    let start = Instant::now();
    let accepted = sockfd::accept(listener, Some(1.5)).expect("connection inside the window");
    assert!(start.elapsed() >= Duration::from_millis(1100));
    close(accepted);
    close(client.join().unwrap());

    // Arrives after 1.5s: the wait must end near 1.5s, not 1s or 2s.
    let late = connect_later(port, Duration::from_millis(1900));
    let start = Instant::now();
    let err = sockfd::accept(listener, Some(1.5)).unwrap_err();
    let elapsed = start.elapsed();
    assert!(err.is_timeout());
    assert!(elapsed >= Duration::from_millis(1490), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1900), "{elapsed:?}");
    close(late.join().unwrap());
    close(listener);
}

// ---------------------------------------------------------------------------
// Immediate path
// ---------------------------------------------------------------------------

#[test]
fn zero_or_absent_timeout_goes_straight_to_the_syscall() {
    let (listener, _) = listener();
    set_nonblocking(listener, true);
    for timeout in [None, Some(0.0)] {
        // A wait would have reported Timeout; the bare accept reports EAGAIN.
        let err = sockfd::accept(listener, timeout).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Accept);
        assert!(is_would_block(&err), "{err}");
    }
    close(listener);

    let (client, server) = connected_pair();
    set_nonblocking(server, true);
    let mut buf = [0u8; 4];
    for timeout in [None, Some(0.0)] {
        let err = sockfd::recv(server, &mut buf, timeout).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Recv);
        assert!(is_would_block(&err), "{err}");
    }

    saturate(client, server);
    for timeout in [None, Some(0.0)] {
        let err = sockfd::send(client, b"x", timeout).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Send);
        assert!(is_would_block(&err), "{err}");
    }
    close(client);
    close(server);
}

#[test]
fn sub_microsecond_timeout_is_treated_as_zero() {
    let (listener, _) = listener();
    set_nonblocking(listener, true);
    let err = sockfd::accept(listener, Some(1e-9)).unwrap_err();
    assert!(is_would_block(&err), "{err}");
    close(listener);
}

// ---------------------------------------------------------------------------
// Ready within the window
// ---------------------------------------------------------------------------

#[test]
fn ready_handles_proceed_without_waiting_out_the_timeout() {
    let (client, server) = connected_pair();
    sockfd::send(client, b"hello", Some(5.0)).unwrap();

    let mut buf = [0u8; 16];
    let start = Instant::now();
    let n = sockfd::recv(server, &mut buf, Some(5.0)).unwrap();
    assert!(start.elapsed() < Duration::from_secs(4));
    assert!(n > 0);
    assert_eq!(&buf[..n], &b"hello"[..n]);
    close(client);
    close(server);
}

#[test]
fn wait_ready_is_usable_on_its_own() {
    let (client, server) = connected_pair();
    assert_eq!(sockfd::wait_ready(client, Interest::Writable, Some(1.0)), Ok(()));
    assert_eq!(
        sockfd::wait_ready(server, Interest::Readable, Some(SHORT)),
        Err(SocketError::Timeout)
    );
    close(client);
    close(server);
}

#[test]
fn high_numbered_handles_wait_like_any_other() {
    let (client, server) = connected_pair();
    let Some(high) = dup_to(server, 2000) else {
        eprintln!("RLIMIT_NOFILE hard limit is below 2001; skipping");
        close(client);
        close(server);
        return;
    };
    sockfd::send(client, b"hi", Some(1.0)).unwrap();

    let mut buf = [0u8; 8];
    let n = sockfd::recv(high, &mut buf, Some(1.0)).unwrap();
    assert_eq!(&buf[..n], b"hi");
    assert_eq!(
        sockfd::wait_ready(high, Interest::Readable, Some(SHORT)),
        Err(SocketError::Timeout)
    );
    assert_eq!(sockfd::send(high, b"ok", Some(1.0)), Ok(2));
    close(high);
    close(client);
    close(server);
}

#[test]
fn infinite_and_huge_timeouts_wait_for_readiness() {
    let (client, server) = connected_pair();
    sockfd::send(client, b"hi", Some(f64::INFINITY)).unwrap();

    let mut buf = [0u8; 1];
    assert_eq!(sockfd::recv(server, &mut buf, Some(f64::INFINITY)), Ok(1));
    assert_eq!(buf[0], b'h');
    assert_eq!(sockfd::recv(server, &mut buf, Some(1e300)), Ok(1));
    assert_eq!(buf[0], b'i');
    close(client);
    close(server);
}

#[test]
fn unbounded_accept_returns_once_a_peer_connects() {
    let (listener, port) = listener();
    let peer = connect_later(port, Duration::from_millis(50));
    let conn = sockfd::accept(listener, Some(f64::INFINITY)).unwrap();
    assert!(conn.as_raw() >= 0);
    close(peer.join().unwrap());
    close(conn);
    close(listener);
}

// ---------------------------------------------------------------------------
// Wait failures
// ---------------------------------------------------------------------------

#[test]
fn negative_timeout_is_rejected_by_the_wait() {
    let (listener, _) = listener();
    let err = sockfd::accept(listener, Some(-1.0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadinessWait);
    assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
    close(listener);
}

#[test]
fn wait_on_a_negative_handle_fails_with_ebadf() {
    let err = sockfd::wait_ready(Handle::from_raw(-1), Interest::Readable, Some(SHORT)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadinessWait);
    assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    assert_eq!(err.to_string(), "poll: EBADF, Bad file descriptor");
}

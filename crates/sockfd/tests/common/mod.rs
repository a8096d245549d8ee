//! Loopback fixtures shared by the integration tests.

#![allow(dead_code)]

use std::mem;
use std::os::fd::{FromRawFd, OwnedFd};
use std::thread;
use std::time::Duration;

use sockfd::{Handle, SocketError};

pub const LOOPBACK: &str = "127.0.0.1";

/// Closes a handle through std; the primitives have no close of their own.
pub fn close(handle: Handle) {
    // SAFETY: each test closes each handle it created exactly once.
    drop(unsafe { OwnedFd::from_raw_fd(handle.as_raw()) });
}

/// Port the kernel assigned to a socket bound to port 0.
pub fn local_port(handle: Handle) -> u16 {
    // SAFETY: zeroed sockaddr_in is a valid out-buffer for getsockname.
    let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
    // SAFETY: addr and len are live locals sized for a sockaddr_in.
    let rc = unsafe {
        libc::getsockname(
            handle.as_raw(),
            (&raw mut addr).cast::<libc::sockaddr>(),
            &mut len,
        )
    };
    assert_eq!(rc, 0, "getsockname should succeed on a bound socket");
    u16::from_be(addr.sin_port)
}

/// A socket bound to an ephemeral loopback port, not yet listening.
pub fn bound() -> (Handle, u16) {
    let handle = sockfd::create().expect("socket should be created");
    sockfd::bind(handle, LOOPBACK, 0).expect("ephemeral bind should succeed");
    let port = local_port(handle);
    (handle, port)
}

/// A listening socket on an ephemeral loopback port.
pub fn listener() -> (Handle, u16) {
    let (handle, port) = bound();
    sockfd::listen(handle, 8).expect("listen should succeed");
    (handle, port)
}

pub fn connect_to(port: u16) -> Handle {
    let client = sockfd::create().expect("socket should be created");
    sockfd::connect(client, LOOPBACK, port).expect("connect to local listener should succeed");
    client
}

/// Connects to `port` from another thread after `delay`.
pub fn connect_later(port: u16, delay: Duration) -> thread::JoinHandle<Handle> {
    thread::spawn(move || {
        thread::sleep(delay);
        connect_to(port)
    })
}

/// A connected `(client, server)` pair; the listener is already closed.
pub fn connected_pair() -> (Handle, Handle) {
    let (listener, port) = listener();
    let client = connect_to(port);
    let server = sockfd::accept(listener, Some(5.0)).expect("pending connection should be accepted");
    close(listener);
    (client, server)
}

pub fn set_nonblocking(handle: Handle, nonblocking: bool) {
    // SAFETY: fcntl on a descriptor with integer arguments only.
    unsafe {
        let flags = libc::fcntl(handle.as_raw(), libc::F_GETFL);
        assert!(flags >= 0, "F_GETFL should succeed");
        let flags = if nonblocking {
            flags | libc::O_NONBLOCK
        } else {
            flags & !libc::O_NONBLOCK
        };
        assert_eq!(libc::fcntl(handle.as_raw(), libc::F_SETFL, flags), 0);
    }
}

fn set_buffer(handle: Handle, option: libc::c_int, bytes: libc::c_int) {
    // SAFETY: the option value points at a live c_int of the given size.
    let rc = unsafe {
        libc::setsockopt(
            handle.as_raw(),
            libc::SOL_SOCKET,
            option,
            (&raw const bytes).cast(),
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    assert_eq!(rc, 0, "setsockopt should succeed");
}

pub fn is_would_block(err: &SocketError) -> bool {
    matches!(err.raw_os_error(), Some(code) if code == libc::EAGAIN || code == libc::EWOULDBLOCK)
}

/// Fills `writer`'s send path until the kernel refuses more, with the peer
/// never reading. Leaves `writer` non-blocking.
pub fn saturate(writer: Handle, reader: Handle) {
    set_buffer(writer, libc::SO_SNDBUF, 4096);
    set_buffer(reader, libc::SO_RCVBUF, 4096);
    set_nonblocking(writer, true);

    let chunk = [0x5au8; 4096];
    loop {
        loop {
            match sockfd::send(writer, &chunk, None) {
                Ok(_) => continue,
                Err(err) if is_would_block(&err) => break,
                Err(err) => panic!("unexpected send failure while saturating: {err}"),
            }
        }
        // In-flight segments may still be acknowledged; settle and re-check.
        thread::sleep(Duration::from_millis(50));
        match sockfd::send(writer, &chunk, None) {
            Err(err) if is_would_block(&err) => return,
            Ok(_) => continue,
            Err(err) => panic!("unexpected send failure while saturating: {err}"),
        }
    }
}

/// Duplicates `handle` onto descriptor number `target`, raising the soft
/// descriptor limit when it is in the way. `None` when the hard limit does
/// not allow `target`.
pub fn dup_to(handle: Handle, target: libc::c_int) -> Option<Handle> {
    let needed = libc::rlim_t::try_from(target).expect("target is non-negative") + 1;
    // SAFETY: zeroed rlimit is a valid out-buffer for getrlimit.
    let mut limit: libc::rlimit = unsafe { mem::zeroed() };
    // SAFETY: limit is a live local.
    assert_eq!(unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &raw mut limit) }, 0);
    if limit.rlim_cur < needed {
        if limit.rlim_max < needed {
            return None;
        }
        limit.rlim_cur = needed;
        // SAFETY: limit is a live local with rlim_cur <= rlim_max.
        assert_eq!(unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &raw const limit) }, 0);
    }
    // SAFETY: dup2 takes integer descriptors only.
    let fd = unsafe { libc::dup2(handle.as_raw(), target) };
    assert_eq!(fd, target, "dup2 should land on the requested descriptor");
    Some(Handle::from_raw(fd))
}

//! The seven socket primitives.
//!
//! Each function is one self-contained transaction against a handle: at most
//! one readiness wait, at most one syscall, one result. Failures come back
//! exactly as the kernel reported them.

use std::ffi::c_int;
use std::ptr;

use sockfd_core::{Handle, Operation, SocketError};

use crate::addr::{self, SOCKADDR_IN_LEN};
use crate::errno;
use crate::readiness::wait_before;

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
const SEND_FLAGS: c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
)))]
const SEND_FLAGS: c_int = 0;

#[inline]
fn syscall_ret_int(rc: c_int, op: Operation) -> Result<c_int, SocketError> {
    if rc < 0 {
        Err(SocketError::os(op, errno::last_os_error()))
    } else {
        Ok(rc)
    }
}

#[inline]
fn syscall_ret_size(rc: isize, op: Operation) -> Result<usize, SocketError> {
    usize::try_from(rc).map_err(|_| SocketError::os(op, errno::last_os_error()))
}

// ---------------------------------------------------------------------------
// socket
// ---------------------------------------------------------------------------

/// Creates a new TCP/IPv4 socket.
pub fn create() -> Result<Handle, SocketError> {
    // SAFETY: socket(2) takes no pointers.
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
    syscall_ret_int(fd, Operation::Create).map(Handle::from_raw)
}

// ---------------------------------------------------------------------------
// bind
// ---------------------------------------------------------------------------

/// Binds `handle` to the local endpoint `host:port`.
///
/// A malformed host fails with [`SocketError::AddressParse`] before any
/// syscall; otherwise failures are [`SocketError::Bind`].
pub fn bind(handle: Handle, host: &str, port: u16) -> Result<(), SocketError> {
    let addr = addr::socket_address(host, port)?;
    // SAFETY: addr is a fully initialised sockaddr_in of SOCKADDR_IN_LEN bytes.
    let rc = unsafe {
        libc::bind(
            handle.as_raw(),
            (&raw const addr).cast::<libc::sockaddr>(),
            SOCKADDR_IN_LEN,
        )
    };
    syscall_ret_int(rc, Operation::Bind).map(drop)
}

// ---------------------------------------------------------------------------
// listen
// ---------------------------------------------------------------------------

/// Marks a bound handle as accepting connections. `backlog` is handed to
/// the kernel unchanged.
pub fn listen(handle: Handle, backlog: i32) -> Result<(), SocketError> {
    // SAFETY: listen(2) takes no pointers.
    let rc = unsafe { libc::listen(handle.as_raw(), backlog) };
    syscall_ret_int(rc, Operation::Listen).map(drop)
}

// ---------------------------------------------------------------------------
// accept
// ---------------------------------------------------------------------------

/// Accepts one pending connection, returning its new handle.
///
/// With a positive `timeout`, first waits that long for the listener to
/// become readable. With no or zero timeout, calls `accept(2)` directly.
pub fn accept(handle: Handle, timeout: Option<f64>) -> Result<Handle, SocketError> {
    wait_before(Operation::Accept, handle, timeout)?;
    // SAFETY: null address out-params are permitted and mean "don't report".
    let fd = unsafe { libc::accept(handle.as_raw(), ptr::null_mut(), ptr::null_mut()) };
    syscall_ret_int(fd, Operation::Accept).map(Handle::from_raw)
}

// ---------------------------------------------------------------------------
// connect
// ---------------------------------------------------------------------------

/// Connects `handle` to `host:port`. Blocks for as long as the kernel does;
/// there is no component-level timeout here.
pub fn connect(handle: Handle, host: &str, port: u16) -> Result<(), SocketError> {
    let addr = addr::socket_address(host, port)?;
    // SAFETY: addr is a fully initialised sockaddr_in of SOCKADDR_IN_LEN bytes.
    let rc = unsafe {
        libc::connect(
            handle.as_raw(),
            (&raw const addr).cast::<libc::sockaddr>(),
            SOCKADDR_IN_LEN,
        )
    };
    syscall_ret_int(rc, Operation::Connect).map(drop)
}

// ---------------------------------------------------------------------------
// recv
// ---------------------------------------------------------------------------

/// Reads into `buf` from offset 0, returning how many bytes were written.
///
/// Never writes past `buf.len()`. A return of 0 is passed through as-is.
pub fn recv(handle: Handle, buf: &mut [u8], timeout: Option<f64>) -> Result<usize, SocketError> {
    wait_before(Operation::Recv, handle, timeout)?;
    // SAFETY: buf is writable for exactly buf.len() bytes.
    let rc = unsafe { libc::recv(handle.as_raw(), buf.as_mut_ptr().cast(), buf.len(), 0) };
    syscall_ret_size(rc, Operation::Recv)
}

// ---------------------------------------------------------------------------
// send
// ---------------------------------------------------------------------------

/// Writes from `buf`, returning how many bytes the kernel took. Partial
/// sends are returned as-is; looping is up to the caller.
pub fn send(handle: Handle, buf: &[u8], timeout: Option<f64>) -> Result<usize, SocketError> {
    wait_before(Operation::Send, handle, timeout)?;
    // SAFETY: buf is readable for exactly buf.len() bytes.
    let rc = unsafe { libc::send(handle.as_raw(), buf.as_ptr().cast(), buf.len(), SEND_FLAGS) };
    syscall_ret_size(rc, Operation::Send)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_handle_surfaces_operation_specific_errors() {
        let bad = Handle::from_raw(-1);
        assert!(matches!(listen(bad, 1), Err(SocketError::Listen(_))));
        assert!(matches!(accept(bad, None), Err(SocketError::Accept(_))));
        assert!(matches!(recv(bad, &mut [0u8; 4], None), Err(SocketError::Recv(_))));
        assert!(matches!(send(bad, b"abc", None), Err(SocketError::Send(_))));
        assert!(matches!(
            bind(bad, "127.0.0.1", 0),
            Err(SocketError::Bind(_))
        ));
    }

    #[test]
    fn bad_host_fails_before_the_handle_is_used() {
        // The handle is invalid too; only the parse failure can be reported.
        let bad = Handle::from_raw(-1);
        assert!(matches!(
            bind(bad, "not-an-ip", 80),
            Err(SocketError::AddressParse(_))
        ));
        assert!(matches!(
            connect(bad, "not-an-ip", 80),
            Err(SocketError::AddressParse(_))
        ));
    }

    #[test]
    fn ebadf_is_reported_verbatim() {
        let err = recv(Handle::from_raw(-1), &mut [0u8; 1], None).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
        assert_eq!(err.to_string(), "recv: EBADF, Bad file descriptor");
    }

    #[test]
    fn byte_counts_convert_only_when_non_negative() {
        assert_eq!(syscall_ret_size(0, Operation::Recv), Ok(0));
        assert_eq!(syscall_ret_size(4096, Operation::Send), Ok(4096));
        assert!(matches!(
            syscall_ret_size(-1, Operation::Recv),
            Err(SocketError::Recv(_))
        ));
    }
}

//! Handle ownership for harness code.
//!
//! The primitives hand out bare descriptors and never close them. These
//! helpers are the harness's only route to descriptor lifetime and the
//! socket queries the primitives don't cover.

#![allow(unsafe_code)]

use std::io;
use std::mem::ManuallyDrop;
use std::net::TcpStream;
use std::os::fd::{FromRawFd, OwnedFd};

use sockfd_core::Handle;

/// Closes `handle`. Negative handles are ignored.
pub fn close(handle: Handle) {
    if handle.as_raw() < 0 {
        return;
    }
    // SAFETY: callers pass a descriptor they own and never use it again.
    drop(unsafe { OwnedFd::from_raw_fd(handle.as_raw()) });
}

/// A handle closed on drop.
#[derive(Debug)]
pub struct OwnedHandle(Handle);

impl OwnedHandle {
    #[must_use]
    pub const fn new(handle: Handle) -> Self {
        Self(handle)
    }

    #[must_use]
    pub const fn get(&self) -> Handle {
        self.0
    }

    /// Gives up ownership without closing.
    #[must_use]
    pub fn release(self) -> Handle {
        let this = ManuallyDrop::new(self);
        this.0
    }

    /// Port the socket is bound to.
    pub fn local_port(&self) -> io::Result<u16> {
        with_stream(self.0, |s| s.local_addr().map(|addr| addr.port()))
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        with_stream(self.0, |s| s.set_nonblocking(nonblocking))
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        close(self.0);
    }
}

impl From<OwnedHandle> for OwnedFd {
    fn from(handle: OwnedHandle) -> Self {
        // SAFETY: ownership moves from the guard to the OwnedFd.
        unsafe { OwnedFd::from_raw_fd(handle.release().as_raw()) }
    }
}

// Runs `f` against a std view of the descriptor without taking ownership.
fn with_stream<T>(handle: Handle, f: impl FnOnce(&TcpStream) -> io::Result<T>) -> io::Result<T> {
    if handle.as_raw() < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no descriptor behind {handle}"),
        ));
    }
    // SAFETY: the descriptor stays owned by the caller; ManuallyDrop keeps the
    // borrowed stream from closing it.
    let stream = ManuallyDrop::new(unsafe { TcpStream::from_raw_fd(handle.as_raw()) });
    f(&stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_handles_are_left_alone() {
        close(Handle::from_raw(-1));
        let guard = OwnedHandle::new(Handle::from_raw(-1));
        assert_eq!(guard.local_port().unwrap_err().kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn guard_reports_bound_port_and_closes() {
        let handle = sockfd::create().unwrap();
        let guard = OwnedHandle::new(handle);
        sockfd::bind(guard.get(), "127.0.0.1", 0).unwrap();
        assert_ne!(guard.local_port().unwrap(), 0);
        guard.set_nonblocking(true).unwrap();
        let fd: OwnedFd = guard.into();
        drop(fd);
    }
}

//! Socket handles and operation identities.
//!
//! A [`Handle`] is the opaque integer the OS hands back from `socket(2)` or
//! `accept(2)`. It owns nothing: closing it is the caller's business, and
//! copying it never duplicates the underlying descriptor.

use std::fmt;

use crate::poll::Interest;

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Process-scoped identifier for an OS-level TCP socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(i32);

impl Handle {
    /// Wraps a raw descriptor. No validation happens here; an invalid value
    /// is reported by whichever operation first hands it to the kernel.
    #[must_use]
    pub const fn from_raw(fd: i32) -> Self {
        Self(fd)
    }

    /// The raw descriptor value.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

#[cfg(unix)]
impl std::os::fd::AsRawFd for Handle {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// The seven primitives, plus the readiness wait that three of them share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Bind,
    Listen,
    Accept,
    Connect,
    Recv,
    Send,
    Wait,
}

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Operation; 8] = [
        Operation::Create,
        Operation::Bind,
        Operation::Listen,
        Operation::Accept,
        Operation::Connect,
        Operation::Recv,
        Operation::Send,
        Operation::Wait,
    ];

    /// Name of the system call the operation bottoms out in.
    #[must_use]
    pub const fn syscall_name(self) -> &'static str {
        match self {
            Self::Create => "socket",
            Self::Bind => "bind",
            Self::Listen => "listen",
            Self::Accept => "accept",
            Self::Connect => "connect",
            Self::Recv => "recv",
            Self::Send => "send",
            Self::Wait => "poll",
        }
    }

    /// Readiness condition awaited before Phase 2, for the operations that
    /// take a timeout.
    #[must_use]
    pub const fn interest(self) -> Option<Interest> {
        match self {
            Self::Accept | Self::Recv => Some(Interest::Readable),
            Self::Send => Some(Interest::Writable),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.syscall_name())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

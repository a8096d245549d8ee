//! Failure taxonomy for the socket primitives.
//!
//! Every operation fails with exactly one [`SocketError`] variant. OS-level
//! failures carry the errno that caused them. [`SocketError::AddressParse`]
//! carries the `EINVAL` an address conversion reports once the platform
//! layer attaches it. [`SocketError::Timeout`] carries none because no
//! syscall failed.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::socket::Operation;

// ---------------------------------------------------------------------------
// OsError
// ---------------------------------------------------------------------------

/// An errno captured at the failing syscall.
///
/// Displays as `EADDRINUSE, Address already in use`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsError {
    code: i32,
    name: &'static str,
    message: String,
}

impl OsError {
    #[must_use]
    pub fn new(code: i32, name: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            name,
            message: message.into(),
        }
    }

    /// The raw errno value.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.code
    }

    /// Symbolic errno name, or `"UNKNOWN"`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The `strerror` text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.name, self.message)
    }
}

impl std::error::Error for OsError {}

// ---------------------------------------------------------------------------
// AddressParseError
// ---------------------------------------------------------------------------

/// The host string is not a dotted-decimal IPv4 address.
///
/// Displays as `invalid IPv4 address: "x" (EINVAL, Invalid argument)`, or
/// without the parenthesised part before an errno has been attached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid IPv4 address: {host:?}{}", os_suffix(.os))]
pub struct AddressParseError {
    host: String,
    #[source]
    os: Option<OsError>,
}

impl AddressParseError {
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            os: None,
        }
    }

    /// Attaches the errno the platform reports for a rejected address.
    #[must_use]
    pub fn with_os_error(mut self, os: OsError) -> Self {
        self.os = Some(os);
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn os_error(&self) -> Option<&OsError> {
        self.os.as_ref()
    }
}

fn os_suffix(os: &Option<OsError>) -> String {
    os.as_ref().map(|os| format!(" ({os})")).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// SocketError
// ---------------------------------------------------------------------------

/// Failure of one socket primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocketError {
    #[error(transparent)]
    AddressParse(#[from] AddressParseError),
    #[error("socket: {0}")]
    SocketCreate(OsError),
    #[error("bind: {0}")]
    Bind(OsError),
    #[error("listen: {0}")]
    Listen(OsError),
    #[error("connect: {0}")]
    Connect(OsError),
    #[error("accept: {0}")]
    Accept(OsError),
    #[error("recv: {0}")]
    Recv(OsError),
    #[error("send: {0}")]
    Send(OsError),
    /// The readiness wait elapsed. The operation itself was never attempted.
    #[error("timeout")]
    Timeout,
    /// The readiness wait itself failed, e.g. on a bad handle.
    #[error("poll: {0}")]
    ReadinessWait(OsError),
}

/// Fieldless mirror of [`SocketError`] for matching and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AddressParse,
    SocketCreate,
    Bind,
    Listen,
    Connect,
    Accept,
    Recv,
    Send,
    Timeout,
    ReadinessWait,
}

impl ErrorKind {
    pub const ALL: [Self; 10] = [
        Self::AddressParse,
        Self::SocketCreate,
        Self::Bind,
        Self::Listen,
        Self::Connect,
        Self::Accept,
        Self::Recv,
        Self::Send,
        Self::Timeout,
        Self::ReadinessWait,
    ];

    /// Stable snake_case label used in structured logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddressParse => "address_parse",
            Self::SocketCreate => "socket_create",
            Self::Bind => "bind",
            Self::Listen => "listen",
            Self::Connect => "connect",
            Self::Accept => "accept",
            Self::Recv => "recv",
            Self::Send => "send",
            Self::Timeout => "timeout",
            Self::ReadinessWait => "readiness_wait",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SocketError {
    /// Wraps an errno in the variant belonging to `op`.
    #[must_use]
    pub fn os(op: Operation, err: OsError) -> Self {
        match op {
            Operation::Create => Self::SocketCreate(err),
            Operation::Bind => Self::Bind(err),
            Operation::Listen => Self::Listen(err),
            Operation::Connect => Self::Connect(err),
            Operation::Accept => Self::Accept(err),
            Operation::Recv => Self::Recv(err),
            Operation::Send => Self::Send(err),
            Operation::Wait => Self::ReadinessWait(err),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::AddressParse(_) => ErrorKind::AddressParse,
            Self::SocketCreate(_) => ErrorKind::SocketCreate,
            Self::Bind(_) => ErrorKind::Bind,
            Self::Listen(_) => ErrorKind::Listen,
            Self::Connect(_) => ErrorKind::Connect,
            Self::Accept(_) => ErrorKind::Accept,
            Self::Recv(_) => ErrorKind::Recv,
            Self::Send(_) => ErrorKind::Send,
            Self::Timeout => ErrorKind::Timeout,
            Self::ReadinessWait(_) => ErrorKind::ReadinessWait,
        }
    }

    /// The captured errno, for the kinds that have one.
    #[must_use]
    pub const fn os_error(&self) -> Option<&OsError> {
        match self {
            Self::SocketCreate(e)
            | Self::Bind(e)
            | Self::Listen(e)
            | Self::Connect(e)
            | Self::Accept(e)
            | Self::Recv(e)
            | Self::Send(e)
            | Self::ReadinessWait(e) => Some(e),
            Self::AddressParse(e) => e.os_error(),
            Self::Timeout => None,
        }
    }

    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        self.os_error().map(OsError::code)
    }

    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl From<SocketError> for io::Error {
    fn from(err: SocketError) -> Self {
        let kind = match err.kind() {
            ErrorKind::Timeout => io::ErrorKind::TimedOut,
            ErrorKind::AddressParse => io::ErrorKind::InvalidInput,
            _ => match err.raw_os_error() {
                Some(code) => return io::Error::from_raw_os_error(code),
                None => io::ErrorKind::Other,
            },
        };
        io::Error::new(kind, err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! # sockfd
//!
//! Blocking TCP/IPv4 socket primitives over raw integer handles.
//!
//! Seven operations are exposed: [`create`], [`bind`], [`listen`],
//! [`accept`], [`connect`], [`recv`] and [`send`]. `accept`, `recv` and
//! `send` take an optional timeout in fractional seconds and run in two
//! phases:
//!
//! ```text
//! timeout? --none/zero--> operation (blocks as the socket is configured)
//!     |
//!     +--positive--> poll(2) on the one handle
//!                        ready    -> operation, attempted once
//!                        elapsed  -> SocketError::Timeout
//!                        failed   -> SocketError::ReadinessWait
//! ```
//!
//! Nothing is retained between calls: no handle tables, no retries, no
//! logging. Closing a handle is the caller's job.

mod errno;

pub mod addr;
pub mod readiness;
pub mod socket;

pub use addr::socket_address;
pub use readiness::wait_ready;
pub use socket::{accept, bind, connect, create, listen, recv, send};

pub use sockfd_core::{
    AddressParseError, ErrorKind, Handle, Interest, Ipv4Endpoint, Operation, OsError, SocketError,
};

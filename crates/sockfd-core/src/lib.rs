//! # sockfd-core
//!
//! Pure logic behind the `sockfd` blocking socket primitives.
//!
//! This crate holds everything that can be decided without touching the
//! kernel: IPv4 endpoint parsing, timeout decomposition for the readiness
//! wait, classification of wait results, and the error taxonomy shared by
//! every operation. No `unsafe` code is permitted at the crate level.

#![deny(unsafe_code)]

pub mod error;
pub mod inet;
pub mod poll;
pub mod socket;

pub use error::{AddressParseError, ErrorKind, OsError, SocketError};
pub use inet::Ipv4Endpoint;
pub use poll::{Interest, Readiness, WaitPlan, WaitTimeout};
pub use socket::{Handle, Operation};

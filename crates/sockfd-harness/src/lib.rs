//! Conformance harness for sockfd.
//!
//! This crate provides:
//! - Scenarios: each observable property of the primitives, exercised on
//!   live loopback sockets
//! - Structured logging: canonical JSONL records plus a SHA-256 artifact index
//! - Tools: a blocking echo server and a one-shot ping client built on the
//!   primitives
//!
//! The primitives never log; everything observable happens here.

#![deny(unsafe_code)]

pub mod config;
pub mod echo;
pub mod error;
pub mod fd;
pub mod runner;
pub mod scenarios;
pub mod structured_log;

pub use config::HarnessConfig;
pub use error::HarnessError;
pub use fd::OwnedHandle;
pub use runner::{ConformanceSummary, run_conformance};
pub use scenarios::{Scenario, ScenarioContext, ScenarioReport};

//! # da-core
//!
//! Core configuration, time source, and error handling for the device access
//! approval service.
//!
//! Every other crate in the workspace builds on the types defined here:
//!
//! - [`AppConfig`] is loaded once at process start and never mutated.
//! - [`Clock`] is the injectable notion of "now" used by time-sensitive checks.
//! - [`Error`] covers failures that are not specific to a protocol.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::AppConfig;
pub use error::{Error, Result};

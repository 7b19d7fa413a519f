//! Core shared library for the activity poller.
//!
//! This crate exposes the primitives the engine and the command line
//! depend on: configuration loading, region mapping, common errors,
//! canonical timestamp handling and logging setup.

pub mod config;
pub mod errors;
pub mod logging;
pub mod time;

pub use config::{Credentials, PollerConfig, Region};
pub use errors::{ConfigError, PollerError};

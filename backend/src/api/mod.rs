//! HTTP API module.
//!
//! This module provides the HTTP server, the response types and the live log
//! stream of the data model converter.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{app, start_server};
pub use types::*;

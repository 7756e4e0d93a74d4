//! HTTP server configuration.
//!
//! Values come from the environment (a `.env` file is loaded first by the
//! binary) and can be overridden by command-line flags.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::{ConfigError, ConfigResult};

pub const BIND_ADDR_VAR: &str = "CDE_BIND_ADDR";
pub const PORT_VAR: &str = "CDE_PORT";
pub const MAX_UPLOAD_BYTES_VAR: &str = "CDE_MAX_UPLOAD_BYTES";

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Largest accepted request body, uploads included.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `CDE_BIND_ADDR` (default: `0.0.0.0`)
    /// - `CDE_PORT` (default: 3000)
    /// - `CDE_MAX_UPLOAD_BYTES` (default: 10 MiB)
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            bind_addr: parse_var(&lookup, BIND_ADDR_VAR)?.unwrap_or(defaults.bind_addr),
            port: parse_var(&lookup, PORT_VAR)?.unwrap_or(defaults.port),
            max_upload_bytes: parse_var(&lookup, MAX_UPLOAD_BYTES_VAR)?
                .unwrap_or(defaults.max_upload_bytes),
        })
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn with_bind_addr(mut self, bind_addr: Option<IpAddr>) -> Self {
        if let Some(bind_addr) = bind_addr {
            self.bind_addr = bind_addr;
        }
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> ConfigResult<Option<T>> {
    match lookup(name).map(|raw| raw.trim().to_string()) {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                var: name.to_string(),
                value: raw,
            }),
    }
}

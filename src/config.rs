//! Configuration the binary assembles from the CLI and hands to the core.
//!
//! The core itself is configuration-agnostic: [`Server::new`](crate::server::Server::new)
//! takes plain [`ConnLimits`] and store handles, never a config file or CLI
//! parser. `ProxyConfig` exists only so `proxyd` has one place to turn
//! parsed arguments into the values the core needs.

use crate::limits::ConnLimits;

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub admin_host: String,
    pub admin_port: u16,
    pub limits: ConnLimits,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            admin_host: "127.0.0.1".to_string(),
            admin_port: 8090,
            limits: ConnLimits::default(),
        }
    }
}

/// Candidate ports the admin bootstrap retries, in order, when the
/// configured port fails to bind.
pub const PORT_FALLBACKS: [u16; 3] = [8081, 8888, 9000];

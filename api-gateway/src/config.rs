//! API gateway configuration.
//!
//! The gateway's own settings are the HTTP listen address and the path of
//! an optional JSON file with the coordinator configuration
//! (`fedchain::FedChainConfig`). Without a file every coordinator setting
//! keeps its default.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Environment variable naming the coordinator config file.
pub const CONFIG_ENV: &str = "FEDCHAIN_CONFIG";

/// Configuration for the API gateway HTTP server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
    /// Coordinator config file, if any.
    pub config_path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        // Safe to unwrap: fixed, valid address literal.
        // Bind to all interfaces so the container port mapping (8081→8081) is reachable
        // from the host when running under docker-compose.
        let addr: SocketAddr = "0.0.0.0:8081"
            .parse()
            .expect("hard-coded API listen address should parse");
        Self {
            listen_addr: addr,
            config_path: None,
        }
    }
}

impl ApiConfig {
    /// Defaults, with the config path taken from `FEDCHAIN_CONFIG` when set.
    pub fn from_env() -> Self {
        Self {
            config_path: std::env::var_os(CONFIG_ENV).map(PathBuf::from),
            ..Self::default()
        }
    }
}

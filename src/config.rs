//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `bridge.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig: Where the /getTelemetry endpoint listens.
//!     - LoggingConfig: Log filter and whether every reading is echoed.
//!     - SimulatorConfig: Optional synthetic producer (local or pushing to a hub).
//!
//! ==============================================================================

use anyhow::{bail, Context};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

/// Shortest simulator period we accept
const MIN_INTERVAL_MS: u64 = 50;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_telemetry: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimulatorConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    /// fixed seed for a reproducible stream
    pub seed: Option<u64>,
    /// push to a remote bridge instead of the local one
    pub hub_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0".to_string(), port: 8081 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_telemetry: true }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self { enabled: false, interval_ms: 1000, seed: None, hub_url: None }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.bind_address, self.port))
    }
}

impl BridgeConfig {
    /// Parse and validate a toml document
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: BridgeConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        Self::from_toml(&content)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            std::path::PathBuf::from("config").join("bridge.toml"),
            std::path::PathBuf::from("..").join("config").join("bridge.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            bail!("server.port must be non-zero");
        }
        self.server.socket_addr()?;
        if self.simulator.interval_ms < MIN_INTERVAL_MS {
            bail!("simulator.interval_ms must be at least {}", MIN_INTERVAL_MS);
        }
        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let simulator = match (self.simulator.enabled, &self.simulator.hub_url) {
            (false, _) => "off".to_string(),
            (true, None) => format!("local every {}ms", self.simulator.interval_ms),
            (true, Some(url)) => format!("push to {}", url),
        };
        println!("┌─────────────────────────────────────────┐");
        println!("│          BRIDGE CONFIGURATION           │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Listen: {}:{}", self.server.bind_address, self.server.port);
        println!("│ Log Level: {}", self.logging.level);
        println!("│ Simulator: {}", simulator);
        println!("└─────────────────────────────────────────┘");
    }
}

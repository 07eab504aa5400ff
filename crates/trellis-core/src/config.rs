//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory where published result artifacts live.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    /// Lifetime of an upload grant in seconds.
    #[serde(default = "default_grant_ttl_secs")]
    pub grant_ttl_secs: u64,
    /// Enable request tracing.
    #[serde(default)]
    pub enable_tracing: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("./data/results")
}

fn default_grant_ttl_secs() -> u64 {
    86400 // 24 hours
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            results_dir: default_results_dir(),
            grant_ttl_secs: default_grant_ttl_secs(),
            enable_tracing: false,
        }
    }
}

impl ServerConfig {
    /// Get the grant lifetime as a Duration.
    pub fn grant_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.grant_ttl_secs)
    }

    /// Validate server configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.results_dir.as_os_str().is_empty() {
            return Err("server.results_dir cannot be empty".to_string());
        }
        if self.grant_ttl_secs == 0 {
            return Err("server.grant_ttl_secs cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Core compute service configuration.
///
/// The gateway authenticates against the Core API with client credentials
/// and submits jobs on behalf of callers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoreApiConfig {
    /// Base URL of the Core API (e.g., "https://core.example.com").
    pub base_url: String,
    /// Client identifier for the credentials exchange.
    pub client_id: String,
    /// Client secret for the credentials exchange.
    /// WARNING: Prefer the TRELLIS_CORE__CLIENT_SECRET env var over storing
    /// this in a config file.
    pub client_secret: String,
    /// Scope requested during the credentials exchange.
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Safety margin subtracted from the token lifetime reported by Core.
    /// The cached lifetime never drops below 60 seconds.
    #[serde(default = "default_token_skew_secs")]
    pub token_skew_secs: u64,
}

fn default_scope() -> String {
    "jobs".to_string()
}

fn default_token_skew_secs() -> u64 {
    60
}

impl CoreApiConfig {
    /// Validate Core API configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("core.base_url cannot be empty".to_string());
        }
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err("core config requires both client_id and client_secret".to_string());
        }
        Ok(())
    }

    /// Create a test configuration pointing at a local mock Core.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            base_url: "http://127.0.0.1:1".to_string(),
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            scope: default_scope(),
            token_skew_secs: default_token_skew_secs(),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Core compute service configuration (required).
    pub core: CoreApiConfig,
}

impl AppConfig {
    /// Validate the whole configuration, failing on the first error.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.core.validate()?;
        Ok(())
    }

    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses a relative results directory and a dummy
    /// Core endpoint; tests override both.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            core: CoreApiConfig::for_testing(),
        }
    }
}

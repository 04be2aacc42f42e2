//! Minimal configuration loading for Easel.
//!
//! This crate provides configuration loading with minimal dependencies so
//! the server crate can pull it in without dragging the HTTP stack into
//! config parsing.
//!
//! # Configuration Philosophy
//!
//! Configuration is split into two categories:
//!
//! - **Infrastructure** (`InfraConfig`): Things that physically cannot change
//!   at runtime - the ComfyUI endpoint, bind addresses, telemetry endpoints,
//!   registry TTL.
//!
//! - **Bootstrap** (`BootstrapConfig`): Initial values that seed runtime
//!   state - the per-namespace generation defaults. After startup, the
//!   runtime defaults manager becomes the source of truth; `persist` writes
//!   its state back here.
//!
//! # Usage
//!
//! ```rust,no_run
//! use easelconf::EaselConfig;
//!
//! let config = EaselConfig::load().expect("Failed to load config");
//!
//! // Infrastructure (fixed)
//! println!("ComfyUI: {}", config.infra.backend.base_url);
//! println!("HTTP port: {}", config.infra.bind.http_port);
//!
//! // Bootstrap (seeds runtime)
//! for (key, value) in &config.bootstrap.defaults.image {
//!     println!("image default {} = {}", key, value);
//! }
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/easel/config.toml` (system)
//! 2. `~/.config/easel/config.toml` (user)
//! 3. `./easel.toml` (local override)
//! 4. Environment variables (`EASEL_*`)
//!
//! # Example Config
//!
//! ```toml
//! [backend]
//! base_url = "http://localhost:8188"
//! timeout_ms = 30000
//!
//! [bind]
//! http_port = 8085
//!
//! [telemetry]
//! otlp_endpoint = "127.0.0.1:4317"
//! log_level = "info"
//!
//! [registry]
//! ttl_hours = 24
//!
//! [defaults.image]
//! width = 768
//! model = "sd_xl_base_1.0.safetensors"
//! ```

pub mod bootstrap;
pub mod infra;
pub mod loader;

pub use bootstrap::{BootstrapConfig, DefaultsConfig};
pub use infra::{BackendConfig, BindConfig, InfraConfig, RegistryConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to write config file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Complete Easel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EaselConfig {
    /// Infrastructure - cannot change at runtime.
    #[serde(flatten)]
    pub infra: InfraConfig,

    /// Bootstrap - seeds runtime state.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl EaselConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/easel/config.toml`
    /// 3. `~/.config/easel/config.toml`
    /// 4. `./easel.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./easel.toml` override. System and user configs still load first.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and return information about sources.
    pub fn load_with_sources() -> Result<(Self, ConfigSources), ConfigError> {
        Self::load_with_sources_from(None)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = EaselConfig::default();

        // Load config files in order
        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        // Apply environment variable overrides
        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Build TOML manually for nicer formatting
        let mut output = String::new();

        output.push_str("# Easel Configuration\n\n");

        output.push_str("[backend]\n");
        output.push_str(&format!("base_url = \"{}\"\n", self.infra.backend.base_url));
        output.push_str(&format!("timeout_ms = {}\n", self.infra.backend.timeout_ms));
        output.push_str(&format!(
            "poll_interval_ms = {}\n",
            self.infra.backend.poll_interval_ms
        ));
        output.push_str(&format!(
            "poll_deadline_ms = {}\n",
            self.infra.backend.poll_deadline_ms
        ));

        output.push_str("\n[bind]\n");
        output.push_str(&format!("http_port = {}\n", self.infra.bind.http_port));
        output.push_str(&format!("http_host = \"{}\"\n", self.infra.bind.http_host));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!(
            "otlp_endpoint = \"{}\"\n",
            self.infra.telemetry.otlp_endpoint
        ));
        output.push_str(&format!(
            "log_level = \"{}\"\n",
            self.infra.telemetry.log_level
        ));

        output.push_str("\n[registry]\n");
        output.push_str(&format!("ttl_hours = {}\n", self.infra.registry.ttl_hours));

        for (namespace, table) in [
            ("image", &self.bootstrap.defaults.image),
            ("audio", &self.bootstrap.defaults.audio),
            ("video", &self.bootstrap.defaults.video),
        ] {
            if table.is_empty() {
                continue;
            }
            output.push_str(&format!("\n[defaults.{}]\n", namespace));
            let mut keys: Vec<_> = table.iter().collect();
            keys.sort_by_key(|(k, _)| k.as_str());
            for (key, value) in keys {
                output.push_str(&format!("{} = {}\n", key, value));
            }
        }

        output
    }
}

//! Infrastructure configuration - things that cannot change at runtime.

use serde::{Deserialize, Serialize};

/// ComfyUI backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the ComfyUI HTTP API.
    /// Default: http://localhost:8188
    #[serde(default = "BackendConfig::default_base_url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds.
    /// Default: 30000 (30s)
    #[serde(default = "BackendConfig::default_timeout_ms")]
    pub timeout_ms: u64,

    /// Interval between history polls after a submit, in milliseconds.
    /// Default: 500
    #[serde(default = "BackendConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long to wait for a submitted job to finish before giving up,
    /// in milliseconds. Diffusion jobs on CPU boxes can be slow.
    /// Default: 120000 (2min)
    #[serde(default = "BackendConfig::default_poll_deadline_ms")]
    pub poll_deadline_ms: u64,
}

impl BackendConfig {
    fn default_base_url() -> String {
        "http://localhost:8188".to_string()
    }

    fn default_timeout_ms() -> u64 {
        30_000
    }

    fn default_poll_interval_ms() -> u64 {
        500
    }

    fn default_poll_deadline_ms() -> u64 {
        120_000
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            timeout_ms: Self::default_timeout_ms(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            poll_deadline_ms: Self::default_poll_deadline_ms(),
        }
    }
}

/// Network bind addresses for this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindConfig {
    /// HTTP port for the MCP and health endpoints.
    /// Default: 8085
    #[serde(default = "BindConfig::default_http_port")]
    pub http_port: u16,

    /// Host to bind the HTTP listener to.
    /// Default: 0.0.0.0
    #[serde(default = "BindConfig::default_http_host")]
    pub http_host: String,
}

impl BindConfig {
    fn default_http_port() -> u16 {
        8085
    }

    fn default_http_host() -> String {
        "0.0.0.0".to_string()
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            http_port: Self::default_http_port(),
            http_host: Self::default_http_host(),
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint for OpenTelemetry.
    /// Default: 127.0.0.1:4317
    #[serde(default = "TelemetryConfig::default_otlp_endpoint")]
    pub otlp_endpoint: String,

    /// Log level (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_otlp_endpoint() -> String {
        "127.0.0.1:4317".to_string()
    }

    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: Self::default_otlp_endpoint(),
            log_level: Self::default_log_level(),
        }
    }
}

/// Asset registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// How long registered assets stay addressable before lazy expiry.
    /// Default: 24
    #[serde(default = "RegistryConfig::default_ttl_hours")]
    pub ttl_hours: u64,
}

impl RegistryConfig {
    fn default_ttl_hours() -> u64 {
        24
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl_hours: Self::default_ttl_hours(),
        }
    }
}

/// Infrastructure configuration - cannot change at runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfraConfig {
    /// ComfyUI backend connection.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Network bind addresses.
    #[serde(default)]
    pub bind: BindConfig,

    /// Telemetry settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Asset registry settings.
    #[serde(default)]
    pub registry: RegistryConfig,
}

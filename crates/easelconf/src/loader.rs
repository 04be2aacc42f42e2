//! Config file discovery, loading, environment overlay, and write-back.

use crate::{BootstrapConfig, ConfigError, DefaultsConfig, EaselConfig, InfraConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    // System config
    let system = PathBuf::from("/etc/easel/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(user) = user_config_path() {
        if user.exists() {
            files.push(user);
        }
    }

    // CLI override takes precedence over local
    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    // Local override (current directory)
    let local = PathBuf::from("easel.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Path of the per-user config file, target of `persist_defaults`.
pub fn user_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("easel/config.toml"))
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<EaselConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

/// Parse config from TOML string.
fn parse_toml(contents: &str, path: &Path) -> Result<EaselConfig, ConfigError> {
    // Parse as raw TOML table first to handle nested structure
    let table: toml::Table = contents
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut infra = InfraConfig::default();

    if let Some(backend) = table.get("backend").and_then(|v| v.as_table()) {
        if let Some(v) = backend.get("base_url").and_then(|v| v.as_str()) {
            infra.backend.base_url = v.to_string();
        }
        if let Some(v) = backend.get("timeout_ms").and_then(|v| v.as_integer()) {
            infra.backend.timeout_ms = v as u64;
        }
        if let Some(v) = backend.get("poll_interval_ms").and_then(|v| v.as_integer()) {
            infra.backend.poll_interval_ms = v as u64;
        }
        if let Some(v) = backend.get("poll_deadline_ms").and_then(|v| v.as_integer()) {
            infra.backend.poll_deadline_ms = v as u64;
        }
    }

    if let Some(bind) = table.get("bind").and_then(|v| v.as_table()) {
        if let Some(v) = bind.get("http_port").and_then(|v| v.as_integer()) {
            infra.bind.http_port = v as u16;
        }
        if let Some(v) = bind.get("http_host").and_then(|v| v.as_str()) {
            infra.bind.http_host = v.to_string();
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("otlp_endpoint").and_then(|v| v.as_str()) {
            infra.telemetry.otlp_endpoint = v.to_string();
        }
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            infra.telemetry.log_level = v.to_string();
        }
    }

    if let Some(registry) = table.get("registry").and_then(|v| v.as_table()) {
        if let Some(v) = registry.get("ttl_hours").and_then(|v| v.as_integer()) {
            infra.registry.ttl_hours = v as u64;
        }
    }

    let mut bootstrap = BootstrapConfig::default();
    if let Some(defaults) = table.get("defaults").and_then(|v| v.as_table()) {
        for namespace in ["image", "audio", "video"] {
            if let Some(ns_table) = defaults.get(namespace).and_then(|v| v.as_table()) {
                if let Some(target) = bootstrap.defaults.namespace_mut(namespace) {
                    *target = ns_table.clone();
                }
            }
        }
    }

    Ok(EaselConfig { infra, bootstrap })
}

/// Merge two configs, with `overlay` taking precedence.
///
/// Infra scalars: overlay wins when it differs from the compiled default.
/// Defaults tables: merged key-wise, overlay wins per key.
pub fn merge_configs(base: EaselConfig, overlay: EaselConfig) -> EaselConfig {
    let defaults = InfraConfig::default();

    let mut merged = EaselConfig {
        infra: InfraConfig {
            backend: crate::infra::BackendConfig {
                base_url: pick(
                    base.infra.backend.base_url,
                    overlay.infra.backend.base_url,
                    defaults.backend.base_url,
                ),
                timeout_ms: pick(
                    base.infra.backend.timeout_ms,
                    overlay.infra.backend.timeout_ms,
                    defaults.backend.timeout_ms,
                ),
                poll_interval_ms: pick(
                    base.infra.backend.poll_interval_ms,
                    overlay.infra.backend.poll_interval_ms,
                    defaults.backend.poll_interval_ms,
                ),
                poll_deadline_ms: pick(
                    base.infra.backend.poll_deadline_ms,
                    overlay.infra.backend.poll_deadline_ms,
                    defaults.backend.poll_deadline_ms,
                ),
            },
            bind: crate::infra::BindConfig {
                http_port: pick(
                    base.infra.bind.http_port,
                    overlay.infra.bind.http_port,
                    defaults.bind.http_port,
                ),
                http_host: pick(
                    base.infra.bind.http_host,
                    overlay.infra.bind.http_host,
                    defaults.bind.http_host,
                ),
            },
            telemetry: crate::infra::TelemetryConfig {
                otlp_endpoint: pick(
                    base.infra.telemetry.otlp_endpoint,
                    overlay.infra.telemetry.otlp_endpoint,
                    defaults.telemetry.otlp_endpoint,
                ),
                log_level: pick(
                    base.infra.telemetry.log_level,
                    overlay.infra.telemetry.log_level,
                    defaults.telemetry.log_level,
                ),
            },
            registry: crate::infra::RegistryConfig {
                ttl_hours: pick(
                    base.infra.registry.ttl_hours,
                    overlay.infra.registry.ttl_hours,
                    defaults.registry.ttl_hours,
                ),
            },
        },
        bootstrap: base.bootstrap,
    };

    for namespace in ["image", "audio", "video"] {
        if let Some(overlay_table) = overlay.bootstrap.defaults.namespace(namespace) {
            if let Some(target) = merged.bootstrap.defaults.namespace_mut(namespace) {
                for (key, value) in overlay_table {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
    }

    merged
}

/// Overlay wins when it was explicitly set (differs from the default).
fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut EaselConfig, sources: &mut ConfigSources) {
    // Backend
    if let Ok(v) = env::var("EASEL_COMFY_URL") {
        config.infra.backend.base_url = v;
        sources.env_overrides.push("EASEL_COMFY_URL".to_string());
    }
    if let Ok(v) = env::var("EASEL_BACKEND_TIMEOUT_MS") {
        if let Ok(ms) = v.parse() {
            config.infra.backend.timeout_ms = ms;
            sources
                .env_overrides
                .push("EASEL_BACKEND_TIMEOUT_MS".to_string());
        }
    }

    // Bind
    if let Ok(v) = env::var("EASEL_HTTP_PORT") {
        if let Ok(port) = v.parse() {
            config.infra.bind.http_port = port;
            sources.env_overrides.push("EASEL_HTTP_PORT".to_string());
        }
    }

    // Telemetry
    if let Ok(v) = env::var("EASEL_OTLP_ENDPOINT") {
        config.infra.telemetry.otlp_endpoint = v;
        sources.env_overrides.push("EASEL_OTLP_ENDPOINT".to_string());
    }
    // Also support standard OTEL env var
    if let Ok(v) = env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.infra.telemetry.otlp_endpoint = v;
        sources
            .env_overrides
            .push("OTEL_EXPORTER_OTLP_ENDPOINT".to_string());
    }
    if let Ok(v) = env::var("EASEL_LOG_LEVEL") {
        config.infra.telemetry.log_level = v;
        sources.env_overrides.push("EASEL_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Ok(v) = env::var("RUST_LOG") {
        config.infra.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }

    // Registry
    if let Ok(v) = env::var("EASEL_ASSET_TTL_HOURS") {
        if let Ok(hours) = v.parse() {
            config.infra.registry.ttl_hours = hours;
            sources
                .env_overrides
                .push("EASEL_ASSET_TTL_HOURS".to_string());
        }
    }

    // EASEL_DEFAULT_*_MODEL is deliberately not folded in here: those
    // variables sit BELOW config file values in the defaults precedence
    // chain, so the defaults layer reads them itself at resolution time.
}

/// Write runtime defaults back into the user config file.
///
/// Reads the existing file (if any), replaces the persisted keys under
/// `[defaults.*]` with the given snapshot, and writes atomically via a
/// temp file + rename so a crash cannot leave a half-written config.
pub fn persist_defaults(defaults: &DefaultsConfig) -> Result<PathBuf, ConfigError> {
    let path = user_config_path().ok_or_else(|| ConfigError::FileWrite {
        path: PathBuf::from("~/.config/easel/config.toml"),
        source: std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "could not determine user config directory",
        ),
    })?;
    persist_defaults_to(&path, defaults)?;
    Ok(path)
}

/// Write runtime defaults to a specific config file path.
pub fn persist_defaults_to(path: &Path, defaults: &DefaultsConfig) -> Result<(), ConfigError> {
    let mut table: toml::Table = if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        contents
            .parse()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
    } else {
        toml::Table::new()
    };

    let defaults_entry = table
        .entry("defaults".to_string())
        .or_insert_with(|| toml::Value::Table(toml::Table::new()));
    if !defaults_entry.is_table() {
        *defaults_entry = toml::Value::Table(toml::Table::new());
    }
    let defaults_table = defaults_entry
        .as_table_mut()
        .expect("defaults entry is a table");

    for (namespace, snapshot) in [
        ("image", &defaults.image),
        ("audio", &defaults.audio),
        ("video", &defaults.video),
    ] {
        if snapshot.is_empty() {
            continue;
        }
        let ns_entry = defaults_table
            .entry(namespace.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if !ns_entry.is_table() {
            *ns_entry = toml::Value::Table(toml::Table::new());
        }
        let ns_table = ns_entry.as_table_mut().expect("namespace entry is a table");
        for (key, value) in snapshot {
            ns_table.insert(key.clone(), value.clone());
        }
    }

    let rendered = toml::to_string_pretty(&table).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    // Atomic write: temp file in the same directory, then rename
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, rendered).map_err(|e| ConfigError::FileWrite {
        path: temp_path.clone(),
        source: e,
    })?;
    std::fs::rename(&temp_path, path).map_err(|e| ConfigError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

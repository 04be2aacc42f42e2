//! Bootstrap configuration - seeds runtime state, then runtime owns it.

use serde::{Deserialize, Serialize};

/// Per-namespace generation defaults from the config file.
///
/// Values are kept as raw TOML so the defaults manager can layer them over
/// its own baseline without this crate knowing which keys exist. Runtime
/// `set_defaults` calls may diverge from what is here; `persist` writes the
/// runtime state back via [`crate::loader::persist_defaults`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Image generation defaults (width, height, steps, model, ...).
    #[serde(default)]
    pub image: toml::Table,

    /// Audio generation defaults (seconds, lyrics_strength, model, ...).
    #[serde(default)]
    pub audio: toml::Table,

    /// Video generation defaults (duration, fps, model, ...).
    #[serde(default)]
    pub video: toml::Table,
}

impl DefaultsConfig {
    /// Look up a namespace table by name.
    pub fn namespace(&self, name: &str) -> Option<&toml::Table> {
        match name {
            "image" => Some(&self.image),
            "audio" => Some(&self.audio),
            "video" => Some(&self.video),
            _ => None,
        }
    }

    /// Mutable namespace lookup.
    pub fn namespace_mut(&mut self, name: &str) -> Option<&mut toml::Table> {
        match name {
            "image" => Some(&mut self.image),
            "audio" => Some(&mut self.audio),
            "video" => Some(&mut self.video),
            _ => None,
        }
    }
}

/// Bootstrap configuration - seeds runtime state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Generation defaults, layered under runtime updates.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

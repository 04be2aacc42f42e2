//! Layered parameter defaults per workflow namespace.
//!
//! Precedence, highest first:
//! 1. explicit call arguments
//! 2. runtime defaults (set via the set_defaults tool)
//! 3. user config file values
//! 4. environment variables (`EASEL_DEFAULT_<NAMESPACE>_MODEL`)
//! 5. hardcoded baseline

use crate::error::EaselError;
use easelconf::DefaultsConfig;
use serde_json::{json, Map, Value};
use std::sync::Mutex;

pub const NAMESPACES: [&str; 3] = ["image", "audio", "video"];

/// Keys accepted by set_defaults per namespace. Everything a template can
/// bind as a default; per-call content like `prompt` or `lyrics` is not a
/// default.
fn allowed_keys(namespace: &str) -> &'static [&'static str] {
    match namespace {
        "image" => &[
            "width",
            "height",
            "steps",
            "cfg",
            "sampler_name",
            "scheduler",
            "denoise",
            "model",
            "negative_prompt",
        ],
        "audio" => &[
            "steps",
            "cfg",
            "sampler_name",
            "scheduler",
            "denoise",
            "seconds",
            "lyrics_strength",
            "model",
        ],
        "video" => &[
            "width",
            "height",
            "steps",
            "cfg",
            "sampler_name",
            "scheduler",
            "denoise",
            "negative_prompt",
            "duration",
            "fps",
            "model",
        ],
        _ => &[],
    }
}

fn baseline(namespace: &str) -> Map<String, Value> {
    let values = match namespace {
        "image" => json!({
            "width": 512,
            "height": 512,
            "steps": 20,
            "cfg": 8.0,
            "sampler_name": "euler",
            "scheduler": "normal",
            "denoise": 1.0,
            "model": "v1-5-pruned-emaonly.ckpt",
            "negative_prompt": "text, watermark",
        }),
        "audio" => json!({
            "steps": 50,
            "cfg": 5.0,
            "sampler_name": "euler",
            "scheduler": "simple",
            "denoise": 1.0,
            "seconds": 60,
            "lyrics_strength": 0.99,
            "model": "ace_step_v1_3.5b.safetensors",
        }),
        "video" => json!({
            "width": 1280,
            "height": 720,
            "steps": 20,
            "cfg": 8.0,
            "sampler_name": "euler",
            "scheduler": "normal",
            "denoise": 1.0,
            "negative_prompt": "text, watermark",
            "duration": 5,
            "fps": 16,
        }),
        _ => json!({}),
    };
    values.as_object().cloned().unwrap_or_default()
}

fn env_defaults(namespace: &str) -> Map<String, Value> {
    let mut map = Map::new();
    let var = format!("EASEL_DEFAULT_{}_MODEL", namespace.to_uppercase());
    if let Ok(model) = std::env::var(var) {
        map.insert("model".to_string(), json!(model));
    }
    map
}

/// Serialize any table-shaped value into a JSON object map.
fn value_map<T: serde::Serialize>(table: &T) -> Map<String, Value> {
    serde_json::to_value(table)
        .ok()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default()
}

#[derive(Clone, Debug, Default)]
struct Namespaces {
    image: Map<String, Value>,
    audio: Map<String, Value>,
    video: Map<String, Value>,
}

impl Namespaces {
    fn get(&self, namespace: &str) -> Option<&Map<String, Value>> {
        match namespace {
            "image" => Some(&self.image),
            "audio" => Some(&self.audio),
            "video" => Some(&self.video),
            _ => None,
        }
    }

    fn get_mut(&mut self, namespace: &str) -> Option<&mut Map<String, Value>> {
        match namespace {
            "image" => Some(&mut self.image),
            "audio" => Some(&mut self.audio),
            "video" => Some(&mut self.video),
            _ => None,
        }
    }
}

struct Layers {
    runtime: Namespaces,
    config: Namespaces,
}

/// Runtime defaults plus the config-file layer, resolved against baselines.
pub struct DefaultsManager {
    layers: Mutex<Layers>,
}

impl DefaultsManager {
    pub fn new(config: &DefaultsConfig) -> Self {
        Self {
            layers: Mutex::new(Layers {
                runtime: Namespaces::default(),
                config: Namespaces {
                    image: value_map(&config.image),
                    audio: value_map(&config.audio),
                    video: value_map(&config.video),
                },
            }),
        }
    }

    /// Effective defaults for one namespace, all layers merged.
    pub fn effective(&self, namespace: &str) -> Map<String, Value> {
        let mut merged = baseline(namespace);
        for (key, value) in env_defaults(namespace) {
            merged.insert(key, value);
        }

        let layers = self.layers.lock().unwrap();
        if let Some(config) = layers.config.get(namespace) {
            for (key, value) in config {
                merged.insert(key.clone(), value.clone());
            }
        }
        if let Some(runtime) = layers.runtime.get(namespace) {
            for (key, value) in runtime {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    /// Effective defaults for every namespace (the get_defaults payload).
    pub fn all_effective(&self) -> Value {
        json!({
            "image": self.effective("image"),
            "audio": self.effective("audio"),
            "video": self.effective("video"),
        })
    }

    /// Merge explicitly provided call arguments over the effective defaults.
    /// Null values count as not provided.
    pub fn resolve(&self, namespace: &str, provided: &Map<String, Value>) -> Map<String, Value> {
        let mut resolved = self.effective(namespace);
        for (key, value) in provided {
            if !value.is_null() {
                resolved.insert(key.clone(), value.clone());
            }
        }
        resolved
    }

    /// Check a namespace update without applying it.
    ///
    /// Unknown keys are rejected. When a checkpoint list is supplied (the
    /// backend was reachable), a `model` value not on it is rejected too;
    /// `None` skips the model check so an unreachable backend never blocks a
    /// runtime update.
    pub fn validate(
        &self,
        namespace: &str,
        values: &Map<String, Value>,
        available_models: Option<&[String]>,
    ) -> Result<(), EaselError> {
        if !NAMESPACES.contains(&namespace) {
            return Err(EaselError::validation(format!(
                "Invalid namespace: {namespace}. Must be 'image', 'audio', or 'video'"
            )));
        }

        let allowed = allowed_keys(namespace);
        let mut unknown: Vec<&str> = values
            .keys()
            .map(String::as_str)
            .filter(|k| !allowed.contains(k))
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(EaselError::validation(format!(
                "Unknown {namespace} defaults: {unknown:?}"
            )));
        }

        if let (Some(models), Some(model)) = (available_models, values.get("model")) {
            let name = model.as_str().unwrap_or_default();
            if !models.is_empty() && !models.iter().any(|m| m == name) {
                let preview: Vec<&str> = models.iter().take(5).map(String::as_str).collect();
                return Err(EaselError::validation(format!(
                    "Model '{name}' not found. Available models: {preview:?}..."
                )));
            }
        }
        Ok(())
    }

    /// Validate and apply a runtime defaults update for one namespace.
    pub fn set_defaults(
        &self,
        namespace: &str,
        values: &Map<String, Value>,
        available_models: Option<&[String]>,
    ) -> Result<(), EaselError> {
        self.validate(namespace, values, available_models)?;

        let mut layers = self.layers.lock().unwrap();
        if let Some(runtime) = layers.runtime.get_mut(namespace) {
            for (key, value) in values {
                runtime.insert(key.clone(), value.clone());
            }
        }
        tracing::info!(namespace, keys = ?values.keys().collect::<Vec<_>>(), "runtime defaults updated");
        Ok(())
    }

    /// Namespaces whose effective default model is missing from the
    /// backend's checkpoint list. A namespace with no model default (video)
    /// is fine. An empty list means the catalog could not be read; nothing
    /// to report.
    pub fn unknown_default_models(&self, available: &[String]) -> Vec<(&'static str, String)> {
        if available.is_empty() {
            return Vec::new();
        }
        let mut missing = Vec::new();
        for namespace in NAMESPACES {
            let effective = self.effective(namespace);
            let Some(model) = effective.get("model").and_then(Value::as_str) else {
                continue;
            };
            if !available.iter().any(|m| m == model) {
                missing.push((namespace, model.to_string()));
            }
        }
        missing
    }

    /// Write the runtime defaults into the user config file and fold them
    /// into the config layer, so they survive a restart.
    pub fn persist(&self) -> Result<std::path::PathBuf, EaselError> {
        let snapshot = self.runtime_snapshot();
        let path = easelconf::loader::persist_defaults(&snapshot)
            .map_err(|e| EaselError::Internal(format!("failed to persist defaults: {e}")))?;

        let mut layers = self.layers.lock().unwrap();
        for namespace in NAMESPACES {
            let runtime = layers
                .runtime
                .get(namespace)
                .cloned()
                .unwrap_or_default();
            if let Some(config) = layers.config.get_mut(namespace) {
                for (key, value) in runtime {
                    config.insert(key, value);
                }
            }
        }
        tracing::info!(path = %path.display(), "persisted runtime defaults");
        Ok(path)
    }

    fn runtime_snapshot(&self) -> DefaultsConfig {
        let layers = self.layers.lock().unwrap();
        let mut snapshot = DefaultsConfig::default();
        for namespace in NAMESPACES {
            let Some(runtime) = layers.runtime.get(namespace) else {
                continue;
            };
            let Some(target) = snapshot.namespace_mut(namespace) else {
                continue;
            };
            for (key, value) in runtime {
                if let Ok(toml_value) = toml::Value::try_from(value) {
                    target.insert(key.clone(), toml_value);
                }
            }
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> DefaultsManager {
        DefaultsManager::new(&DefaultsConfig::default())
    }

    #[test]
    fn test_baseline_resolution() {
        let manager = manager();
        let effective = manager.effective("image");
        assert_eq!(effective["width"], 512);
        assert_eq!(effective["cfg"], 8.0);
        assert_eq!(effective["model"], "v1-5-pruned-emaonly.ckpt");
        assert_eq!(effective["negative_prompt"], "text, watermark");

        let audio = manager.effective("audio");
        assert_eq!(audio["seconds"], 60);
        assert_eq!(audio["lyrics_strength"], 0.99);
    }

    #[test]
    fn test_provided_beats_everything() {
        let manager = manager();
        let mut provided = Map::new();
        provided.insert("width".into(), json!(1024));
        provided.insert("steps".into(), json!(Value::Null));

        let resolved = manager.resolve("image", &provided);
        assert_eq!(resolved["width"], 1024);
        // Null means not provided
        assert_eq!(resolved["steps"], 20);
    }

    #[test]
    fn test_runtime_beats_config_file() {
        let mut file_defaults = DefaultsConfig::default();
        file_defaults
            .image
            .insert("steps".to_string(), toml::Value::Integer(35));
        let manager = DefaultsManager::new(&file_defaults);
        assert_eq!(manager.effective("image")["steps"], 35);

        let mut update = Map::new();
        update.insert("steps".into(), json!(50));
        manager.set_defaults("image", &update, None).unwrap();
        assert_eq!(manager.effective("image")["steps"], 50);
    }

    #[test]
    fn test_set_defaults_rejects_unknown_key() {
        let manager = manager();
        let mut update = Map::new();
        update.insert("stepz".into(), json!(50));

        let err = manager.set_defaults("image", &update, None).unwrap_err();
        assert_eq!(err.code(), "validation_error");
        assert!(err.to_string().contains("stepz"));
    }

    #[test]
    fn test_set_defaults_rejects_bad_namespace() {
        let manager = manager();
        let err = manager
            .set_defaults("sculpture", &Map::new(), None)
            .unwrap_err();
        assert!(err.to_string().contains("sculpture"));
    }

    #[test]
    fn test_set_defaults_model_validation() {
        let manager = manager();
        let models = vec!["good.ckpt".to_string(), "other.safetensors".to_string()];

        let mut update = Map::new();
        update.insert("model".into(), json!("missing.ckpt"));
        let err = manager
            .set_defaults("image", &update, Some(&models))
            .unwrap_err();
        assert!(err.to_string().contains("missing.ckpt"));

        update.insert("model".into(), json!("good.ckpt"));
        manager
            .set_defaults("image", &update, Some(&models))
            .unwrap();
        assert_eq!(manager.effective("image")["model"], "good.ckpt");

        // No checkpoint list (backend unreachable): update goes through
        update.insert("model".into(), json!("unchecked.ckpt"));
        manager.set_defaults("image", &update, None).unwrap();
        assert_eq!(manager.effective("image")["model"], "unchecked.ckpt");
    }

    #[test]
    fn test_unknown_default_models() {
        let manager = manager();

        // Empty catalog: backend unreadable, nothing to report
        assert!(manager.unknown_default_models(&[]).is_empty());

        let available = vec!["v1-5-pruned-emaonly.ckpt".to_string()];
        let missing = manager.unknown_default_models(&available);
        // Image default is on the list; audio default is not; video has no
        // model default at all
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].0, "audio");
        assert_eq!(missing[0].1, "ace_step_v1_3.5b.safetensors");
    }

    #[test]
    fn test_all_effective_lists_namespaces() {
        let manager = manager();
        let all = manager.all_effective();
        assert!(all["image"].is_object());
        assert!(all["audio"].is_object());
        assert!(all["video"].is_object());
        assert_eq!(all["video"]["fps"], 16);
    }

    #[test]
    fn test_runtime_snapshot_round_trip() {
        let manager = manager();
        let mut update = Map::new();
        update.insert("steps".into(), json!(40));
        update.insert("cfg".into(), json!(7.5));
        manager.set_defaults("image", &update, None).unwrap();

        let snapshot = manager.runtime_snapshot();
        assert_eq!(
            snapshot.image.get("steps"),
            Some(&toml::Value::Integer(40))
        );
        assert_eq!(snapshot.image.get("cfg"), Some(&toml::Value::Float(7.5)));
        assert!(snapshot.audio.is_empty());
    }
}

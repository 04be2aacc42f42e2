use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

fn insert_opt<T: Serialize>(params: &mut Map<String, Value>, key: &str, value: &Option<T>) {
    if let Some(v) = value {
        params.insert(key.to_string(), json!(v));
    }
}

/// Request to generate an image from a text prompt.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerateImageRequest {
    #[schemars(description = "Text prompt describing the image")]
    pub prompt: String,

    #[schemars(description = "Negative prompt (what to avoid)")]
    pub negative_prompt: Option<String>,

    #[schemars(description = "Image width in pixels")]
    pub width: Option<u32>,

    #[schemars(description = "Image height in pixels")]
    pub height: Option<u32>,

    #[schemars(description = "Number of sampling steps")]
    pub steps: Option<u32>,

    #[schemars(description = "Classifier-free guidance scale")]
    pub cfg: Option<f64>,

    #[schemars(description = "Sampler name (e.g. euler, dpmpp_2m)")]
    pub sampler_name: Option<String>,

    #[schemars(description = "Scheduler name (e.g. normal, karras)")]
    pub scheduler: Option<String>,

    #[schemars(description = "Denoise strength, 0.0 to 1.0")]
    pub denoise: Option<f64>,

    #[schemars(description = "Checkpoint model filename")]
    pub model: Option<String>,

    #[schemars(description = "Sampling seed (random when omitted)")]
    pub seed: Option<u64>,

    #[schemars(description = "Return the image inline as base64 when small enough")]
    pub return_inline_preview: Option<bool>,
}

impl GenerateImageRequest {
    /// Only the arguments the caller actually set; defaults fill the rest.
    pub fn provided(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("prompt".to_string(), json!(self.prompt));
        insert_opt(&mut params, "negative_prompt", &self.negative_prompt);
        insert_opt(&mut params, "width", &self.width);
        insert_opt(&mut params, "height", &self.height);
        insert_opt(&mut params, "steps", &self.steps);
        insert_opt(&mut params, "cfg", &self.cfg);
        insert_opt(&mut params, "sampler_name", &self.sampler_name);
        insert_opt(&mut params, "scheduler", &self.scheduler);
        insert_opt(&mut params, "denoise", &self.denoise);
        insert_opt(&mut params, "model", &self.model);
        insert_opt(&mut params, "seed", &self.seed);
        params
    }
}

/// Request to generate audio (ACE-Step text-to-music).
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerateAudioRequest {
    #[schemars(description = "Style tags describing the music (e.g. 'lofi, jazz, mellow')")]
    pub prompt: String,

    #[schemars(description = "Lyrics to sing; instrumental when omitted")]
    pub lyrics: Option<String>,

    #[schemars(description = "Length of the clip in seconds")]
    pub seconds: Option<f64>,

    #[schemars(description = "How strongly the lyrics steer generation, 0.0 to 1.0")]
    pub lyrics_strength: Option<f64>,

    #[schemars(description = "Number of sampling steps")]
    pub steps: Option<u32>,

    #[schemars(description = "Classifier-free guidance scale")]
    pub cfg: Option<f64>,

    #[schemars(description = "Sampler name")]
    pub sampler_name: Option<String>,

    #[schemars(description = "Scheduler name")]
    pub scheduler: Option<String>,

    #[schemars(description = "Checkpoint model filename")]
    pub model: Option<String>,

    #[schemars(description = "Sampling seed (random when omitted)")]
    pub seed: Option<u64>,
}

impl GenerateAudioRequest {
    pub fn provided(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("prompt".to_string(), json!(self.prompt));
        insert_opt(&mut params, "lyrics", &self.lyrics);
        insert_opt(&mut params, "seconds", &self.seconds);
        insert_opt(&mut params, "lyrics_strength", &self.lyrics_strength);
        insert_opt(&mut params, "steps", &self.steps);
        insert_opt(&mut params, "cfg", &self.cfg);
        insert_opt(&mut params, "sampler_name", &self.sampler_name);
        insert_opt(&mut params, "scheduler", &self.scheduler);
        insert_opt(&mut params, "model", &self.model);
        insert_opt(&mut params, "seed", &self.seed);
        params
    }
}

/// Request to generate a short video clip from a text prompt.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerateVideoRequest {
    #[schemars(description = "Text prompt describing the video")]
    pub prompt: String,

    #[schemars(description = "Frame width in pixels")]
    pub width: Option<u32>,

    #[schemars(description = "Frame height in pixels")]
    pub height: Option<u32>,

    #[schemars(description = "Clip length in seconds")]
    pub duration: Option<f64>,

    #[schemars(description = "Frames per second")]
    pub fps: Option<u32>,

    #[schemars(description = "Number of sampling steps")]
    pub steps: Option<u32>,

    #[schemars(description = "Classifier-free guidance scale")]
    pub cfg: Option<f64>,

    #[schemars(description = "Negative prompt (what to avoid)")]
    pub negative_prompt: Option<String>,

    #[schemars(description = "Checkpoint model filename")]
    pub model: Option<String>,

    #[schemars(description = "Sampling seed (random when omitted)")]
    pub seed: Option<u64>,
}

impl GenerateVideoRequest {
    pub fn provided(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("prompt".to_string(), json!(self.prompt));
        insert_opt(&mut params, "negative_prompt", &self.negative_prompt);
        insert_opt(&mut params, "width", &self.width);
        insert_opt(&mut params, "height", &self.height);
        insert_opt(&mut params, "duration", &self.duration);
        insert_opt(&mut params, "fps", &self.fps);
        insert_opt(&mut params, "steps", &self.steps);
        insert_opt(&mut params, "cfg", &self.cfg);
        insert_opt(&mut params, "model", &self.model);
        insert_opt(&mut params, "seed", &self.seed);
        params
    }
}

/// Request to re-run a previous generation with parameter tweaks.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RegenerateRequest {
    #[schemars(description = "Asset ID of the generation to re-run")]
    pub asset_id: String,

    #[schemars(description = "Sampling seed (random when omitted)")]
    pub seed: Option<u64>,

    #[schemars(description = "Parameters to change, e.g. {\"steps\": 30}; everything else is kept")]
    pub param_overrides: Option<Map<String, Value>>,

    #[schemars(description = "Return the image inline as base64 when small enough")]
    pub return_inline_preview: Option<bool>,
}

/// Request for the status of a submitted job.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GetJobRequest {
    #[schemars(description = "Prompt ID returned by a generate call")]
    pub prompt_id: String,
}

/// Request to cancel a running or queued job.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CancelJobRequest {
    #[schemars(description = "Prompt ID returned by a generate call")]
    pub prompt_id: String,
}

/// Request to list registered assets, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ListAssetsRequest {
    #[schemars(description = "Maximum number of assets to return (default 10)")]
    pub limit: Option<usize>,

    #[schemars(description = "Only assets from this workflow (e.g. generate_image)")]
    pub workflow_id: Option<String>,
}

/// Request for the full provenance record of one asset.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GetAssetMetadataRequest {
    #[schemars(description = "Asset ID to look up")]
    pub asset_id: String,
}

/// Request to update generation defaults.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SetDefaultsRequest {
    #[schemars(description = "Image defaults to update, e.g. {\"steps\": 30}")]
    pub image: Option<Map<String, Value>>,

    #[schemars(description = "Audio defaults to update")]
    pub audio: Option<Map<String, Value>>,

    #[schemars(description = "Video defaults to update")]
    pub video: Option<Map<String, Value>>,

    #[schemars(description = "Also write the updated defaults to the user config file")]
    pub persist: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provided_skips_unset_arguments() {
        let request = GenerateImageRequest {
            prompt: "a red barn".to_string(),
            negative_prompt: None,
            width: Some(768),
            height: None,
            steps: None,
            cfg: None,
            sampler_name: None,
            scheduler: None,
            denoise: None,
            model: None,
            seed: Some(42),
            return_inline_preview: None,
        };

        let params = request.provided();
        assert_eq!(params.len(), 3);
        assert_eq!(params["prompt"], json!("a red barn"));
        assert_eq!(params["width"], json!(768));
        assert_eq!(params["seed"], json!(42));
        assert!(!params.contains_key("steps"));
    }

    #[test]
    fn generate_image_request_parses_minimal_arguments() {
        let request: GenerateImageRequest =
            serde_json::from_value(json!({"prompt": "a red barn"})).unwrap();
        assert_eq!(request.prompt, "a red barn");
        assert!(request.seed.is_none());
        assert!(request.return_inline_preview.is_none());
    }

    #[test]
    fn regenerate_request_parses_overrides() {
        let request: RegenerateRequest = serde_json::from_value(json!({
            "asset_id": "abc-123",
            "param_overrides": {"steps": 30}
        }))
        .unwrap();
        assert_eq!(request.asset_id, "abc-123");
        assert_eq!(request.param_overrides.unwrap()["steps"], json!(30));
    }
}

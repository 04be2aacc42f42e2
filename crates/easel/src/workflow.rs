//! Workflow templates and parameter binding.
//!
//! A template is data: a ComfyUI API-format node graph plus a descriptor
//! table. Each descriptor names one parameter, declares how its value is
//! coerced (int, float, text), and lists the graph inputs it writes into.
//! Rendering never inspects placeholder names inside the graph; the
//! descriptor table is the only source of truth for what is bindable.

use crate::error::EaselError;
use rand::Rng;
use serde_json::{json, Map, Value};

/// How a parameter value is coerced before being written into the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Float,
    Text,
}

/// One write target inside the node graph.
#[derive(Clone, Debug)]
pub struct Binding {
    pub node: &'static str,
    pub input: &'static str,
}

/// A parameter the template accepts: name, kind, and every graph input it
/// writes into.
#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub bindings: Vec<Binding>,
}

fn spec(
    name: &'static str,
    kind: ParamKind,
    node: &'static str,
    input: &'static str,
) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        bindings: vec![Binding { node, input }],
    }
}

/// A built-in generation workflow.
#[derive(Clone, Debug)]
pub struct WorkflowTemplate {
    pub id: &'static str,
    pub graph: Value,
    pub params: Vec<ParamSpec>,
}

impl WorkflowTemplate {
    pub fn by_id(workflow_id: &str) -> Option<WorkflowTemplate> {
        match workflow_id {
            "generate_image" => Some(Self::generate_image()),
            "generate_audio" => Some(Self::generate_audio()),
            "generate_video" => Some(Self::generate_video()),
            _ => None,
        }
    }

    /// SD txt2img graph.
    pub fn generate_image() -> WorkflowTemplate {
        WorkflowTemplate {
            id: "generate_image",
            graph: json!({
                "3": {
                    "class_type": "KSampler",
                    "inputs": {
                        "seed": 0,
                        "steps": 20,
                        "cfg": 8.0,
                        "sampler_name": "euler",
                        "scheduler": "normal",
                        "denoise": 1.0,
                        "model": ["4", 0],
                        "positive": ["6", 0],
                        "negative": ["7", 0],
                        "latent_image": ["5", 0]
                    }
                },
                "4": {
                    "class_type": "CheckpointLoaderSimple",
                    "inputs": {"ckpt_name": "v1-5-pruned-emaonly.ckpt"}
                },
                "5": {
                    "class_type": "EmptyLatentImage",
                    "inputs": {"width": 512, "height": 512, "batch_size": 1}
                },
                "6": {
                    "class_type": "CLIPTextEncode",
                    "inputs": {"text": "", "clip": ["4", 1]}
                },
                "7": {
                    "class_type": "CLIPTextEncode",
                    "inputs": {"text": "text, watermark", "clip": ["4", 1]}
                },
                "8": {
                    "class_type": "VAEDecode",
                    "inputs": {"samples": ["3", 0], "vae": ["4", 2]}
                },
                "9": {
                    "class_type": "SaveImage",
                    "inputs": {"filename_prefix": "easel", "images": ["8", 0]}
                }
            }),
            params: vec![
                spec("prompt", ParamKind::Text, "6", "text"),
                spec("negative_prompt", ParamKind::Text, "7", "text"),
                spec("width", ParamKind::Int, "5", "width"),
                spec("height", ParamKind::Int, "5", "height"),
                spec("steps", ParamKind::Int, "3", "steps"),
                spec("cfg", ParamKind::Float, "3", "cfg"),
                spec("sampler_name", ParamKind::Text, "3", "sampler_name"),
                spec("scheduler", ParamKind::Text, "3", "scheduler"),
                spec("denoise", ParamKind::Float, "3", "denoise"),
                spec("model", ParamKind::Text, "4", "ckpt_name"),
                spec("seed", ParamKind::Int, "3", "seed"),
            ],
        }
    }

    /// ACE-Step text-to-audio graph. `prompt` and `tags` are aliases for
    /// the same input so regeneration overrides accept either name.
    pub fn generate_audio() -> WorkflowTemplate {
        WorkflowTemplate {
            id: "generate_audio",
            graph: json!({
                "1": {
                    "class_type": "CheckpointLoaderSimple",
                    "inputs": {"ckpt_name": "ace_step_v1_3.5b.safetensors"}
                },
                "2": {
                    "class_type": "TextEncodeAceStepAudio",
                    "inputs": {"tags": "", "lyrics": "", "lyrics_strength": 0.99, "clip": ["1", 1]}
                },
                "3": {
                    "class_type": "ConditioningZeroOut",
                    "inputs": {"conditioning": ["2", 0]}
                },
                "4": {
                    "class_type": "EmptyAceStepLatentAudio",
                    "inputs": {"seconds": 60, "batch_size": 1}
                },
                "5": {
                    "class_type": "KSampler",
                    "inputs": {
                        "seed": 0,
                        "steps": 50,
                        "cfg": 5.0,
                        "sampler_name": "euler",
                        "scheduler": "simple",
                        "denoise": 1.0,
                        "model": ["1", 0],
                        "positive": ["2", 0],
                        "negative": ["3", 0],
                        "latent_image": ["4", 0]
                    }
                },
                "6": {
                    "class_type": "VAEDecodeAudio",
                    "inputs": {"samples": ["5", 0], "vae": ["1", 2]}
                },
                "7": {
                    "class_type": "SaveAudio",
                    "inputs": {"filename_prefix": "easel/audio", "audio": ["6", 0]}
                }
            }),
            params: vec![
                spec("prompt", ParamKind::Text, "2", "tags"),
                spec("tags", ParamKind::Text, "2", "tags"),
                spec("lyrics", ParamKind::Text, "2", "lyrics"),
                spec("lyrics_strength", ParamKind::Float, "2", "lyrics_strength"),
                spec("seconds", ParamKind::Int, "4", "seconds"),
                spec("steps", ParamKind::Int, "5", "steps"),
                spec("cfg", ParamKind::Float, "5", "cfg"),
                spec("sampler_name", ParamKind::Text, "5", "sampler_name"),
                spec("scheduler", ParamKind::Text, "5", "scheduler"),
                spec("denoise", ParamKind::Float, "5", "denoise"),
                spec("model", ParamKind::Text, "1", "ckpt_name"),
                spec("seed", ParamKind::Int, "5", "seed"),
            ],
        }
    }

    /// Text-to-video graph. Frame count is a rendered parameter (`frames`);
    /// the tool layer derives it from duration and fps.
    pub fn generate_video() -> WorkflowTemplate {
        WorkflowTemplate {
            id: "generate_video",
            graph: json!({
                "1": {
                    "class_type": "CheckpointLoaderSimple",
                    "inputs": {"ckpt_name": "wan2.1_t2v_1.3B_fp16.safetensors"}
                },
                "2": {
                    "class_type": "CLIPTextEncode",
                    "inputs": {"text": "", "clip": ["1", 1]}
                },
                "3": {
                    "class_type": "CLIPTextEncode",
                    "inputs": {"text": "text, watermark", "clip": ["1", 1]}
                },
                "4": {
                    "class_type": "EmptyHunyuanLatentVideo",
                    "inputs": {"width": 1280, "height": 720, "length": 81, "batch_size": 1}
                },
                "5": {
                    "class_type": "KSampler",
                    "inputs": {
                        "seed": 0,
                        "steps": 20,
                        "cfg": 8.0,
                        "sampler_name": "euler",
                        "scheduler": "normal",
                        "denoise": 1.0,
                        "model": ["1", 0],
                        "positive": ["2", 0],
                        "negative": ["3", 0],
                        "latent_image": ["4", 0]
                    }
                },
                "6": {
                    "class_type": "VAEDecode",
                    "inputs": {"samples": ["5", 0], "vae": ["1", 2]}
                },
                "7": {
                    "class_type": "SaveAnimatedWEBP",
                    "inputs": {
                        "filename_prefix": "easel/video",
                        "fps": 16,
                        "lossless": false,
                        "quality": 90,
                        "method": "default",
                        "images": ["6", 0]
                    }
                }
            }),
            params: vec![
                spec("prompt", ParamKind::Text, "2", "text"),
                spec("negative_prompt", ParamKind::Text, "3", "text"),
                spec("width", ParamKind::Int, "4", "width"),
                spec("height", ParamKind::Int, "4", "height"),
                spec("frames", ParamKind::Int, "4", "length"),
                spec("fps", ParamKind::Int, "7", "fps"),
                spec("steps", ParamKind::Int, "5", "steps"),
                spec("cfg", ParamKind::Float, "5", "cfg"),
                spec("sampler_name", ParamKind::Text, "5", "sampler_name"),
                spec("scheduler", ParamKind::Text, "5", "scheduler"),
                spec("denoise", ParamKind::Float, "5", "denoise"),
                spec("model", ParamKind::Text, "1", "ckpt_name"),
                spec("seed", ParamKind::Int, "5", "seed"),
            ],
        }
    }

    /// Render the template with a resolved parameter map.
    ///
    /// Declared parameters absent from the map keep the graph's built-in
    /// value, except `seed`, which is randomized when not pinned.
    pub fn render(&self, params: &Map<String, Value>) -> Result<Value, EaselError> {
        let mut graph = self.graph.clone();
        for param in &self.params {
            let value = match params.get(param.name) {
                Some(v) => coerce(param, v)?,
                None if param.name == "seed" => json!(random_seed()),
                None => continue,
            };
            write_bindings(&mut graph, param, &value)?;
        }
        Ok(graph)
    }

    /// Rebind only the overridden parameters into a clone of an
    /// already-rendered workflow. Unknown names are validation errors.
    pub fn apply_overrides(
        &self,
        workflow: &Value,
        overrides: &Map<String, Value>,
    ) -> Result<Value, EaselError> {
        let mut graph = workflow.clone();
        for (name, value) in overrides {
            let param = self
                .params
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(|| {
                    EaselError::validation(format!(
                        "unknown override parameter '{}' for workflow {}",
                        name, self.id
                    ))
                })?;
            let coerced = coerce(param, value)?;
            write_bindings(&mut graph, param, &coerced)?;
        }
        Ok(graph)
    }
}

/// Pick a random seed. Kept within u32 range so JSON clients that decode
/// numbers as f64 round-trip it exactly.
pub fn random_seed() -> u64 {
    u64::from(rand::thread_rng().gen::<u32>())
}

fn coerce(param: &ParamSpec, value: &Value) -> Result<Value, EaselError> {
    match param.kind {
        ParamKind::Int => {
            if let Some(i) = value.as_i64() {
                Ok(json!(i))
            } else if let Some(f) = value.as_f64().filter(|f| f.fract() == 0.0) {
                Ok(json!(f as i64))
            } else {
                Err(EaselError::validation(format!(
                    "parameter '{}' must be an integer, got {}",
                    param.name, value
                )))
            }
        }
        ParamKind::Float => value.as_f64().map(|f| json!(f)).ok_or_else(|| {
            EaselError::validation(format!(
                "parameter '{}' must be a number, got {}",
                param.name, value
            ))
        }),
        ParamKind::Text => value.as_str().map(|s| json!(s)).ok_or_else(|| {
            EaselError::validation(format!(
                "parameter '{}' must be a string, got {}",
                param.name, value
            ))
        }),
    }
}

fn write_bindings(graph: &mut Value, param: &ParamSpec, value: &Value) -> Result<(), EaselError> {
    for binding in &param.bindings {
        let slot = graph
            .get_mut(binding.node)
            .and_then(|n| n.get_mut("inputs"))
            .and_then(|inputs| inputs.get_mut(binding.input));
        match slot {
            Some(slot) => *slot = value.clone(),
            None => {
                return Err(EaselError::validation(format!(
                    "parameter '{}' has no binding point in this workflow",
                    param.name
                )));
            }
        }
    }
    Ok(())
}

//! Visualization requests: validation, the supported model table and
//! shaping of the base-generation input.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::error::CoreError;
use crate::output::is_url_shaped;
use crate::types::UserId;

/// Face-swap model used when none is configured.
pub const DEFAULT_FACE_SWAP_MODEL: &str =
    "cdingram/face-swap:d1d6ea8c8be89d664a07a457526f7128109dee7030fdac424788d762c71ed111";

/// Supported image models: `(model id, provider model)`.
pub const IMAGE_MODELS: &[(&str, &str)] = &[
    ("flux-1.1-pro", "black-forest-labs/flux-1.1-pro"),
    ("flux-schnell", "black-forest-labs/flux-schnell"),
    ("flux-dev", "black-forest-labs/flux-dev"),
    ("ideogram-v2", "ideogram-ai/ideogram-v2"),
    ("recraft-v3", "recraft-ai/recraft-v3"),
    ("stable-diffusion-xl", "stability-ai/stable-diffusion-xl-base-1.0"),
];

/// Supported video models: `(model id, provider model)`.
pub const VIDEO_MODELS: &[(&str, &str)] = &[
    ("minimax-video-01", "minimax/video-01"),
    ("zeroscope-v2-xl", "anotherjesse/zeroscope-v2-xl"),
    ("stable-video-diffusion", "stability-ai/stable-video-diffusion"),
    ("tencent-hunyuan-video", "tencent/hunyuan-video"),
    ("wan-2.1-t2v", "wavespeedai/wan-2.1-t2v-480p"),
];

const FACE_SWAP_IMAGE_SUFFIX: &str = ", front facing portrait, face completely visible and unobstructed, \
no eyewear, no sunglasses, no glasses, clear eyes visible, natural lighting on face, \
professional photography, 4k, highly detailed";

const FACE_SWAP_NEGATIVE_PROMPT: &str =
    "sunglasses, glasses, eyewear, dark glasses, shades, obscured eyes, covered eyes, hidden eyes";

const FACE_SWAP_VIDEO_SUFFIX: &str = ", cinematic video, high quality, face visible";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationType {
    Image,
    Video,
}

impl GenerationType {
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            other => Err(CoreError::Validation(format!(
                "generationType must be 'image' or 'video', got '{other}'"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    fn models(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Image => IMAGE_MODELS,
            Self::Video => VIDEO_MODELS,
        }
    }
}

/// Look up the provider model for a model id of the given generation type.
pub fn resolve_model(generation_type: GenerationType, model_id: &str) -> Result<&'static str, CoreError> {
    let models = generation_type.models();
    models
        .iter()
        .find(|(id, _)| *id == model_id)
        .map(|(_, provider_model)| *provider_model)
        .ok_or_else(|| {
            let available: Vec<&str> = models.iter().map(|(id, _)| *id).collect();
            CoreError::Validation(format!(
                "Unsupported model ID '{model_id}' for {} generation. Available models: {}",
                generation_type.as_str(),
                available.join(", ")
            ))
        })
}

/// Per-stage model input overrides supplied by the client.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParameters {
    #[serde(default)]
    pub image_generation: Option<Map<String, Value>>,
    #[serde(default)]
    pub video_generation: Option<Map<String, Value>>,
}

/// Body of `POST /api/v1/visualizations`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartVisualizationRequest {
    #[serde(default)]
    pub generation_type: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "modelId is required"))]
    pub model_id: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 2000, message = "prompt is required and must be at most 2000 characters"))]
    pub prompt: String,
    #[serde(default)]
    pub enable_face_swap: bool,
    /// URL of the user's portrait; required when `enable_face_swap` is set.
    pub image_path: Option<String>,
    pub style: Option<String>,
    pub mood: Option<String>,
    /// Extra details forwarded to the prompt enhancer.
    pub details: Option<String>,
    /// Run the prompt through the enhancer before generation.
    #[serde(default)]
    pub enhance_prompt: bool,
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub parameters: GenerationParameters,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub generation_type: GenerationType,
    pub model_id: String,
    pub replicate_model: &'static str,
    pub prompt: String,
    /// Portrait URL when a face swap follows the base stage.
    pub face_swap_image: Option<String>,
    pub style: Option<String>,
    pub mood: Option<String>,
    pub details: Option<String>,
    pub enhance_prompt: bool,
    pub user_id: Option<UserId>,
    pub parameters: GenerationParameters,
}

impl ValidatedRequest {
    pub fn needs_face_swap(&self) -> bool {
        self.face_swap_image.is_some()
    }

    /// Media type of the final result. The face-swap model always yields an image.
    pub fn result_media_type(&self) -> GenerationType {
        if self.needs_face_swap() {
            GenerationType::Image
        } else {
            self.generation_type
        }
    }
}

/// Validate a start request and resolve its model.
pub fn validate_start_request(req: StartVisualizationRequest) -> Result<ValidatedRequest, CoreError> {
    req.validate()
        .map_err(|e| CoreError::Validation(e.to_string()))?;

    if req.generation_type.is_empty() {
        return Err(CoreError::Validation(
            "generationType is required. Must be 'image' or 'video'.".to_string(),
        ));
    }
    let generation_type = GenerationType::parse(&req.generation_type)?;
    let replicate_model = resolve_model(generation_type, &req.model_id)?;

    if req.prompt.trim().is_empty() {
        return Err(CoreError::Validation("prompt is required".to_string()));
    }

    let face_swap_image = if req.enable_face_swap {
        match req.image_path.as_deref().map(str::trim) {
            Some(path) if is_url_shaped(path) && url::Url::parse(path).is_ok() => Some(path.to_string()),
            Some(_) => {
                return Err(CoreError::Validation(
                    "Invalid imagePath provided for face swap. It must be a valid URL.".to_string(),
                ))
            }
            None => {
                return Err(CoreError::Validation(
                    "imagePath is required when enableFaceSwap is true".to_string(),
                ))
            }
        }
    } else {
        None
    };

    Ok(ValidatedRequest {
        generation_type,
        model_id: req.model_id,
        replicate_model,
        prompt: req.prompt,
        face_swap_image,
        style: non_blank(req.style),
        mood: non_blank(req.mood),
        details: non_blank(req.details),
        enhance_prompt: req.enhance_prompt,
        user_id: req.user_id,
        parameters: req.parameters,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Append style and mood hints to a prompt.
pub fn decorate_prompt(prompt: &str, style: Option<&str>, mood: Option<&str>) -> String {
    let mut out = prompt.trim().to_string();
    if let Some(style) = style {
        out.push_str(&format!(", {style} style"));
    }
    if let Some(mood) = mood {
        out.push_str(&format!(", {mood} mood"));
    }
    out
}

/// Build the provider input for the base-generation job.
///
/// `prompt` is the (possibly enhanced) prompt before style/mood decoration.
pub fn base_generation_input(req: &ValidatedRequest, prompt: &str) -> Value {
    let mut prompt = decorate_prompt(prompt, req.style.as_deref(), req.mood.as_deref());
    let mut input = Map::new();

    match (req.generation_type, req.needs_face_swap()) {
        (GenerationType::Image, true) => {
            prompt.push_str(FACE_SWAP_IMAGE_SUFFIX);
            input.insert(
                "negative_prompt".to_string(),
                Value::String(FACE_SWAP_NEGATIVE_PROMPT.to_string()),
            );
        }
        (GenerationType::Video, true) => prompt.push_str(FACE_SWAP_VIDEO_SUFFIX),
        _ => {}
    }
    input.insert("prompt".to_string(), Value::String(prompt));

    let overrides = match req.generation_type {
        GenerationType::Image => req.parameters.image_generation.as_ref(),
        GenerationType::Video => req.parameters.video_generation.as_ref(),
    };
    if let Some(overrides) = overrides {
        for (key, value) in overrides {
            input.insert(key.clone(), value.clone());
        }
    }

    Value::Object(input)
}

/// Provider input for a face-swap job.
pub fn face_swap_input(base_url: &str, portrait_url: &str) -> Value {
    serde_json::json!({
        "input_image": base_url,
        "swap_image": portrait_url,
    })
}

//! Starting a visualization: validate, shape the prompt, submit, record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use visionary_core::job::{JobKind, JobStatus};
use visionary_core::lifecycle::{status_message, VisualizationState};
use visionary_core::progress::BASE_START;
use visionary_core::types::HistoryId;
use visionary_core::visualization::{
    base_generation_input, validate_start_request, GenerationType, StartVisualizationRequest, ValidatedRequest,
};
use visionary_db::models::history::CreateHistory;

use crate::context::PipelineContext;
use crate::enhancer::EnhanceRequest;
use crate::error::PipelineError;

/// Answer to `POST /visualizations`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub success: bool,
    pub prediction_id: String,
    /// `None` when the history record could not be created; polling then
    /// falls back to lookup by prediction id.
    pub history_id: Option<HistoryId>,
    pub needs_face_swap: bool,
    pub face_swap_input_image: Option<String>,
    /// Media type of the final result.
    pub generation_type: GenerationType,
    pub model_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_prompt: Option<String>,
}

#[derive(Clone)]
pub struct StartService {
    ctx: PipelineContext,
}

impl StartService {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub async fn start(&self, request: StartVisualizationRequest) -> Result<StartResponse, PipelineError> {
        let validated = validate_start_request(request)?;
        let enhanced = self.enhance(&validated).await;
        let prompt = enhanced.as_deref().unwrap_or(&validated.prompt);

        let input = base_generation_input(&validated, prompt);
        let handle = self
            .ctx
            .submitter()
            .submit_base(validated.replicate_model, &input)
            .await?;

        let history_id = Uuid::new_v4();
        let record = self
            .ctx
            .recorder()
            .create(&CreateHistory {
                id: history_id,
                user_id: validated.user_id,
                original_prompt: Some(validated.prompt.clone()),
                enhanced_prompt: enhanced.clone(),
                model_id: Some(validated.model_id.clone()),
                replicate_model: Some(validated.replicate_model.to_string()),
                generation_input: Some(input),
                media_type: Some(validated.result_media_type().as_str().to_string()),
                status: VisualizationState::Starting(JobKind::BaseGeneration)
                    .as_status_str()
                    .to_string(),
                status_message: Some(status_message(JobKind::BaseGeneration, JobStatus::Starting)),
                progress: i16::from(BASE_START),
                face_swap_input_image: validated.face_swap_image.clone(),
                replicate_prediction_id: Some(handle.id.clone()),
            })
            .await;

        tracing::info!(
            history_id = %history_id,
            prediction_id = %handle.id,
            generation_type = validated.generation_type.as_str(),
            model_id = %validated.model_id,
            needs_face_swap = validated.needs_face_swap(),
            recorded = record.is_some(),
            "Visualization started",
        );

        Ok(StartResponse {
            success: true,
            prediction_id: handle.id,
            history_id: record.map(|r| r.id),
            needs_face_swap: validated.needs_face_swap(),
            face_swap_input_image: validated.face_swap_image.clone(),
            generation_type: validated.result_media_type(),
            model_id: validated.model_id,
            enhanced_prompt: enhanced,
        })
    }

    /// Enhanced prompt, or `None` to keep the original.
    async fn enhance(&self, validated: &ValidatedRequest) -> Option<String> {
        if !validated.enhance_prompt {
            return None;
        }
        let Some(enhancer) = self.ctx.enhancer.as_ref() else {
            tracing::debug!("Prompt enhancement requested but no LLM is configured");
            return None;
        };

        let request = EnhanceRequest {
            original_prompt: validated.prompt.clone(),
            target_generation: Some(validated.generation_type.as_str().to_string()),
            style: validated.style.clone(),
            mood: validated.mood.clone(),
            details: validated.details.clone(),
        };
        match enhancer.enhance(&request).await {
            Ok(prompt) => Some(prompt),
            Err(e) => {
                tracing::warn!(error = %e, "Prompt enhancement failed, using original prompt");
                None
            }
        }
    }
}

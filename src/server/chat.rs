//! `POST /api/chat` — the next-question service.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};

use super::{ApiError, AppState};
use crate::error::LlmError;
use crate::question::{NextQuestionReply, NextQuestionRequest, asks_for_more_detail};

pub async fn next_question(
    State(state): State<AppState>,
    body: Result<Json<NextQuestionRequest>, JsonRejection>,
) -> Result<Json<NextQuestionReply>, ApiError> {
    let Json(request) = body.map_err(|e| {
        tracing::debug!(error = %e, "Invalid chat body");
        ApiError::new(StatusCode::BAD_REQUEST, "Erro no chat")
    })?;
    if request.user_text.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Erro no chat"));
    }

    match state.assistant.reply(&request).await {
        Ok(reply) => {
            let needs_more_detail = asks_for_more_detail(&reply);
            Ok(Json(NextQuestionReply {
                reply,
                needs_more_detail: Some(needs_more_detail),
            }))
        }
        Err(LlmError::NotConfigured { .. }) => Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "OPENAI_API_KEY ausente",
        )),
        Err(e) => {
            tracing::warn!(step = ?request.step_id, error = %e, "Chat completion failed");
            Err(ApiError::new(StatusCode::BAD_GATEWAY, "Falha na IA"))
        }
    }
}

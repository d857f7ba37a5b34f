//! Session-hosted conversation routes under `/api/intake`.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::sessions::SharedEngine;
use super::{ApiError, AppState};
use crate::error::IntakeError;
use crate::intake::{ContactDraft, IntakeView, TransitionResult};

#[derive(Deserialize)]
pub struct MessageRequest {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    transition: TransitionResult,
    view: IntakeView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_preview: Option<serde_json::Value>,
    view: IntakeView,
}

async fn session(state: &AppState, id: &str) -> Result<SharedEngine, ApiError> {
    if Uuid::parse_str(id).is_err() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Sessao invalida."));
    }
    match state.sessions.open(id).await {
        Ok(Some(engine)) => Ok(engine),
        Ok(None) => Err(ApiError::not_found()),
        Err(e) => {
            tracing::warn!(session = %id, error = %e, "Failed to open session");
            Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Falha ao carregar a conversa.",
            ))
        }
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v).map_err(|e| {
        tracing::debug!(error = %e, "Invalid request body");
        ApiError::new(StatusCode::BAD_REQUEST, "Corpo da requisicao invalido.")
    })
}

pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<IntakeView>) {
    let (_, engine) = state.sessions.create().await;
    let view = engine.lock().await.view();
    (StatusCode::CREATED, Json(view))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<IntakeView>, ApiError> {
    let engine = session(&state, &id).await?;
    let engine = engine.try_lock().map_err(|_| ApiError::busy())?;
    Ok(Json(engine.view()))
}

pub async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let request = json_body(body)?;
    let engine = session(&state, &id).await?;
    let mut engine = engine.try_lock().map_err(|_| ApiError::busy())?;

    let transition = engine.submit(&request.text).await;
    if transition == TransitionResult::Rejected {
        return Err(IntakeError::InputRejected.into());
    }
    Ok(Json(MessageResponse {
        transition,
        view: engine.view(),
    }))
}

pub async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<IntakeView>, ApiError> {
    let engine = session(&state, &id).await?;
    let mut engine = engine.try_lock().map_err(|_| ApiError::busy())?;
    engine.reset().await;
    Ok(Json(engine.view()))
}

pub async fn update_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ContactDraft>, JsonRejection>,
) -> Result<Json<IntakeView>, ApiError> {
    let contact = json_body(body)?;
    let engine = session(&state, &id).await?;
    let mut engine = engine.try_lock().map_err(|_| ApiError::busy())?;
    engine.update_contact(contact).await?;
    Ok(Json(engine.view()))
}

pub async fn submit_lead(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LeadResponse>, ApiError> {
    let engine = session(&state, &id).await?;
    let mut engine = engine.try_lock().map_err(|_| ApiError::busy())?;
    let receipt = engine.submit_lead(state.lead_submitter.as_ref()).await?;
    Ok(Json(LeadResponse {
        message: receipt.message,
        payload_preview: receipt.payload_preview,
        view: engine.view(),
    }))
}

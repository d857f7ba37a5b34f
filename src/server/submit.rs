//! `POST /api/submit` — the lead submission service.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};

use super::{ApiError, AppState};
use crate::lead::{DispatchError, LeadPayload, LeadReceipt};

pub async fn submit_lead(
    State(state): State<AppState>,
    body: Result<Json<LeadPayload>, JsonRejection>,
) -> Result<Json<LeadReceipt>, ApiError> {
    let Json(payload) = body.map_err(|e| {
        tracing::debug!(error = %e, "Invalid lead body");
        ApiError::new(StatusCode::BAD_REQUEST, "Erro ao enviar ficha.")
    })?;

    state
        .dispatcher
        .dispatch(&payload)
        .await
        .map(Json)
        .map_err(dispatch_error)
}

fn dispatch_error(e: DispatchError) -> ApiError {
    let status = match e {
        DispatchError::MissingContact { .. } => StatusCode::BAD_REQUEST,
        DispatchError::Webhook { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        DispatchError::Email { .. } => StatusCode::BAD_GATEWAY,
    };
    let message = e.to_string();
    match e {
        DispatchError::MissingContact { missing } => ApiError {
            status,
            message,
            missing,
        },
        DispatchError::Webhook { detail } => {
            tracing::warn!(detail = %detail, "Lead webhook failed");
            ApiError::new(status, message)
        }
        DispatchError::Email { reason } => {
            tracing::warn!(reason = %reason, "Lead email failed");
            ApiError::new(status, message)
        }
    }
}

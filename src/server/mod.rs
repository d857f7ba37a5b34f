//! HTTP surface: the next-question and lead services plus a session-hosted
//! conversation API for UIs that do not run the engine themselves.

pub mod chat;
pub mod intake;
pub mod sessions;
pub mod submit;

pub use sessions::SessionRegistry;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::IntakeConfig;
use crate::error::{Error, IntakeError};
use crate::intake::{EngineDeps, StepCatalog, build_policy};
use crate::lead::{HttpLeadSubmitter, LeadDispatcher, LeadMailer, LeadSubmitter};
use crate::llm::create_provider;
use crate::question::{AssistantService, HttpNextQuestionService, NextQuestionService};
use crate::store::Store;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    /// Backs `POST /api/chat`.
    pub assistant: Arc<AssistantService>,
    /// Backs `POST /api/submit`.
    pub dispatcher: Arc<LeadDispatcher>,
    /// Where session leads go: the dispatcher itself or a remote service.
    pub lead_submitter: Arc<dyn LeadSubmitter>,
}

impl AppState {
    /// Wire every service from configuration over `store`.
    pub fn from_config(config: &IntakeConfig, store: Arc<dyn Store>) -> Result<Self, Error> {
        let catalog = Arc::new(StepCatalog::standard());

        let provider = match config.openai {
            Some(ref openai) => Some(create_provider(openai, config.upstream_timeout)?),
            None => {
                tracing::warn!("OPENAI_API_KEY not set, /api/chat will answer 500");
                None
            }
        };
        let assistant = Arc::new(AssistantService::new(provider, &catalog));

        let next_question: Arc<dyn NextQuestionService> = match config.next_question_url {
            Some(ref url) => {
                tracing::info!(url = %url, "Using remote next-question service");
                Arc::new(HttpNextQuestionService::new(url.clone(), config.upstream_timeout)?)
            }
            None => assistant.clone(),
        };
        let policy = build_policy(config.advance_policy, next_question, config.upstream_timeout);
        tracing::info!(policy = policy.name(), "Step advance policy selected");

        let deps = EngineDeps::new(Arc::clone(&catalog), policy);
        let sessions = Arc::new(SessionRegistry::new(
            deps,
            store,
            config.storage_namespace.clone(),
        ));

        let mailer = config.smtp.clone().map(LeadMailer::new);
        let dispatcher = Arc::new(LeadDispatcher::new(
            config.sheets_webhook_url.clone(),
            mailer,
            config.upstream_timeout,
        )?);
        if dispatcher.is_stub() {
            tracing::warn!("No lead channel configured, /api/submit runs as a stub");
        }

        let lead_submitter: Arc<dyn LeadSubmitter> = match config.lead_url {
            Some(ref url) => Arc::new(HttpLeadSubmitter::new(url.clone(), config.upstream_timeout)?),
            None => dispatcher.clone(),
        };

        Ok(Self {
            sessions,
            assistant,
            dispatcher,
            lead_submitter,
        })
    }
}

/// Build the router with every route, CORS and request tracing.
pub fn app_routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat::next_question))
        .route("/api/submit", post(submit::submit_lead))
        .route("/api/intake", post(intake::create_session))
        .route("/api/intake/{id}", get(intake::get_session))
        .route("/api/intake/{id}/messages", post(intake::post_message))
        .route("/api/intake/{id}/reset", post(intake::reset_session))
        .route("/api/intake/{id}/contact", put(intake::update_contact))
        .route("/api/intake/{id}/lead", post(intake::submit_lead))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "anamnesis"
    }))
}

/// Error body `{ "message": ... }` with an HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub missing: Vec<&'static str>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            missing: Vec::new(),
        }
    }

    pub fn busy() -> Self {
        Self::new(
            StatusCode::CONFLICT,
            "Aguarde a resposta anterior antes de enviar outra mensagem.",
        )
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Sessao nao encontrada.")
    }
}

impl From<IntakeError> for ApiError {
    fn from(e: IntakeError) -> Self {
        match e {
            IntakeError::ValidationFailed { missing } => Self {
                status: StatusCode::BAD_REQUEST,
                message: "Preencha nome, email, WhatsApp e aceite o uso dos dados.".to_string(),
                missing,
            },
            IntakeError::DeliveryFailed { .. } => {
                Self::new(StatusCode::BAD_GATEWAY, "Falha ao enviar. Tente novamente.")
            }
            IntakeError::UpstreamUnavailable { .. } => {
                Self::new(StatusCode::BAD_GATEWAY, "Falha na IA")
            }
            IntakeError::AlreadySubmitted => {
                Self::new(StatusCode::CONFLICT, "Ficha ja enviada.")
            }
            IntakeError::NotCollectingContact => {
                Self::new(StatusCode::CONFLICT, "A entrevista ainda nao terminou.")
            }
            IntakeError::InputRejected => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                crate::intake::catalog::REJECTION_MESSAGE,
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(status = %self.status, message = %self.message, "Request failed");
        }
        let body = if self.missing.is_empty() {
            serde_json::json!({ "message": self.message })
        } else {
            serde_json::json!({ "message": self.message, "missing": self.missing })
        };
        (self.status, Json(body)).into_response()
    }
}

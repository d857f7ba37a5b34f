//! HTTP client for a remote next-question endpoint.

use std::time::Duration;

use async_trait::async_trait;

use super::{ErrorBody, NextQuestion, NextQuestionReply, NextQuestionRequest, NextQuestionService};
use crate::error::IntakeError;

pub struct HttpNextQuestionService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNextQuestionService {
    /// `endpoint` is the full URL, e.g. `https://site/api/chat`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, IntakeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IntakeError::UpstreamUnavailable {
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl NextQuestionService for HttpNextQuestionService {
    async fn next_question(
        &self,
        request: &NextQuestionRequest,
    ) -> Result<NextQuestion, IntakeError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| IntakeError::UpstreamUnavailable {
                reason: if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.message)
                .unwrap_or_else(|_| "Erro na IA".to_string());
            return Err(IntakeError::UpstreamUnavailable {
                reason: format!("HTTP {status}: {message}"),
            });
        }

        let wire: NextQuestionReply =
            response
                .json()
                .await
                .map_err(|e| IntakeError::UpstreamUnavailable {
                    reason: format!("invalid reply body: {e}"),
                })?;

        Ok(wire.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::model::AnswerSet;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use tokio::net::TcpListener;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api/chat")
    }

    fn request() -> NextQuestionRequest {
        NextQuestionRequest {
            user_text: "treino 3x por semana".into(),
            step_id: Some("availability".into()),
            current_prompt: Some("Dias/semana?".into()),
            answers: AnswerSet::new(),
            risk_flag: false,
            transcript: Vec::new(),
        }
    }

    #[tokio::test]
    async fn reply_with_question_mark_needs_detail() {
        let app = Router::new().route(
            "/api/chat",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["userText"], "treino 3x por semana");
                Json(serde_json::json!({"reply": "Pode detalhar a frequência?"}))
            }),
        );
        let service = HttpNextQuestionService::new(serve(app).await, Duration::from_secs(2)).unwrap();
        let next = service.next_question(&request()).await.unwrap();
        assert_eq!(next.reply, "Pode detalhar a frequência?");
        assert!(next.needs_more_detail);
    }

    #[tokio::test]
    async fn error_status_is_upstream_unavailable() {
        let app = Router::new().route(
            "/api/chat",
            post(|| async {
                (
                    StatusCode::BAD_GATEWAY,
                    Json(serde_json::json!({"message": "Falha na IA"})),
                )
            }),
        );
        let service = HttpNextQuestionService::new(serve(app).await, Duration::from_secs(2)).unwrap();
        match service.next_question(&request()).await {
            Err(IntakeError::UpstreamUnavailable { reason }) => {
                assert!(reason.contains("Falha na IA"));
            }
            other => panic!("expected UpstreamUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_body_is_upstream_unavailable() {
        let app = Router::new().route("/api/chat", post(|| async { "not json" }));
        let service = HttpNextQuestionService::new(serve(app).await, Duration::from_secs(2)).unwrap();
        assert!(matches!(
            service.next_question(&request()).await,
            Err(IntakeError::UpstreamUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn hang_is_cut_by_timeout() {
        let app = Router::new().route(
            "/api/chat",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(serde_json::json!({"reply": "tarde demais"}))
            }),
        );
        let service =
            HttpNextQuestionService::new(serve(app).await, Duration::from_millis(200)).unwrap();
        match service.next_question(&request()).await {
            Err(IntakeError::UpstreamUnavailable { reason }) => assert_eq!(reason, "request timed out"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}

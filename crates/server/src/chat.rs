use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use sdr_assist_agent::ConversationDriver;
use sdr_assist_core::domain::conversation::ConversationId;
use serde::{Deserialize, Serialize};
use tracing::{error, info, Instrument};
use uuid::Uuid;

pub const LIVENESS_MESSAGE: &str = "Servidor do Assistente SDR está funcionando";
const TURN_FAILED_MESSAGE: &str = "Não foi possível processar a mensagem no momento.";

#[derive(Clone)]
pub struct ChatState {
    driver: Arc<ConversationDriver>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub thread_id: String,
    /// Present only when the run ended in a status other than `completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatError {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct Liveness {
    pub message: &'static str,
}

pub fn router(driver: Arc<ConversationDriver>) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/chat", post(chat))
        .with_state(ChatState { driver })
}

async fn liveness() -> Json<Liveness> {
    Json(Liveness { message: LIVENESS_MESSAGE })
}

async fn chat(
    State(state): State<ChatState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ChatError>)> {
    let correlation_id = Uuid::new_v4().to_string();
    let requested = request
        .thread_id
        .filter(|id| !id.trim().is_empty())
        .map(ConversationId);
    let span = tracing::info_span!(
        "chat_turn",
        correlation_id = %correlation_id,
        thread_id = requested.as_ref().map(|id| id.0.as_str()).unwrap_or("new")
    );

    async move {
        info!(event_name = "server.chat.received", "chat turn received");
        match state.driver.run_turn(requested, &request.message).await {
            Ok(reply) => {
                info!(
                    event_name = "server.chat.replied",
                    reply_thread_id = %reply.conversation_id,
                    status = %reply.status,
                    "chat turn finished"
                );
                let status = (!reply.status.is_success()).then(|| reply.status.to_string());
                Ok(Json(ChatResponse {
                    response: reply.text,
                    thread_id: reply.conversation_id.0,
                    status,
                }))
            }
            Err(turn_error) => {
                error!(event_name = "server.chat.failed", error = %turn_error, "chat turn failed");
                Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ChatError { error: TURN_FAILED_MESSAGE.to_string() }),
                ))
            }
        }
    }
    .instrument(span)
    .await
}

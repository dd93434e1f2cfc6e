use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Session used when a request does not name one.
pub const DEFAULT_SESSION_ID: &str = "default_session";
pub const LIVENESS_MESSAGE: &str = "Backend server is running!";

/// Request body for `POST /api/chat`.
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ChatRequest {
    /// Parse a body that must be a JSON object with string `question` and
    /// `session_id` fields, when present.
    pub fn parse(body: &[u8]) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| debug!(error = %e, "chat request body is not JSON"))
            .ok()?;
        if !value.is_object() {
            debug!("chat request body is not a JSON object");
            return None;
        }
        serde_json::from_value(value)
            .map_err(|e| debug!(error = %e, "chat request fields have the wrong type"))
            .ok()
    }

    /// The question, if it is present and non-empty.
    pub fn question(&self) -> Option<&str> {
        self.question.as_deref().filter(|q| !q.is_empty())
    }

    pub fn session_id(&self) -> &str {
        self.session_id.as_deref().unwrap_or(DEFAULT_SESSION_ID)
    }
}

/// Response body for a successful chat turn.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
}

/// GET /
pub async fn index() -> &'static str {
    LIVENESS_MESSAGE
}

/// POST /api/chat
///
/// Validates the question before touching the pipeline, so a bad request
/// never triggers initialization. History is only written after an answer
/// has been produced.
pub async fn chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ChatResponse>, ApiError> {
    let request = ChatRequest::parse(&body).ok_or_else(ApiError::no_question)?;

    let question = request.question().ok_or_else(ApiError::no_question)?;
    let session_id = request.session_id();

    let generator = state.pipeline.ensure_ready().await.map_err(|e| {
        warn!(error = %e, "chat request rejected, pipeline is not ready");
        ApiError::not_ready()
    })?;

    let history = state.sessions.get_history(session_id);
    debug!(session_id, turns = history.len(), "answering question");

    let answer = generator.answer(question, &history).await.map_err(|e| {
        error!(session_id, error = %e, "failed to answer question");
        ApiError::processing_failed()
    })?;

    state.sessions.append_turn(session_id, question, answer.as_str());

    Ok(Json(ChatResponse { answer }))
}

//! Chat handler

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::AppState;
use clarus_common::errors::{AppError, Result};
use clarus_context::{ChatReply, ChatRequest, HistoryMessage};

/// Body of `POST /chat`
#[derive(Debug, Deserialize, Validate)]
pub struct ChatBody {
    #[serde(default)]
    #[validate(length(max = 200000))]
    pub essay: String,

    /// Accepted as `vraag` too
    #[serde(default, alias = "vraag")]
    #[validate(length(max = 4000))]
    pub question: String,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub history: Vec<HistoryMessage>,
}

/// Answer a question about an essay
///
/// Upstream failures come back as `500 {"error": ...}` with a generic message.
/// Bodies that cannot be read are rejected before any model call.
pub async fn chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatBody>, JsonRejection>,
) -> Result<(StatusCode, Json<ChatReply>)> {
    let Json(body) = payload.map_err(|rejection| reject(rejection, &state))?;

    body.validate().map_err(|e| AppError::Validation {
        field: e.field_errors().keys().next().map(|k| k.to_string()),
        message: e.to_string(),
    })?;

    if body.essay.trim().is_empty() && body.question.trim().is_empty() && body.history.is_empty() {
        return Err(AppError::MissingField {
            field: "question".to_string(),
        });
    }

    let reply = state
        .chat
        .answer(ChatRequest {
            essay: body.essay,
            question: body.question,
            history: body.history,
        })
        .await;

    let status = if reply.is_error() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };

    Ok((status, Json(reply)))
}

fn reject(rejection: JsonRejection, state: &AppState) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge {
            limit: state.config.server.max_body_bytes,
        };
    }
    AppError::InvalidFormat {
        message: rejection.body_text(),
    }
}

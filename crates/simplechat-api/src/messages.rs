use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use simplechat_types::api::SendMessageRequest;
use simplechat_types::models::{ChatId, Message, MessageId};
use tracing::debug;

use crate::middleware::Caller;
use crate::{ApiError, AppState, PageQuery, blocking};

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub chat_id: ChatId,
    #[serde(default = "crate::default_page_id")]
    pub page_id: u32,
    #[serde(default = "crate::default_page_size")]
    pub page_size: u32,
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let message = blocking(move || {
        Ok(state
            .engine
            .messages
            .send(caller.id, req.chat_id, &req.body)?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Messages of one chat, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Query(query), _): WithRejection<Query<MessageQuery>, ApiError>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let page = PageQuery {
        page_id: query.page_id,
        page_size: query.page_size,
    }
    .page()?;
    let chat_id = query.chat_id;

    let messages =
        blocking(move || Ok(state.engine.messages.list(caller.id, chat_id, page)?)).await?;
    debug!(chat_id = %chat_id, count = messages.len(), "Listed messages");
    Ok(Json(messages))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Path(message_id), _): WithRejection<Path<MessageId>, ApiError>,
) -> Result<StatusCode, ApiError> {
    blocking(move || Ok(state.engine.messages.delete(caller.id, message_id)?)).await?;
    Ok(StatusCode::NO_CONTENT)
}

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use simplechat_types::api::CreateChatRequest;
use simplechat_types::models::{Chat, ChatId};

use crate::middleware::Caller;
use crate::{ApiError, AppState, PageQuery, blocking};

pub async fn create_chat(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Json(req), _): WithRejection<Json<CreateChatRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let chat = blocking(move || Ok(state.engine.chats.create(caller.id, req.contact_id)?)).await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

/// Chats of the caller, never-used chats first, then by last activity.
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Query(query), _): WithRejection<Query<PageQuery>, ApiError>,
) -> Result<Json<Vec<Chat>>, ApiError> {
    let page = query.page()?;
    let chats = blocking(move || Ok(state.engine.chats.list(caller.id, page)?)).await?;
    Ok(Json(chats))
}

pub async fn get_chat(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Path(chat_id), _): WithRejection<Path<ChatId>, ApiError>,
) -> Result<Json<Chat>, ApiError> {
    let chat = blocking(move || Ok(state.engine.chats.get(caller.id, chat_id)?)).await?;
    Ok(Json(chat))
}

pub async fn find_chat_with(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Path(username), _): WithRejection<Path<String>, ApiError>,
) -> Result<Json<Chat>, ApiError> {
    let chat = blocking(move || Ok(state.engine.chats.find_with(caller.id, &username)?)).await?;
    Ok(Json(chat))
}

pub async fn delete_chat(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Path(chat_id), _): WithRejection<Path<ChatId>, ApiError>,
) -> Result<StatusCode, ApiError> {
    blocking(move || Ok(state.engine.chats.delete(caller.id, chat_id)?)).await?;
    Ok(StatusCode::NO_CONTENT)
}

use axum::{
    Json,
    extract::{Path, Query, State},
};
use axum_extra::extract::WithRejection;
use simplechat_types::api::PublicUserResponse;
use simplechat_types::models::UserId;

use crate::{ApiError, AppState, PageQuery, blocking};

pub async fn get_user(
    State(state): State<AppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<UserId>, ApiError>,
) -> Result<Json<PublicUserResponse>, ApiError> {
    let user = blocking(move || Ok(state.engine.identity.user(user_id)?)).await?;
    Ok(Json(user.into()))
}

pub async fn list_users(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<PageQuery>, ApiError>,
) -> Result<Json<Vec<PublicUserResponse>>, ApiError> {
    let page = query.page()?;
    let users = blocking(move || Ok(state.engine.accounts.list_users(page)?)).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

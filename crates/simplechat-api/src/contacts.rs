use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use simplechat_core::Engine;
use simplechat_types::api::{ContactResponse, CreateContactRequest};
use simplechat_types::models::{Contact, ContactId, ContactStatus};

use crate::middleware::Caller;
use crate::{ApiError, AppState, PageQuery, blocking};

#[derive(Debug, Deserialize)]
pub struct ContactQuery {
    pub status: Option<ContactStatus>,
    #[serde(default = "crate::default_page_id")]
    pub page_id: u32,
    #[serde(default = "crate::default_page_size")]
    pub page_size: u32,
}

/// Attach both participants' usernames to a contact.
fn with_usernames(engine: &Engine, contact: Contact) -> Result<ContactResponse, ApiError> {
    let requester = engine.identity.user(contact.requester_id)?;
    let addressee = engine.identity.user(contact.addressee_id)?;
    Ok(ContactResponse {
        id: contact.id,
        requester_id: contact.requester_id,
        requester_username: requester.username,
        addressee_id: contact.addressee_id,
        addressee_username: addressee.username,
        status: contact.status,
        requested_at: contact.requested_at,
        accepted_at: contact.accepted_at,
    })
}

pub async fn create_contact(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Json(req), _): WithRejection<Json<CreateContactRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let contact = blocking(move || {
        let contact = state.engine.contacts.request(caller.id, &req.username)?;
        with_usernames(&state.engine, contact)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Query(query), _): WithRejection<Query<ContactQuery>, ApiError>,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    let page = PageQuery {
        page_id: query.page_id,
        page_size: query.page_size,
    };
    list_by_status(state, caller, query.status, page).await
}

pub async fn list_pending(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Query(page), _): WithRejection<Query<PageQuery>, ApiError>,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    list_by_status(state, caller, Some(ContactStatus::Pending), page).await
}

pub async fn list_accepted(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Query(page), _): WithRejection<Query<PageQuery>, ApiError>,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    list_by_status(state, caller, Some(ContactStatus::Accepted), page).await
}

pub async fn list_rejected(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Query(page), _): WithRejection<Query<PageQuery>, ApiError>,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    list_by_status(state, caller, Some(ContactStatus::Rejected), page).await
}

async fn list_by_status(
    state: AppState,
    caller: Caller,
    status: Option<ContactStatus>,
    page: PageQuery,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    let page = page.page()?;
    let contacts = blocking(move || {
        state
            .engine
            .contacts
            .list(caller.id, status, page)?
            .into_iter()
            .map(|contact| with_usernames(&state.engine, contact))
            .collect::<Result<Vec<_>, _>>()
    })
    .await?;

    Ok(Json(contacts))
}

pub async fn get_contact(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Path(contact_id), _): WithRejection<Path<ContactId>, ApiError>,
) -> Result<Json<ContactResponse>, ApiError> {
    let contact = blocking(move || {
        let contact = state.engine.contacts.get(caller.id, contact_id)?;
        with_usernames(&state.engine, contact)
    })
    .await?;

    Ok(Json(contact))
}

pub async fn accept_contact(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Path(contact_id), _): WithRejection<Path<ContactId>, ApiError>,
) -> Result<Json<ContactResponse>, ApiError> {
    let contact = blocking(move || {
        let contact = state.engine.contacts.accept(caller.id, contact_id)?;
        with_usernames(&state.engine, contact)
    })
    .await?;

    Ok(Json(contact))
}

pub async fn reject_contact(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Path(contact_id), _): WithRejection<Path<ContactId>, ApiError>,
) -> Result<Json<ContactResponse>, ApiError> {
    let contact = blocking(move || {
        let contact = state.engine.contacts.reject(caller.id, contact_id)?;
        with_usernames(&state.engine, contact)
    })
    .await?;

    Ok(Json(contact))
}

//! HTTP/JSON surface over the simplechat engine.

pub mod auth;
pub mod chats;
pub mod contacts;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod users;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use simplechat_types::page::{MAX_PAGE_SIZE, Page};
use tracing::error;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;

/// All routes. Registration and login are public; everything else goes through
/// [`middleware::require_auth`].
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/users", post(auth::register))
        .route("/users/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/{user_id}", get(users::get_user))
        .route("/contacts", post(contacts::create_contact).get(contacts::list_contacts))
        .route("/contacts/pending", get(contacts::list_pending))
        .route("/contacts/accepted", get(contacts::list_accepted))
        .route("/contacts/rejected", get(contacts::list_rejected))
        .route("/contacts/{contact_id}", get(contacts::get_contact))
        .route("/contacts/{contact_id}/accept", put(contacts::accept_contact))
        .route("/contacts/{contact_id}/reject", put(contacts::reject_contact))
        .route("/chats", post(chats::create_chat).get(chats::list_chats))
        .route("/chats/with/{username}", get(chats::find_chat_with))
        .route("/chats/{chat_id}", get(chats::get_chat).delete(chats::delete_chat))
        .route("/messages", post(messages::send_message).get(messages::list_messages))
        .route("/messages/{message_id}", delete(messages::delete_message))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page_id")]
    pub page_id: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

pub(crate) fn default_page_id() -> u32 {
    1
}

pub(crate) fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

impl PageQuery {
    pub fn page(&self) -> Result<Page, ApiError> {
        Ok(Page::new(self.page_id, self.page_size)?)
    }
}

/// Run blocking store work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.to_string())
    })?
}

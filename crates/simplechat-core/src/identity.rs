use std::sync::Arc;

use simplechat_db::Database;
use simplechat_types::models::{User, UserId};

use crate::error::{CoreError, Result};

/// Turns a verified caller identity into a stored user, and looks users up for
/// the other managers.
#[derive(Clone)]
pub struct IdentityResolver {
    db: Arc<Database>,
}

impl IdentityResolver {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Resolve the subject of an authenticated token. A token for a user that no
    /// longer exists, or whose username does not match, does not authenticate.
    pub fn resolve(&self, id: UserId, username: &str) -> Result<User> {
        match self.db.get_user_by_id(id)? {
            Some(row) if row.username == username => Ok(row.into_user()?),
            _ => Err(CoreError::Unauthenticated(format!(
                "token subject {id} ({username}) is not a known user"
            ))),
        }
    }

    pub fn user(&self, id: UserId) -> Result<User> {
        self.db
            .get_user_by_id(id)?
            .ok_or_else(|| CoreError::not_found("user", id))?
            .into_user()
            .map_err(Into::into)
    }

    pub fn user_by_username(&self, username: &str) -> Result<User> {
        self.db
            .get_user_by_username(username)?
            .ok_or_else(|| CoreError::not_found("user", username))?
            .into_user()
            .map_err(Into::into)
    }
}

use std::sync::Arc;

use simplechat_db::queries::NewUser;
use simplechat_db::{Database, StoreError};
use simplechat_types::models::{User, UserId};
use simplechat_types::page::Page;
use tracing::info;

use crate::error::{CoreError, Result};

pub const MIN_PASSWORD_LEN: usize = 6;
const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;

/// A registration whose password has already been hashed.
pub struct NewAccount<'a> {
    pub full_name: &'a str,
    pub username: &'a str,
    pub email: Option<&'a str>,
    pub hash_pass: &'a str,
}

/// Registration and profile lookups.
#[derive(Clone)]
pub struct Accounts {
    db: Arc<Database>,
}

impl Accounts {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn register(&self, account: &NewAccount<'_>) -> Result<User> {
        validate_username(account.username)?;
        if account.full_name.trim().is_empty() {
            return Err(CoreError::InvalidOperation("full name must not be empty".into()));
        }
        let email = account.email.map(str::trim).filter(|e| !e.is_empty());
        if let Some(email) = email {
            if !email.contains('@') {
                return Err(CoreError::InvalidOperation(format!("invalid email '{email}'")));
            }
        }

        let row = self
            .db
            .create_user(&NewUser {
                username: account.username,
                full_name: account.full_name.trim(),
                email,
                avatar_url: None,
                hash_pass: account.hash_pass,
            })
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => CoreError::Conflict(format!(
                    "username '{}' is already taken",
                    account.username
                )),
                other => other.into(),
            })?;

        info!(user_id = row.id, username = %row.username, "User registered");
        Ok(row.into_user()?)
    }

    /// The stored user plus its credential hash, for password verification.
    pub fn credentials(&self, username: &str) -> Result<(User, String)> {
        let row = self
            .db
            .get_user_by_username(username)?
            .ok_or_else(|| CoreError::not_found("user", username))?;
        let hash = row.hash_pass.clone();
        Ok((row.into_user()?, hash))
    }

    pub fn record_login(&self, id: UserId) -> Result<User> {
        self.db
            .record_login(id)?
            .ok_or_else(|| CoreError::not_found("user", id))?
            .into_user()
            .map_err(Into::into)
    }

    pub fn list_users(&self, page: Page) -> Result<Vec<User>> {
        self.db
            .list_users(page.limit(), page.offset())?
            .into_iter()
            .map(|row| row.into_user().map_err(Into::into))
            .collect()
    }
}

pub fn validate_username(username: &str) -> Result<()> {
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !USERNAME_LEN.contains(&username.len()) || !valid_chars {
        return Err(CoreError::InvalidOperation(format!(
            "username '{username}' must be 3-32 characters of letters, digits, '.', '_' or '-'"
        )));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CoreError::InvalidOperation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

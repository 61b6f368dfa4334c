//! Database row types. These map directly to SQLite rows and are converted into
//! the `simplechat-types` models at the store boundary.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::Row;

use simplechat_types::models::{
    Chat, ChatId, Contact, ContactId, ContactStatus, Message, MessageId, User, UserId, UserPair,
};

use crate::StoreError;

/// Current time at the precision the store keeps (microseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339, so text order is time order.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid timestamp '{s}': {e}")))
}

fn parse_opt_ts(s: Option<&str>) -> Result<Option<DateTime<Utc>>, StoreError> {
    s.map(parse_ts).transpose()
}

#[derive(Debug)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub hash_pass: String,
    pub created_at: String,
    pub password_changed_at: String,
    pub last_login_at: Option<String>,
}

impl UserRow {
    pub(crate) const COLUMNS: &'static str = "id, username, full_name, email, avatar_url, hash_pass, created_at, password_changed_at, last_login_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            full_name: row.get(2)?,
            email: row.get(3)?,
            avatar_url: row.get(4)?,
            hash_pass: row.get(5)?,
            created_at: row.get(6)?,
            password_changed_at: row.get(7)?,
            last_login_at: row.get(8)?,
        })
    }

    /// Public model; drops the credential hash.
    pub fn into_user(self) -> Result<User, StoreError> {
        Ok(User {
            id: UserId(self.id),
            username: self.username,
            full_name: self.full_name,
            email: self.email,
            avatar_url: self.avatar_url,
            created_at: parse_ts(&self.created_at)?,
            password_changed_at: parse_ts(&self.password_changed_at)?,
            last_login_at: parse_opt_ts(self.last_login_at.as_deref())?,
        })
    }
}

#[derive(Debug)]
pub struct ContactRow {
    pub id: i64,
    pub requester_id: i64,
    pub addressee_id: i64,
    pub status: String,
    pub requested_at: String,
    pub accepted_at: Option<String>,
}

impl ContactRow {
    pub(crate) const COLUMNS: &'static str =
        "id, requester_id, addressee_id, status, requested_at, accepted_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            requester_id: row.get(1)?,
            addressee_id: row.get(2)?,
            status: row.get(3)?,
            requested_at: row.get(4)?,
            accepted_at: row.get(5)?,
        })
    }

    pub fn into_contact(self) -> Result<Contact, StoreError> {
        let status: ContactStatus = self.status.parse().map_err(StoreError::Corrupt)?;
        Ok(Contact {
            id: ContactId(self.id),
            requester_id: UserId(self.requester_id),
            addressee_id: UserId(self.addressee_id),
            status,
            requested_at: parse_ts(&self.requested_at)?,
            accepted_at: parse_opt_ts(self.accepted_at.as_deref())?,
        })
    }
}

#[derive(Debug)]
pub struct ChatRow {
    pub id: i64,
    pub contact_id: i64,
    pub user_low: i64,
    pub user_high: i64,
    pub last_message_received_at: Option<String>,
}

impl ChatRow {
    pub(crate) const COLUMNS: &'static str =
        "id, contact_id, user_low, user_high, last_message_received_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            contact_id: row.get(1)?,
            user_low: row.get(2)?,
            user_high: row.get(3)?,
            last_message_received_at: row.get(4)?,
        })
    }

    pub fn into_chat(self) -> Result<Chat, StoreError> {
        Ok(Chat {
            id: ChatId(self.id),
            contact_id: ContactId(self.contact_id),
            participants: UserPair::new(UserId(self.user_low), UserId(self.user_high)),
            last_message_received_at: parse_opt_ts(self.last_message_received_at.as_deref())?,
        })
    }
}

#[derive(Debug)]
pub struct MessageRow {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub body: String,
    pub sent_at: String,
}

impl MessageRow {
    pub(crate) const COLUMNS: &'static str = "id, chat_id, sender_id, recipient_id, body, sent_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            sender_id: row.get(2)?,
            recipient_id: row.get(3)?,
            body: row.get(4)?,
            sent_at: row.get(5)?,
        })
    }

    pub fn into_message(self) -> Result<Message, StoreError> {
        Ok(Message {
            id: MessageId(self.id),
            chat_id: ChatId(self.chat_id),
            sender_id: UserId(self.sender_id),
            recipient_id: UserId(self.recipient_id),
            body: self.body,
            sent_at: parse_ts(&self.sent_at)?,
        })
    }
}

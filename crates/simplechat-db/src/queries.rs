use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, params};
use tracing::debug;

use simplechat_types::models::{ChatId, ContactId, ContactStatus, MessageId, UserId, UserPair};

use crate::models::{ChatRow, ContactRow, MessageRow, UserRow, format_ts, now, parse_ts};
use crate::{Database, StoreError};

/// Fields for a new `users` row. The password is already hashed.
pub struct NewUser<'a> {
    pub username: &'a str,
    pub full_name: &'a str,
    pub email: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
    pub hash_pass: &'a str,
}

/// Outcome of [`Database::append_message`].
#[derive(Debug)]
pub enum Append {
    Sent(MessageRow),
    NoChat,
    /// The chat's contact is no longer Accepted; carries its current status.
    ReadOnly(String),
}

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<UserRow, StoreError> {
        let created_at = format_ts(&now());
        self.with_tx(|tx| {
            let sql = format!(
                "INSERT INTO users (username, full_name, email, avatar_url, hash_pass, created_at, password_changed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 RETURNING {}",
                UserRow::COLUMNS
            );
            let row = tx.query_row(
                &sql,
                params![
                    user.username,
                    user.full_name,
                    user.email,
                    user.avatar_url,
                    user.hash_pass,
                    created_at
                ],
                UserRow::from_row,
            )?;
            Ok(row)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users WHERE username = ?1", UserRow::COLUMNS);
            conn.query_row(&sql, [username], UserRow::from_row).optional()
        })
    }

    pub fn get_user_by_id(&self, id: UserId) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<UserRow>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users ORDER BY id LIMIT ?1 OFFSET ?2",
                UserRow::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![limit, offset], UserRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Stamp `last_login_at`. Returns the updated row, `None` if the user is gone.
    pub fn record_login(&self, id: UserId) -> Result<Option<UserRow>, StoreError> {
        let at = format_ts(&now());
        self.with_tx(|tx| {
            tx.execute(
                "UPDATE users SET last_login_at = ?2 WHERE id = ?1",
                params![id.0, at],
            )?;
            query_user_by_id(tx, id)
        })
    }

    // -- Contacts --

    /// Insert a Pending contact. A second row for the same unordered pair fails
    /// with `StoreError::UniqueViolation` from the `ux_contacts_pair` index.
    pub fn insert_contact(
        &self,
        requester: UserId,
        addressee: UserId,
    ) -> Result<ContactRow, StoreError> {
        let requested_at = format_ts(&now());
        self.with_tx(|tx| {
            let sql = format!(
                "INSERT INTO contacts (requester_id, addressee_id, status, requested_at)
                 VALUES (?1, ?2, 'Pending', ?3)
                 RETURNING {}",
                ContactRow::COLUMNS
            );
            let row = tx.query_row(
                &sql,
                params![requester.0, addressee.0, requested_at],
                ContactRow::from_row,
            )?;
            debug!(contact_id = row.id, requester = requester.0, addressee = addressee.0, "Contact requested");
            Ok(row)
        })
    }

    pub fn get_contact(&self, id: ContactId) -> Result<Option<ContactRow>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM contacts WHERE id = ?1", ContactRow::COLUMNS);
            conn.query_row(&sql, [id.0], ContactRow::from_row).optional()
        })
    }

    pub fn find_contact_between(&self, pair: UserPair) -> Result<Option<ContactRow>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM contacts
                 WHERE min(requester_id, addressee_id) = ?1 AND max(requester_id, addressee_id) = ?2",
                ContactRow::COLUMNS
            );
            conn.query_row(&sql, [pair.low().0, pair.high().0], ContactRow::from_row)
                .optional()
        })
    }

    /// Compare-and-set the status of a contact. Only applies if the row is still in
    /// `expected`; returns `None` when it is not (missing, or changed concurrently).
    /// `accepted_at` is set when moving to Accepted and cleared otherwise.
    pub fn transition_contact(
        &self,
        id: ContactId,
        expected: ContactStatus,
        next: ContactStatus,
    ) -> Result<Option<ContactRow>, StoreError> {
        let accepted_at = (next == ContactStatus::Accepted).then(|| format_ts(&now()));
        self.with_tx(|tx| {
            let sql = format!(
                "UPDATE contacts SET status = ?3, accepted_at = ?4
                 WHERE id = ?1 AND status = ?2
                 RETURNING {}",
                ContactRow::COLUMNS
            );
            let row = tx
                .query_row(
                    &sql,
                    params![id.0, expected.as_str(), next.as_str(), accepted_at],
                    ContactRow::from_row,
                )
                .optional()?;
            if row.is_some() {
                debug!(contact_id = id.0, from = %expected, to = %next, "Contact status changed");
            }
            Ok(row)
        })
    }

    /// Contacts where `user` is either side, oldest first.
    pub fn list_contacts(
        &self,
        user: UserId,
        status: Option<ContactStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ContactRow>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM contacts
                 WHERE (requester_id = ?1 OR addressee_id = ?1)
                   AND (?2 IS NULL OR status = ?2)
                 ORDER BY id
                 LIMIT ?3 OFFSET ?4",
                ContactRow::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![user.0, status.map(|s| s.as_str()), limit, offset],
                    ContactRow::from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Chats --

    /// Open the chat for an Accepted contact. The status is re-checked inside the
    /// insert itself, so `None` means the contact is missing or not Accepted at
    /// commit time. A second chat for the same pair fails with
    /// `StoreError::UniqueViolation`.
    pub fn insert_chat_for_contact(&self, contact_id: ContactId) -> Result<Option<ChatRow>, StoreError> {
        self.with_tx(|tx| {
            let sql = format!(
                "INSERT INTO chats (contact_id, user_low, user_high)
                 SELECT id, min(requester_id, addressee_id), max(requester_id, addressee_id)
                 FROM contacts
                 WHERE id = ?1 AND status = 'Accepted'
                 RETURNING {}",
                ChatRow::COLUMNS
            );
            let row = tx.query_row(&sql, [contact_id.0], ChatRow::from_row).optional()?;
            if let Some(chat) = &row {
                debug!(chat_id = chat.id, contact_id = contact_id.0, "Chat created");
            }
            Ok(row)
        })
    }

    pub fn get_chat(&self, id: ChatId) -> Result<Option<ChatRow>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM chats WHERE id = ?1", ChatRow::COLUMNS);
            conn.query_row(&sql, [id.0], ChatRow::from_row).optional()
        })
    }

    pub fn get_chat_by_pair(&self, pair: UserPair) -> Result<Option<ChatRow>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM chats WHERE user_low = ?1 AND user_high = ?2",
                ChatRow::COLUMNS
            );
            conn.query_row(&sql, [pair.low().0, pair.high().0], ChatRow::from_row)
                .optional()
        })
    }

    /// Chats `user` takes part in, least recently active first (empty chats lead).
    pub fn list_chats(&self, user: UserId, limit: i64, offset: i64) -> Result<Vec<ChatRow>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM chats
                 WHERE user_low = ?1 OR user_high = ?1
                 ORDER BY last_message_received_at ASC NULLS FIRST, id ASC
                 LIMIT ?2 OFFSET ?3",
                ChatRow::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![user.0, limit, offset], ChatRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Delete a chat. Returns `false` if it did not exist. Fails with
    /// `StoreError::ForeignKeyViolation` while any message still references it.
    pub fn delete_chat(&self, id: ChatId) -> Result<bool, StoreError> {
        self.with_tx(|tx| {
            let deleted = tx.execute("DELETE FROM chats WHERE id = ?1", [id.0])?;
            Ok(deleted > 0)
        })
    }

    // -- Messages --

    /// Append a message and advance the chat's watermark in one transaction.
    ///
    /// `sent_at` is assigned here from the server clock, clamped so that it is
    /// strictly after the chat's current watermark. The chat's contact must
    /// still be Accepted when the transaction runs; otherwise nothing is written.
    pub fn append_message(
        &self,
        chat_id: ChatId,
        sender: UserId,
        recipient: UserId,
        body: &str,
    ) -> Result<Append, StoreError> {
        self.with_tx(|tx| {
            let chat: Option<(Option<String>, String)> = tx
                .query_row(
                    "SELECT c.last_message_received_at, k.status
                     FROM chats c JOIN contacts k ON k.id = c.contact_id
                     WHERE c.id = ?1",
                    [chat_id.0],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((watermark, contact_status)) = chat else {
                return Ok(Append::NoChat);
            };
            if contact_status != ContactStatus::Accepted.as_str() {
                return Ok(Append::ReadOnly(contact_status));
            }

            let watermark = watermark.as_deref().map(parse_ts).transpose()?;
            let sent_at = format_ts(&next_sent_at(now(), watermark));

            let sql = format!(
                "INSERT INTO messages (chat_id, sender_id, recipient_id, body, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING {}",
                MessageRow::COLUMNS
            );
            let row = tx.query_row(
                &sql,
                params![chat_id.0, sender.0, recipient.0, body, sent_at],
                MessageRow::from_row,
            )?;

            tx.execute(
                "UPDATE chats SET last_message_received_at = ?2 WHERE id = ?1",
                params![chat_id.0, sent_at],
            )?;

            Ok(Append::Sent(row))
        })
    }

    pub fn get_message(&self, id: MessageId) -> Result<Option<MessageRow>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM messages WHERE id = ?1", MessageRow::COLUMNS);
            conn.query_row(&sql, [id.0], MessageRow::from_row).optional()
        })
    }

    /// Messages of a chat in send order.
    pub fn list_messages(&self, chat_id: ChatId, limit: i64, offset: i64) -> Result<Vec<MessageRow>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages
                 WHERE chat_id = ?1
                 ORDER BY sent_at ASC, id ASC
                 LIMIT ?2 OFFSET ?3",
                MessageRow::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![chat_id.0, limit, offset], MessageRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Delete one message and rewind the chat's watermark to the newest message
    /// left (or NULL). Returns `false` if the message did not exist.
    pub fn delete_message(&self, id: MessageId) -> Result<bool, StoreError> {
        self.with_tx(|tx| {
            let chat_id: Option<i64> = tx
                .query_row("SELECT chat_id FROM messages WHERE id = ?1", [id.0], |row| row.get(0))
                .optional()?;
            let Some(chat_id) = chat_id else {
                return Ok(false);
            };

            tx.execute("DELETE FROM messages WHERE id = ?1", [id.0])?;
            tx.execute(
                "UPDATE chats
                 SET last_message_received_at = (SELECT MAX(sent_at) FROM messages WHERE chat_id = ?1)
                 WHERE id = ?1",
                [chat_id],
            )?;
            Ok(true)
        })
    }
}

fn query_user_by_id(conn: &Connection, id: UserId) -> Result<Option<UserRow>, StoreError> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", UserRow::COLUMNS);
    conn.query_row(&sql, [id.0], UserRow::from_row).optional()
}

/// Timestamp for the next message of a chat: the server clock, unless that would
/// not move past the current watermark.
pub(crate) fn next_sent_at(now: DateTime<Utc>, watermark: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match watermark {
        Some(wm) if now <= wm => wm + Duration::microseconds(1),
        _ => now,
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, StoreError>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, StoreError> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

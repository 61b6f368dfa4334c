use std::sync::Arc;

use simplechat_db::Database;
use simplechat_db::queries::Append;
use simplechat_types::models::{ChatId, Message, MessageId, UserId};
use simplechat_types::page::Page;
use tracing::debug;

use crate::chats::ChatManager;
use crate::error::{CoreError, Result};
use crate::policy;

pub const MAX_BODY_CHARS: usize = 4096;

/// Appends messages to chats and keeps each chat's watermark in step with its
/// newest message.
#[derive(Clone)]
pub struct MessageCoordinator {
    db: Arc<Database>,
    chats: ChatManager,
}

impl MessageCoordinator {
    pub fn new(db: Arc<Database>, chats: ChatManager) -> Self {
        Self { db, chats }
    }

    /// Send `body` from `caller` to the other participant of the chat.
    ///
    /// The message insert and the watermark update commit together; the
    /// message's `sent_at` is always later than the chat's previous watermark.
    /// The contact status is checked inside the same transaction, so a chat
    /// whose contact was rejected concurrently never receives the message.
    pub fn send(&self, caller: UserId, chat_id: ChatId, body: &str) -> Result<Message> {
        let chat = self.chats.load(chat_id)?;
        policy::ensure_participant(caller, &chat, &format!("chat {chat_id}"))?;

        if body.trim().is_empty() {
            return Err(CoreError::InvalidOperation("message body must not be empty".into()));
        }
        if body.chars().count() > MAX_BODY_CHARS {
            return Err(CoreError::InvalidOperation(format!(
                "message body exceeds {MAX_BODY_CHARS} characters"
            )));
        }

        let recipient = chat.participants.other(caller).ok_or_else(|| {
            CoreError::Forbidden(format!("user {caller} is not a participant of chat {chat_id}"))
        })?;

        let message = match self.db.append_message(chat_id, caller, recipient, body)? {
            Append::Sent(row) => row.into_message()?,
            Append::NoChat => return Err(CoreError::not_found("chat", chat_id)),
            Append::ReadOnly(status) => {
                return Err(CoreError::InvalidOperation(format!(
                    "chat {chat_id} is read-only while contact {} is {status}",
                    chat.contact_id
                )));
            }
        };

        debug!(message_id = %message.id, chat_id = %chat_id, sender = %caller, "Message sent");
        Ok(message)
    }

    /// Messages of a chat, oldest first.
    pub fn list(&self, caller: UserId, chat_id: ChatId, page: Page) -> Result<Vec<Message>> {
        let chat = self.chats.load(chat_id)?;
        policy::ensure_participant(caller, &chat, &format!("chat {chat_id}"))?;

        self.db
            .list_messages(chat_id, page.limit(), page.offset())?
            .into_iter()
            .map(|row| row.into_message().map_err(Into::into))
            .collect()
    }

    /// Delete a single message. Only its sender may do so; the chat watermark
    /// falls back to the newest remaining message.
    pub fn delete(&self, caller: UserId, id: MessageId) -> Result<()> {
        let message = self
            .db
            .get_message(id)?
            .ok_or_else(|| CoreError::not_found("message", id))?
            .into_message()?;

        policy::ensure_participant(caller, &message, &format!("message {id}"))?;
        if message.sender_id != caller {
            return Err(CoreError::Forbidden(format!(
                "only the sender can delete message {id}"
            )));
        }

        if !self.db.delete_message(id)? {
            return Err(CoreError::not_found("message", id));
        }
        debug!(message_id = %id, chat_id = %message.chat_id, "Message deleted");
        Ok(())
    }
}

use std::sync::Arc;

use simplechat_db::{Database, StoreError};
use simplechat_types::models::{Chat, ChatId, ContactId, ContactStatus, UserId, UserPair};
use simplechat_types::page::Page;
use tracing::info;

use crate::contacts::ContactManager;
use crate::error::{CoreError, Result};
use crate::identity::IdentityResolver;
use crate::policy;

/// Guarantees one chat per accepted pair of contacts.
#[derive(Clone)]
pub struct ChatManager {
    db: Arc<Database>,
    contacts: ContactManager,
    identity: IdentityResolver,
}

impl ChatManager {
    pub fn new(db: Arc<Database>, contacts: ContactManager) -> Self {
        Self {
            identity: IdentityResolver::new(db.clone()),
            db,
            contacts,
        }
    }

    /// Open the chat for an accepted contact. Creating it a second time is a
    /// `Conflict`; the existing chat is never handed back.
    pub fn create(&self, caller: UserId, contact_id: ContactId) -> Result<Chat> {
        let contact = self.contacts.load(contact_id)?;
        policy::ensure_participant(caller, &contact, &format!("contact {contact_id}"))?;
        if contact.status != ContactStatus::Accepted {
            return Err(not_accepted(contact_id, contact.status));
        }
        if let Some(existing) = self.db.get_chat_by_pair(contact.pair())? {
            return Err(CoreError::Conflict(format!(
                "chat {} already exists for contact {contact_id}",
                existing.id
            )));
        }

        let row = match self.db.insert_chat_for_contact(contact_id) {
            Ok(Some(row)) => row,
            Ok(None) => {
                // Answered again between the read above and the insert
                let now = self.contacts.load(contact_id)?;
                return Err(not_accepted(contact_id, now.status));
            }
            Err(StoreError::UniqueViolation(_)) => {
                return Err(CoreError::Conflict(format!(
                    "a chat already exists for contact {contact_id}"
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let chat = row.into_chat()?;
        info!(chat_id = %chat.id, contact_id = %contact_id, caller = %caller, "Chat created");
        Ok(chat)
    }

    pub fn get(&self, caller: UserId, id: ChatId) -> Result<Chat> {
        let chat = self.load(id)?;
        policy::ensure_participant(caller, &chat, &format!("chat {id}"))?;
        Ok(chat)
    }

    /// The chat between `caller` and the user named `other`.
    pub fn find_with(&self, caller: UserId, other: &str) -> Result<Chat> {
        let other = self.identity.user_by_username(other)?;
        let pair = UserPair::new(caller, other.id);
        self.db
            .get_chat_by_pair(pair)?
            .ok_or_else(|| CoreError::not_found("chat with", &other.username))?
            .into_chat()
            .map_err(Into::into)
    }

    /// Chats `user` takes part in, least recently active first; empty chats lead.
    pub fn list(&self, user: UserId, page: Page) -> Result<Vec<Chat>> {
        self.db
            .list_chats(user, page.limit(), page.offset())?
            .into_iter()
            .map(|row| row.into_chat().map_err(Into::into))
            .collect()
    }

    /// Delete an empty chat. The foreign key from messages decides whether the
    /// chat is empty.
    pub fn delete(&self, caller: UserId, id: ChatId) -> Result<()> {
        let chat = self.load(id)?;
        policy::ensure_participant(caller, &chat, &format!("chat {id}"))?;

        match self.db.delete_chat(id) {
            Ok(true) => {
                info!(chat_id = %id, caller = %caller, "Chat deleted");
                Ok(())
            }
            Ok(false) => Err(CoreError::not_found("chat", id)),
            Err(StoreError::ForeignKeyViolation) => Err(CoreError::Conflict(format!(
                "chat {id} still has messages"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn load(&self, id: ChatId) -> Result<Chat> {
        self.db
            .get_chat(id)?
            .ok_or_else(|| CoreError::not_found("chat", id))?
            .into_chat()
            .map_err(Into::into)
    }
}

fn not_accepted(contact_id: ContactId, status: ContactStatus) -> CoreError {
    CoreError::InvalidOperation(format!(
        "contact {contact_id} is {status}, a chat needs an Accepted contact"
    ))
}

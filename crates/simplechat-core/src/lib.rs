//! Relationship and conversation consistency engine.
//!
//! Contact requests, the one-chat-per-pair rule and per-chat message ordering.
//! Every operation takes the caller's user id and returns either the entity or
//! a [`CoreError`] whose [`ErrorKind`] the boundary layer maps to a response.
//! All shared state lives in the SQLite store; operations that must be atomic
//! run inside a single store transaction.

pub mod accounts;
pub mod chats;
pub mod contacts;
pub mod error;
pub mod identity;
pub mod messages;
pub mod policy;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use simplechat_db::Database;

pub use accounts::Accounts;
pub use chats::ChatManager;
pub use contacts::ContactManager;
pub use error::{CoreError, ErrorKind, Result};
pub use identity::IdentityResolver;
pub use messages::MessageCoordinator;
pub use policy::ContactPolicy;

/// All managers over one store. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    pub identity: IdentityResolver,
    pub accounts: Accounts,
    pub contacts: ContactManager,
    pub chats: ChatManager,
    pub messages: MessageCoordinator,
}

impl Engine {
    pub fn new(db: Arc<Database>, policy: ContactPolicy) -> Self {
        let contacts = ContactManager::new(db.clone(), policy);
        let chats = ChatManager::new(db.clone(), contacts.clone());
        let messages = MessageCoordinator::new(db.clone(), chats.clone());
        Self {
            identity: IdentityResolver::new(db.clone()),
            accounts: Accounts::new(db),
            contacts,
            chats,
            messages,
        }
    }
}

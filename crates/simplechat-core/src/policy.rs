//! Access checks shared by the contact, chat and message managers.
//!
//! Everything here is a pure function of its arguments: a user may act on a
//! contact, chat or message only if they are one of its two participants, and
//! only the addressee of a contact request may accept or reject it.

use simplechat_types::models::{Chat, Contact, ContactStatus, Message, UserId, UserPair};

use crate::error::{CoreError, Result};

/// Anything that belongs to exactly two users.
pub trait Participants {
    fn participants(&self) -> UserPair;
}

impl Participants for Contact {
    fn participants(&self) -> UserPair {
        self.pair()
    }
}

impl Participants for Chat {
    fn participants(&self) -> UserPair {
        self.participants
    }
}

impl Participants for Message {
    fn participants(&self) -> UserPair {
        UserPair::new(self.sender_id, self.recipient_id)
    }
}

impl Participants for UserPair {
    fn participants(&self) -> UserPair {
        *self
    }
}

pub fn is_participant<R: Participants + ?Sized>(user: UserId, resource: &R) -> bool {
    resource.participants().contains(user)
}

pub fn is_addressee(user: UserId, contact: &Contact) -> bool {
    contact.addressee_id == user
}

pub fn ensure_participant<R: Participants + ?Sized>(
    user: UserId,
    resource: &R,
    what: &str,
) -> Result<()> {
    if is_participant(user, resource) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "user {user} is not a participant of {what}"
        )))
    }
}

pub fn ensure_addressee(user: UserId, contact: &Contact) -> Result<()> {
    if is_addressee(user, contact) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "only the addressee of contact {} can answer it",
            contact.id
        )))
    }
}

/// Rules for answering a contact request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactPolicy {
    /// Whether a Rejected request may later be Accepted. When false, Rejected is terminal.
    pub allow_accept_after_reject: bool,
}

impl Default for ContactPolicy {
    fn default() -> Self {
        Self {
            allow_accept_after_reject: true,
        }
    }
}

impl ContactPolicy {
    /// Check that `contact` may move from its current status to `to`.
    pub fn check_transition(&self, contact: &Contact, to: ContactStatus) -> Result<()> {
        use ContactStatus::*;

        match (contact.status, to) {
            (from, to) if from == to => Err(CoreError::Conflict(format!(
                "contact {} is already {}",
                contact.id, to
            ))),
            (Rejected, Accepted) if !self.allow_accept_after_reject => Err(CoreError::Conflict(
                format!("contact {} was rejected and cannot be accepted", contact.id),
            )),
            (_, Pending) => Err(CoreError::InvalidOperation(format!(
                "contact {} cannot return to Pending",
                contact.id
            ))),
            _ => Ok(()),
        }
    }
}

use std::sync::Arc;

use simplechat_db::{Database, StoreError};
use simplechat_types::models::{Contact, ContactId, ContactStatus, UserId, UserPair};
use simplechat_types::page::Page;
use tracing::info;

use crate::error::{CoreError, Result};
use crate::identity::IdentityResolver;
use crate::policy::{self, ContactPolicy};

/// Owns the contact request state machine:
///
/// ```text
/// Pending ──accept──▶ Accepted
///    │                  ▲   │
///    └──reject──▶ Rejected ◀┘   (Rejected ─▶ Accepted only if the policy allows it)
/// ```
///
/// Only the addressee answers a request. A pair of users has at most one
/// relationship, whichever of them asked first.
#[derive(Clone)]
pub struct ContactManager {
    db: Arc<Database>,
    identity: IdentityResolver,
    policy: ContactPolicy,
}

impl ContactManager {
    pub fn new(db: Arc<Database>, policy: ContactPolicy) -> Self {
        Self {
            identity: IdentityResolver::new(db.clone()),
            db,
            policy,
        }
    }

    pub fn policy(&self) -> ContactPolicy {
        self.policy
    }

    /// Send a contact request from `requester` to the user named `addressee`.
    pub fn request(&self, requester: UserId, addressee: &str) -> Result<Contact> {
        let addressee = self.identity.user_by_username(addressee)?;
        if addressee.id == requester {
            return Err(CoreError::InvalidOperation(
                "a user cannot add themselves as a contact".into(),
            ));
        }

        let pair = UserPair::new(requester, addressee.id);
        if let Some(existing) = self.db.find_contact_between(pair)? {
            return Err(pair_conflict(requester, addressee.id, Some(ContactId(existing.id))));
        }

        // The pre-check above only gives a friendlier message; the pair index
        // decides between concurrent requests.
        let row = self
            .db
            .insert_contact(requester, addressee.id)
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => pair_conflict(requester, addressee.id, None),
                other => other.into(),
            })?;

        let contact = row.into_contact()?;
        info!(
            contact_id = %contact.id,
            requester = %requester,
            addressee = %addressee.id,
            "Contact request created"
        );
        Ok(contact)
    }

    pub fn accept(&self, caller: UserId, id: ContactId) -> Result<Contact> {
        self.answer(caller, id, ContactStatus::Accepted)
    }

    pub fn reject(&self, caller: UserId, id: ContactId) -> Result<Contact> {
        self.answer(caller, id, ContactStatus::Rejected)
    }

    pub fn get(&self, caller: UserId, id: ContactId) -> Result<Contact> {
        let contact = self.load(id)?;
        policy::ensure_participant(caller, &contact, &format!("contact {id}"))?;
        Ok(contact)
    }

    /// Contacts `user` takes part in, by id ascending, optionally filtered by status.
    pub fn list(&self, user: UserId, status: Option<ContactStatus>, page: Page) -> Result<Vec<Contact>> {
        self.db
            .list_contacts(user, status, page.limit(), page.offset())?
            .into_iter()
            .map(|row| row.into_contact().map_err(Into::into))
            .collect()
    }

    pub(crate) fn load(&self, id: ContactId) -> Result<Contact> {
        self.db
            .get_contact(id)?
            .ok_or_else(|| CoreError::not_found("contact", id))?
            .into_contact()
            .map_err(Into::into)
    }

    fn answer(&self, caller: UserId, id: ContactId, to: ContactStatus) -> Result<Contact> {
        let contact = self.load(id)?;
        policy::ensure_addressee(caller, &contact)?;
        self.policy.check_transition(&contact, to)?;

        let updated = self
            .db
            .transition_contact(id, contact.status, to)?
            .ok_or_else(|| {
                CoreError::Conflict(format!(
                    "contact {id} changed while it was being answered"
                ))
            })?
            .into_contact()?;

        info!(contact_id = %id, from = %contact.status, to = %updated.status, "Contact answered");
        Ok(updated)
    }
}

fn pair_conflict(a: UserId, b: UserId, existing: Option<ContactId>) -> CoreError {
    match existing {
        Some(id) => CoreError::Conflict(format!(
            "users {a} and {b} already have a contact relationship ({id})"
        )),
        None => CoreError::Conflict(format!(
            "users {a} and {b} already have a contact relationship"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::TestEngine;

    #[test]
    fn request_creates_pending_with_fixed_orientation() {
        let t = TestEngine::new();
        let alice = t.user("alice");
        let bob = t.user("bob");

        let contact = t.engine.contacts.request(alice.id, "bob").unwrap();
        assert_eq!(contact.status, ContactStatus::Pending);
        assert_eq!(contact.requester_id, alice.id);
        assert_eq!(contact.addressee_id, bob.id);
        assert!(contact.accepted_at.is_none());
    }

    #[test]
    fn request_errors() {
        let t = TestEngine::new();
        let alice = t.user("alice");
        let bob = t.user("bob");

        let err = t.engine.contacts.request(alice.id, "nobody").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = t.engine.contacts.request(alice.id, "alice").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);

        t.engine.contacts.request(alice.id, "bob").unwrap();
        let err = t.engine.contacts.request(alice.id, "bob").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // The reverse direction is the same relationship
        let err = t.engine.contacts.request(bob.id, "alice").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn existing_relationship_conflicts_regardless_of_status() {
        let t = TestEngine::new();
        let alice = t.user("alice");
        let bob = t.user("bob");

        let contact = t.engine.contacts.request(alice.id, "bob").unwrap();
        t.engine.contacts.reject(bob.id, contact.id).unwrap();

        let err = t.engine.contacts.request(alice.id, "bob").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn only_the_addressee_answers() {
        let t = TestEngine::new();
        let alice = t.user("alice");
        t.user("bob");
        let carol = t.user("carol");

        let contact = t.engine.contacts.request(alice.id, "bob").unwrap();
        for caller in [alice.id, carol.id] {
            assert_eq!(
                t.engine.contacts.accept(caller, contact.id).unwrap_err().kind(),
                ErrorKind::Forbidden
            );
            assert_eq!(
                t.engine.contacts.reject(caller, contact.id).unwrap_err().kind(),
                ErrorKind::Forbidden
            );
        }

        let err = t.engine.contacts.accept(alice.id, ContactId(999)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn accept_and_reject_transitions() {
        let t = TestEngine::new();
        let alice = t.user("alice");
        let bob = t.user("bob");
        let contact = t.engine.contacts.request(alice.id, "bob").unwrap();

        let accepted = t.engine.contacts.accept(bob.id, contact.id).unwrap();
        assert_eq!(accepted.status, ContactStatus::Accepted);
        assert!(accepted.accepted_at.is_some());
        assert_eq!(
            t.engine.contacts.accept(bob.id, contact.id).unwrap_err().kind(),
            ErrorKind::Conflict
        );

        let rejected = t.engine.contacts.reject(bob.id, contact.id).unwrap();
        assert_eq!(rejected.status, ContactStatus::Rejected);
        assert!(rejected.accepted_at.is_none());

        // Rejecting twice is a failure, not a silent success
        assert_eq!(
            t.engine.contacts.reject(bob.id, contact.id).unwrap_err().kind(),
            ErrorKind::Conflict
        );

        // Default policy lets a rejected request be accepted again
        let again = t.engine.contacts.accept(bob.id, contact.id).unwrap();
        assert_eq!(again.status, ContactStatus::Accepted);
    }

    #[test]
    fn strict_policy_makes_rejection_terminal() {
        let t = TestEngine::with_policy(ContactPolicy {
            allow_accept_after_reject: false,
        });
        let alice = t.user("alice");
        let bob = t.user("bob");
        let contact = t.engine.contacts.request(alice.id, "bob").unwrap();

        t.engine.contacts.reject(bob.id, contact.id).unwrap();
        let err = t.engine.contacts.accept(bob.id, contact.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn get_is_scoped_to_participants() {
        let t = TestEngine::new();
        let alice = t.user("alice");
        let bob = t.user("bob");
        let carol = t.user("carol");
        let contact = t.engine.contacts.request(alice.id, "bob").unwrap();

        assert_eq!(t.engine.contacts.get(bob.id, contact.id).unwrap(), contact);
        assert_eq!(
            t.engine.contacts.get(carol.id, contact.id).unwrap_err().kind(),
            ErrorKind::Forbidden
        );
    }

    #[test]
    fn list_filters_by_status_and_pages() {
        let t = TestEngine::new();
        let alice = t.user("alice");
        let others: Vec<_> = (0..6).map(|_| t.random_user()).collect();

        let requests: Vec<_> = others
            .iter()
            .map(|other| t.engine.contacts.request(alice.id, &other.username).unwrap())
            .collect();
        t.engine.contacts.accept(others[0].id, requests[0].id).unwrap();

        let page = Page::first(5).unwrap();
        let first = t.engine.contacts.list(alice.id, None, page).unwrap();
        let second = t.engine.contacts.list(alice.id, None, page.next()).unwrap();
        assert_eq!(first.len(), 5);
        assert_eq!(second.len(), 1);
        assert!(first.last().unwrap().id < second[0].id);

        let accepted = t
            .engine
            .contacts
            .list(alice.id, Some(ContactStatus::Accepted), page)
            .unwrap();
        assert_eq!(accepted.len(), 1);

        // Visible from the addressee's side too
        let theirs = t.engine.contacts.list(others[3].id, None, page).unwrap();
        assert_eq!(theirs.len(), 1);
        assert_eq!(theirs[0].requester_id, alice.id);
    }
}

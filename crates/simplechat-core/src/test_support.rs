use std::cell::RefCell;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use simplechat_db::Database;
use simplechat_types::models::{Chat, Contact, User};
use tempfile::TempDir;

use crate::accounts::NewAccount;
use crate::{ContactPolicy, Engine};

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

pub struct TestEngine {
    pub engine: Engine,
    rng: RefCell<StdRng>,
    _dir: TempDir,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_policy(ContactPolicy::default())
    }

    pub fn with_policy(policy: ContactPolicy) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("test.db")).unwrap());
        Self {
            engine: Engine::new(db, policy),
            rng: RefCell::new(StdRng::seed_from_u64(7)),
            _dir: dir,
        }
    }

    pub fn user(&self, username: &str) -> User {
        self.engine
            .accounts
            .register(&NewAccount {
                full_name: username,
                username,
                email: None,
                hash_pass: "hash",
            })
            .unwrap()
    }

    /// A user named like "jack.doe", drawn from this fixture's own generator.
    pub fn random_user(&self) -> User {
        let username = {
            let mut rng = self.rng.borrow_mut();
            let first = random_word(&mut *rng);
            let last = random_word(&mut *rng);
            format!("{first}.{last}")
        };
        self.user(&username)
    }

    /// Create `other` and an Accepted contact from `requester` to them.
    pub fn accepted_pair(&self, requester: &User, other: &str) -> (User, Contact) {
        let other = self.user(other);
        let contact = self.engine.contacts.request(requester.id, &other.username).unwrap();
        let contact = self.engine.contacts.accept(other.id, contact.id).unwrap();
        (other, contact)
    }

    pub fn chat_between(&self, requester: &User, other: &str) -> (User, Chat) {
        let (other, contact) = self.accepted_pair(requester, other);
        let chat = self.engine.chats.create(requester.id, contact.id).unwrap();
        (other, chat)
    }
}

fn random_word(rng: &mut impl Rng) -> String {
    let len = rng.random_range(3..=6);
    (0..len)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

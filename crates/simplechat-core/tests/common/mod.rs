#![allow(dead_code)]

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use simplechat_core::accounts::NewAccount;
use simplechat_core::{ContactPolicy, Engine};
use simplechat_db::Database;
use simplechat_types::models::User;
use tempfile::TempDir;

pub struct Harness {
    pub engine: Engine,
    pub rng: StdRng,
    _dir: TempDir,
}

impl Harness {
    pub fn new(seed: u64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("scenarios.db")).unwrap());
        Self {
            engine: Engine::new(db, ContactPolicy::default()),
            rng: StdRng::seed_from_u64(seed),
            _dir: dir,
        }
    }

    pub fn user(&mut self) -> User {
        let username = format!("{}.{}", word(&mut self.rng), word(&mut self.rng));
        self.engine
            .accounts
            .register(&NewAccount {
                full_name: &username,
                username: &username,
                email: None,
                hash_pass: "hash",
            })
            .unwrap()
    }
}

fn word(rng: &mut StdRng) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    let len = rng.random_range(3..=6);
    (0..len)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

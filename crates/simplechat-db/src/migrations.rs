use rusqlite::Connection;
use tracing::info;

use crate::StoreError;

pub fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, contacts, chats, messages)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id                  INTEGER PRIMARY KEY,
                username            TEXT NOT NULL UNIQUE,
                full_name           TEXT NOT NULL,
                email               TEXT,
                avatar_url          TEXT,
                hash_pass           TEXT NOT NULL,
                created_at          TEXT NOT NULL,
                password_changed_at TEXT NOT NULL,
                last_login_at       TEXT
            );

            CREATE TABLE contacts (
                id           INTEGER PRIMARY KEY,
                requester_id INTEGER NOT NULL REFERENCES users(id),
                addressee_id INTEGER NOT NULL REFERENCES users(id),
                status       TEXT NOT NULL DEFAULT 'Pending'
                             CHECK (status IN ('Pending', 'Accepted', 'Rejected')),
                requested_at TEXT NOT NULL,
                accepted_at  TEXT,
                CHECK (requester_id <> addressee_id),
                CHECK ((status = 'Accepted') = (accepted_at IS NOT NULL))
            );

            -- One relationship per unordered pair, whichever side asked first
            CREATE UNIQUE INDEX ux_contacts_pair
                ON contacts(min(requester_id, addressee_id), max(requester_id, addressee_id));

            CREATE INDEX idx_contacts_addressee ON contacts(addressee_id);

            CREATE TABLE chats (
                id                       INTEGER PRIMARY KEY,
                contact_id               INTEGER NOT NULL REFERENCES contacts(id),
                user_low                 INTEGER NOT NULL REFERENCES users(id),
                user_high                INTEGER NOT NULL REFERENCES users(id),
                last_message_received_at TEXT,
                CHECK (user_low < user_high),
                UNIQUE (user_low, user_high)
            );

            CREATE INDEX idx_chats_high ON chats(user_high);

            -- No ON DELETE CASCADE: a chat with messages cannot be deleted
            CREATE TABLE messages (
                id           INTEGER PRIMARY KEY,
                chat_id      INTEGER NOT NULL REFERENCES chats(id),
                sender_id    INTEGER NOT NULL REFERENCES users(id),
                recipient_id INTEGER NOT NULL REFERENCES users(id),
                body         TEXT NOT NULL CHECK (length(body) > 0),
                sent_at      TEXT NOT NULL,
                CHECK (sender_id <> recipient_id)
            );

            CREATE INDEX idx_messages_chat ON messages(chat_id, sent_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, appointments, conversations, messages)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE,
                first_name  TEXT NOT NULL,
                last_name   TEXT NOT NULL,
                role        TEXT NOT NULL CHECK (role IN ('patient', 'doctor', 'admin')),
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE doctor_profiles (
                user_id         TEXT PRIMARY KEY REFERENCES users(id),
                specialization  TEXT
            );

            CREATE TABLE appointments (
                id            TEXT PRIMARY KEY,
                patient_id    TEXT NOT NULL REFERENCES users(id),
                doctor_id     TEXT NOT NULL REFERENCES users(id),
                scheduled_at  TEXT NOT NULL,
                status        TEXT NOT NULL DEFAULT 'scheduled',
                created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_appointments_patient ON appointments(patient_id);
            CREATE INDEX idx_appointments_doctor ON appointments(doctor_id);

            CREATE TABLE conversations (
                id               TEXT PRIMARY KEY,
                patient_id       TEXT NOT NULL REFERENCES users(id),
                doctor_id        TEXT NOT NULL REFERENCES users(id),
                created_at       TEXT NOT NULL,
                last_message_at  TEXT NOT NULL,
                UNIQUE (patient_id, doctor_id)
            );

            CREATE INDEX idx_conversations_doctor ON conversations(doctor_id);

            CREATE TABLE messages (
                id               TEXT PRIMARY KEY,
                conversation_id  TEXT NOT NULL REFERENCES conversations(id),
                sender_id        TEXT NOT NULL REFERENCES users(id),
                content          TEXT NOT NULL CHECK (length(trim(content)) > 0),
                is_read          INTEGER NOT NULL DEFAULT 0,
                created_at       TEXT NOT NULL
            );

            CREATE INDEX idx_messages_conversation
                ON messages(conversation_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (notifications)");
        conn.execute_batch(
            "
            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                title       TEXT NOT NULL,
                message     TEXT NOT NULL,
                type        TEXT NOT NULL,
                action_url  TEXT,
                is_read     INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user
                ON notifications(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (2);
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
    fn rerunning_migrations_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }
}

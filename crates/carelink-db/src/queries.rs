use crate::models::{
    ContactRow, ConversationRow, ConversationSummaryRow, MessageRow, NewNotification,
    NotificationRow, UserRow,
};
use crate::{Database, now_timestamp};
use anyhow::Result;
use carelink_types::models::Role;
use rusqlite::Connection;

impl Database {
    // -- Users --
    //
    // Accounts and profiles belong to the identity service. These writes exist
    // so the tables can be provisioned locally.

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        first_name: &str,
        last_name: &str,
        role: Role,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, first_name, last_name, role) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, email, first_name, last_name, role.as_str()),
            )?;
            Ok(())
        })
    }

    pub fn set_specialization(&self, user_id: &str, specialization: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO doctor_profiles (user_id, specialization) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET specialization = excluded.specialization",
                (user_id, specialization),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    // -- Appointments --

    pub fn create_appointment(
        &self,
        id: &str,
        patient_id: &str,
        doctor_id: &str,
        scheduled_at: &str,
        status: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO appointments (id, patient_id, doctor_id, scheduled_at, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, patient_id, doctor_id, scheduled_at, status),
            )?;
            Ok(())
        })
    }

    // -- Conversations --

    /// Return the conversation for the (patient, doctor) pair, creating it
    /// with `id` if none exists. The bool is true when this call created it.
    ///
    /// The UNIQUE (patient_id, doctor_id) constraint makes the insert a no-op
    /// when another caller got there first, so racing resolvers agree on one row.
    pub fn resolve_conversation(
        &self,
        id: &str,
        patient_id: &str,
        doctor_id: &str,
    ) -> Result<(ConversationRow, bool)> {
        self.with_conn_mut(|conn| {
            let now = now_timestamp();
            let inserted = conn.execute(
                "INSERT INTO conversations (id, patient_id, doctor_id, created_at, last_message_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(patient_id, doctor_id) DO NOTHING",
                (id, patient_id, doctor_id, &now),
            )?;

            let row = conn.query_row(
                "SELECT id, patient_id, doctor_id, created_at, last_message_at
                 FROM conversations WHERE patient_id = ?1 AND doctor_id = ?2",
                (patient_id, doctor_id),
                map_conversation,
            )?;

            Ok((row, inserted == 1))
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, patient_id, doctor_id, created_at, last_message_at
                 FROM conversations WHERE id = ?1",
                [id],
                map_conversation,
            )
            .optional()
        })
    }

    /// All conversations `user_id` takes part in, most recently active first.
    pub fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT
                    c.id,
                    c.created_at,
                    c.last_message_at,
                    CASE WHEN c.patient_id = ?1 THEN c.doctor_id ELSE c.patient_id END,
                    CASE WHEN c.patient_id = ?1
                        THEN du.first_name || ' ' || du.last_name
                        ELSE pu.first_name || ' ' || pu.last_name
                    END,
                    CASE WHEN c.patient_id = ?1 THEN 'doctor' ELSE 'patient' END,
                    dp.specialization,
                    (SELECT content FROM messages
                        WHERE conversation_id = c.id
                        ORDER BY created_at DESC, rowid DESC LIMIT 1),
                    (SELECT created_at FROM messages
                        WHERE conversation_id = c.id
                        ORDER BY created_at DESC, rowid DESC LIMIT 1),
                    (SELECT COUNT(*) FROM messages
                        WHERE conversation_id = c.id
                          AND sender_id != ?1
                          AND is_read = 0)
                 FROM conversations c
                 LEFT JOIN users pu ON c.patient_id = pu.id
                 LEFT JOIN users du ON c.doctor_id = du.id
                 LEFT JOIN doctor_profiles dp ON c.doctor_id = dp.user_id
                 WHERE c.patient_id = ?1 OR c.doctor_id = ?1
                 ORDER BY c.last_message_at DESC, c.id",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ConversationSummaryRow {
                        id: row.get(0)?,
                        created_at: row.get(1)?,
                        last_activity_at: row.get(2)?,
                        other_user_id: row.get(3)?,
                        other_user_name: row
                            .get::<_, Option<String>>(4)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        other_user_role: row.get(5)?,
                        specialization: row.get(6)?,
                        last_message: row.get(7)?,
                        last_message_at: row.get(8)?,
                        unread_count: row.get(9)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Counterparts `user_id` has a non-cancelled appointment with but no
    /// conversation yet, most recent appointment first. Admins have none.
    pub fn list_appointment_contacts(&self, user_id: &str, role: Role) -> Result<Vec<ContactRow>> {
        let sql = match role {
            Role::Patient => {
                "SELECT a.doctor_id, u.first_name || ' ' || u.last_name, 'doctor', dp.specialization
                 FROM appointments a
                 JOIN users u ON a.doctor_id = u.id
                 LEFT JOIN doctor_profiles dp ON a.doctor_id = dp.user_id
                 WHERE a.patient_id = ?1
                   AND a.status != 'cancelled'
                   AND NOT EXISTS (
                       SELECT 1 FROM conversations c
                       WHERE c.patient_id = ?1 AND c.doctor_id = a.doctor_id
                   )
                 GROUP BY a.doctor_id
                 ORDER BY MAX(a.scheduled_at) DESC"
            }
            Role::Doctor => {
                "SELECT a.patient_id, u.first_name || ' ' || u.last_name, 'patient', NULL
                 FROM appointments a
                 JOIN users u ON a.patient_id = u.id
                 WHERE a.doctor_id = ?1
                   AND a.status != 'cancelled'
                   AND NOT EXISTS (
                       SELECT 1 FROM conversations c
                       WHERE c.doctor_id = ?1 AND c.patient_id = a.patient_id
                   )
                 GROUP BY a.patient_id
                 ORDER BY MAX(a.scheduled_at) DESC"
            }
            Role::Admin => return Ok(vec![]),
        };

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ContactRow {
                        user_id: row.get(0)?,
                        name: row.get(1)?,
                        role: row.get(2)?,
                        specialization: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Messages --

    /// Append a message and advance the conversation's last activity.
    /// Returns the stored `created_at`.
    pub fn insert_message(
        &self,
        id: &str,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<String> {
        self.with_conn_mut(|conn| {
            let now = now_timestamp();
            let tx = conn.unchecked_transaction()?;

            tx.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, conversation_id, sender_id, content, &now),
            )?;
            tx.execute(
                "UPDATE conversations SET last_message_at = ?1 WHERE id = ?2",
                (&now, conversation_id),
            )?;

            tx.commit()?;
            Ok(now)
        })
    }

    /// Mark every unread message the other participant sent as read, then
    /// return the whole thread oldest first. Both steps share one transaction.
    pub fn read_thread(&self, conversation_id: &str, reader_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            tx.execute(
                "UPDATE messages SET is_read = 1
                 WHERE conversation_id = ?1 AND sender_id != ?2 AND is_read = 0",
                (conversation_id, reader_id),
            )?;
            let rows = query_messages(&tx, conversation_id)?;

            tx.commit()?;
            Ok(rows)
        })
    }

    /// The thread without touching read flags.
    pub fn get_messages(&self, conversation_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, conversation_id))
    }

    // -- Notifications --

    pub fn insert_notification(&self, id: &str, notification: &NewNotification) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, title, message, type, action_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id,
                    notification.user_id,
                    notification.title,
                    notification.message,
                    notification.kind,
                    notification.action_url,
                    now_timestamp(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_notifications(&self, user_id: &str, limit: u32) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, message, type, action_url, is_read, created_at
                 FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![user_id, limit], |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        title: row.get(2)?,
                        message: row.get(3)?,
                        kind: row.get(4)?,
                        action_url: row.get(5)?,
                        is_read: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Returns false when no notification with that id belongs to `user_id`.
    pub fn mark_notification_read(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
                (id, user_id),
            )?;
            Ok(updated == 1)
        })
    }
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, email, first_name, last_name, role, created_at FROM users WHERE id = ?1",
    )?;

    stmt.query_row([id], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            email: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            role: row.get(4)?,
            created_at: row.get(5)?,
        })
    })
    .optional()
}

fn query_messages(conn: &Connection, conversation_id: &str) -> Result<Vec<MessageRow>> {
    // JOIN users to fetch sender name and role in a single query
    let mut stmt = conn.prepare(
        "SELECT m.id, m.conversation_id, m.sender_id, u.first_name || ' ' || u.last_name,
                u.role, m.content, m.is_read, m.created_at
         FROM messages m
         JOIN users u ON m.sender_id = u.id
         WHERE m.conversation_id = ?1
         ORDER BY m.created_at ASC, m.rowid ASC",
    )?;

    let rows = stmt
        .query_map([conversation_id], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                conversation_id: row.get(1)?,
                sender_id: row.get(2)?,
                sender_name: row.get(3)?,
                sender_role: row.get(4)?,
                content: row.get(5)?,
                is_read: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn map_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        created_at: row.get(3)?,
        last_message_at: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

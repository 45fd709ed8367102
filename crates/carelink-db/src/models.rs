/// Database row types. These map directly to SQLite rows and stay
/// independent of the carelink-types wire models.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub created_at: String,
    pub last_message_at: String,
}

impl ConversationRow {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }

    /// The other participant, assuming `user_id` is one of them.
    pub fn other_participant(&self, user_id: &str) -> &str {
        if self.patient_id == user_id {
            &self.doctor_id
        } else {
            &self.patient_id
        }
    }
}

/// A conversation as seen from one participant, with the last-message
/// preview and the unread count for that participant.
pub struct ConversationSummaryRow {
    pub id: String,
    pub created_at: String,
    pub last_activity_at: String,
    pub other_user_id: String,
    pub other_user_name: String,
    pub other_user_role: String,
    pub specialization: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<String>,
    pub unread_count: i64,
}

/// Appointment counterpart that has no conversation with the user yet.
pub struct ContactRow {
    pub user_id: String,
    pub name: String,
    pub role: String,
    pub specialization: Option<String>,
}

#[derive(Debug)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_role: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
}

pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub action_url: Option<String>,
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub action_url: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

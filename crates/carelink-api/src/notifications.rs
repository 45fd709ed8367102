use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use carelink_db::Database;
use carelink_db::models::{NewNotification, NotificationRow};
use carelink_types::api::{Claims, NotificationResponse};
use carelink_types::models::{Role, notification_kind};

use crate::auth::{AppState, run_blocking};
use crate::error::ApiError;
use crate::util::{parse_client_id, parse_stored_id, parse_timestamp};

const PREVIEW_CHARS: usize = 100;

/// Sink for notification records. Delivery is best-effort: callers log
/// failures and carry on.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &NewNotification) -> anyhow::Result<()>;
}

/// Writes notifications to the `notifications` table.
pub struct DbNotifier {
    db: Arc<Database>,
}

impl DbNotifier {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl Notifier for DbNotifier {
    fn notify(&self, notification: &NewNotification) -> anyhow::Result<()> {
        self.db
            .insert_notification(&Uuid::new_v4().to_string(), notification)
    }
}

/// Notification telling `recipient_id` about a new message, linking to
/// their own message view.
pub fn message_notification(recipient_id: &str, recipient_role: Role, content: &str) -> NewNotification {
    NewNotification {
        user_id: recipient_id.to_string(),
        title: "New Message".to_string(),
        message: content.chars().take(PREVIEW_CHARS).collect(),
        kind: notification_kind::MESSAGE.to_string(),
        action_url: Some(recipient_role.messages_path()),
    }
}

/// Deliver a notification, logging instead of failing.
pub fn notify_best_effort(notifier: &dyn Notifier, notification: &NewNotification) {
    if let Err(e) = notifier.notify(notification) {
        warn!(
            "Notification creation failed for user {}: {:#}",
            notification.user_id, e
        );
    }
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// GET /notifications
///
/// The caller's notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    query: Result<Query<NotificationQuery>, QueryRejection>,
) -> Result<Json<Vec<NotificationResponse>>, ApiError> {
    let Query(query) = query?;
    let limit = query.limit.clamp(1, 200);
    let uid = claims.sub.to_string();

    let rows = run_blocking(&state, move |s| Ok(s.db.list_notifications(&uid, limit)?)).await?;

    let notifications = rows
        .into_iter()
        .map(notification_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(notifications))
}

/// POST /notifications/{id}/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let nid = parse_client_id(&notification_id, "notification")?.to_string();
    let uid = claims.sub.to_string();

    let updated = run_blocking(&state, move |s| Ok(s.db.mark_notification_read(&nid, &uid)?)).await?;
    if !updated {
        return Err(ApiError::not_found("Notification not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

fn notification_from_row(row: NotificationRow) -> Result<NotificationResponse, ApiError> {
    let context = format!("notification '{}'", row.id);
    Ok(NotificationResponse {
        id: parse_stored_id(&row.id, &context)?,
        title: row.title,
        message: row.message,
        kind: row.kind,
        action_url: row.action_url,
        is_read: row.is_read,
        created_at: parse_timestamp(&row.created_at, &context),
    })
}

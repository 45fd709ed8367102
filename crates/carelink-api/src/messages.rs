use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;
use uuid::Uuid;

use carelink_db::models::{ConversationRow, MessageRow};
use carelink_types::api::{Claims, MessageResponse, SendMessageRequest};
use carelink_types::models::Role;

use crate::auth::{AppState, AppStateInner, run_blocking};
use crate::error::ApiError;
use crate::notifications::{message_notification, notify_best_effort};
use crate::util::{parse_client_id, parse_stored_id, parse_stored_role, parse_timestamp};

/// GET /conversations/{id}/messages
///
/// Marks everything the other participant sent as read, then returns the
/// whole thread oldest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let cid = parse_client_id(&conversation_id, "conversation")?.to_string();
    let uid = claims.sub.to_string();

    let rows = run_blocking(&state, move |s| {
        authorize(s, &cid, &uid)?;
        Ok(s.db.read_thread(&cid, &uid)?)
    })
    .await?;

    let messages = rows
        .into_iter()
        .map(message_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(messages))
}

/// POST /conversations/{id}/messages
///
/// Appends a message, then notifies the other participant. A failed
/// notification is logged and never fails the send.
pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::validation("Message content is required"));
    }

    let cid = parse_client_id(&conversation_id, "conversation")?.to_string();
    let message_id = Uuid::new_v4();
    let mid = message_id.to_string();
    let sender = claims.sub.to_string();
    let body = content.clone();

    let created_at = run_blocking(&state, move |s| {
        let conversation = authorize(s, &cid, &sender)?;
        let created_at = s.db.insert_message(&mid, &cid, &sender, &body)?;

        let recipient = conversation.other_participant(&sender);
        let recipient_role = if recipient == conversation.patient_id {
            Role::Patient
        } else {
            Role::Doctor
        };
        notify_best_effort(
            s.notifier.as_ref(),
            &message_notification(recipient, recipient_role, &body),
        );

        Ok(created_at)
    })
    .await?;

    debug!("Message {} sent by {}", message_id, claims.sub);

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            id: message_id,
            content,
            is_read: false,
            created_at: parse_timestamp(&created_at, "new message"),
            sender_id: claims.sub,
            sender_name: claims.display_name(),
            sender_role: claims.role,
        }),
    ))
}

/// Resolve the conversation and check `user_id` takes part in it.
fn authorize(
    state: &AppStateInner,
    conversation_id: &str,
    user_id: &str,
) -> Result<ConversationRow, ApiError> {
    let conversation = state
        .db
        .get_conversation(conversation_id)?
        .ok_or_else(|| ApiError::not_found("Conversation not found"))?;

    if !conversation.has_participant(user_id) {
        return Err(ApiError::forbidden("Access denied"));
    }

    Ok(conversation)
}

fn message_from_row(row: MessageRow) -> Result<MessageResponse, ApiError> {
    let context = format!("message '{}' in conversation '{}'", row.id, row.conversation_id);
    Ok(MessageResponse {
        id: parse_stored_id(&row.id, &context)?,
        sender_id: parse_stored_id(&row.sender_id, &context)?,
        sender_role: parse_stored_role(&row.sender_role, &context)?,
        sender_name: row.sender_name,
        created_at: parse_timestamp(&row.created_at, &context),
        is_read: row.is_read,
        content: row.content,
    })
}

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use carelink_db::models::{ContactRow, ConversationSummaryRow};
use carelink_types::api::{
    Claims, ConversationResponse, ConversationSummary, CreateConversationRequest,
};
use carelink_types::models::Role;

use crate::auth::{AppState, run_blocking};
use crate::error::ApiError;
use crate::util::{parse_client_id, parse_stored_id, parse_stored_role, parse_timestamp};

/// GET /conversations
///
/// The caller's conversations, most recently active first, followed by one
/// virtual entry per appointment counterpart they have not talked to yet.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let uid = claims.sub.to_string();
    let role = claims.role;

    let (rows, contacts) = run_blocking(&state, move |s| {
        let rows = s.db.list_conversations(&uid)?;
        let contacts = s.db.list_appointment_contacts(&uid, role)?;
        Ok((rows, contacts))
    })
    .await?;

    let mut summaries = Vec::with_capacity(rows.len() + contacts.len());
    for row in rows {
        summaries.push(summary_from_row(row)?);
    }
    for contact in contacts {
        summaries.push(virtual_summary(contact)?);
    }

    Ok(Json(summaries))
}

/// POST /conversations
///
/// Patients name a doctor (`doctorId`), doctors name a patient (`patientId`).
/// Returns the pair's conversation, creating it on first contact.
pub async fn open_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateConversationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let counterpart_role = claims
        .role
        .counterpart()
        .ok_or_else(|| ApiError::forbidden("Invalid user role"))?;

    let raw_id = match claims.role {
        Role::Patient => req.doctor_id,
        _ => req.patient_id,
    }
    .filter(|id| !id.is_empty())
    .ok_or_else(|| {
        ApiError::validation(match counterpart_role {
            Role::Doctor => "Doctor ID is required",
            _ => "Patient ID is required",
        })
    })?;
    let other_id = parse_client_id(&raw_id, "user")?;

    let (patient_id, doctor_id) = match claims.role {
        Role::Patient => (claims.sub, other_id),
        _ => (other_id, claims.sub),
    };

    let (row, created) = run_blocking(&state, move |s| {
        let other = s
            .db
            .get_user_by_id(&other_id.to_string())?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        if other.role != counterpart_role.as_str() {
            return Err(ApiError::validation(format!("Invalid {} ID", counterpart_role)));
        }

        Ok(s.db.resolve_conversation(
            &Uuid::new_v4().to_string(),
            &patient_id.to_string(),
            &doctor_id.to_string(),
        )?)
    })
    .await?;

    if created {
        info!(
            "Conversation {} opened between patient {} and doctor {}",
            row.id, patient_id, doctor_id
        );
    }

    let context = format!("conversation '{}'", row.id);
    let response = ConversationResponse {
        id: parse_stored_id(&row.id, &context)?,
        created_at: parse_timestamp(&row.created_at, &context),
        last_message_at: parse_timestamp(&row.last_message_at, &context),
    };
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };

    Ok((status, Json(response)))
}

fn summary_from_row(row: ConversationSummaryRow) -> Result<ConversationSummary, ApiError> {
    let context = format!("conversation '{}'", row.id);
    Ok(ConversationSummary {
        id: Some(parse_stored_id(&row.id, &context)?),
        created_at: Some(parse_timestamp(&row.created_at, &context)),
        updated_at: Some(parse_timestamp(&row.last_activity_at, &context)),
        other_user_id: parse_stored_id(&row.other_user_id, &context)?,
        other_user_role: parse_stored_role(&row.other_user_role, &context)?,
        other_user_name: row.other_user_name,
        specialization: row.specialization,
        last_message_at: row
            .last_message_at
            .as_deref()
            .map(|ts| parse_timestamp(ts, &context)),
        last_message: row.last_message,
        unread_count: row.unread_count,
    })
}

fn virtual_summary(contact: ContactRow) -> Result<ConversationSummary, ApiError> {
    let context = format!("contact '{}'", contact.user_id);
    Ok(ConversationSummary {
        id: None,
        created_at: None,
        updated_at: None,
        other_user_id: parse_stored_id(&contact.user_id, &context)?,
        other_user_role: parse_stored_role(&contact.role, &context)?,
        other_user_name: contact.name,
        specialization: contact.specialization,
        last_message: None,
        last_message_at: None,
        unread_count: 0,
    })
}

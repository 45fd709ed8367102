use anyhow::anyhow;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use carelink_types::models::Role;

use crate::error::ApiError;

/// Parse a client-supplied identifier. Only the canonical hyphenated form is
/// accepted.
pub(crate) fn parse_client_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    if raw.len() != 36 {
        return Err(ApiError::validation(format!("Invalid {what} ID format")));
    }
    Uuid::parse_str(raw).map_err(|_| ApiError::validation(format!("Invalid {what} ID format")))
}

pub(crate) fn parse_stored_id(raw: &str, context: &str) -> Result<Uuid, ApiError> {
    raw.parse::<Uuid>()
        .map_err(|e| ApiError::from(anyhow!("corrupt id '{}' on {}: {}", raw, context, e)))
}

pub(crate) fn parse_stored_role(raw: &str, context: &str) -> Result<Role, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::from(anyhow!("corrupt role on {}: {}", context, e)))
}

/// Stored timestamps are RFC 3339. Rows written by SQLite's `datetime('now')`
/// use "YYYY-MM-DD HH:MM:SS" without a timezone; those are read as UTC.
pub(crate) fn parse_timestamp(raw: &str, context: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on {}: {}", raw, context, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ids_must_be_hyphenated_uuids() {
        let id = Uuid::new_v4();
        assert_eq!(parse_client_id(&id.to_string(), "user").unwrap(), id);
        assert!(parse_client_id(&id.simple().to_string(), "user").is_err());
        assert!(parse_client_id("not-a-uuid", "user").is_err());
        assert!(parse_client_id("", "user").is_err());
    }

    #[test]
    fn corrupt_stored_values_are_internal_errors() {
        let id = Uuid::new_v4();
        assert_eq!(parse_stored_id(&id.to_string(), "test").unwrap(), id);
        assert!(matches!(
            parse_stored_id("conv-1", "test"),
            Err(ApiError::Internal(_))
        ));
        assert!(matches!(
            parse_stored_role("nurse", "test"),
            Err(ApiError::Internal(_))
        ));
    }

    #[test]
    fn timestamps_accept_both_stored_formats() {
        let rfc = parse_timestamp("2026-03-04T05:06:07.890Z", "test");
        let legacy = parse_timestamp("2026-03-04 05:06:07", "test");
        assert_eq!(rfc.timestamp(), legacy.timestamp());
        assert_eq!(parse_timestamp("garbage", "test"), DateTime::<Utc>::default());
    }
}

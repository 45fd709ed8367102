use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use carelink_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// Extract and validate the JWT from the Authorization header and expose
/// its claims to handlers as a request extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let claims = decode_claims(token, &state.jwt_secret)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        debug!("Token rejected: {}", e);
        ApiError::Unauthorized
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_token;
    use carelink_types::models::Role;
    use uuid::Uuid;

    #[test]
    fn accepts_tokens_signed_with_the_shared_secret() {
        let user_id = Uuid::new_v4();
        let token = create_token("s3cret", user_id, Role::Doctor, "Ada", "Lovelace").unwrap();

        let claims = decode_claims(&token, "s3cret").unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Doctor);
        assert_eq!(claims.display_name(), "Ada Lovelace");
    }

    #[test]
    fn rejects_tokens_signed_with_another_secret() {
        let token = create_token("s3cret", Uuid::new_v4(), Role::Patient, "A", "B").unwrap();
        assert!(matches!(
            decode_claims(&token, "other"),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            decode_claims("not-a-jwt", "s3cret"),
            Err(ApiError::Unauthorized)
        ));
    }
}

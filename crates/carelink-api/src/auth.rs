use std::sync::Arc;

use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::error;
use uuid::Uuid;

use carelink_db::Database;
use carelink_types::api::Claims;
use carelink_types::models::Role;

use crate::error::ApiError;
use crate::notifications::{DbNotifier, Notifier};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub notifier: Arc<dyn Notifier>,
    pub jwt_secret: String,
}

impl AppStateInner {
    /// State backed by `db`, with notifications written to the same database.
    pub fn new(db: Arc<Database>, jwt_secret: impl Into<String>) -> Self {
        Self {
            notifier: Arc::new(DbNotifier::new(db.clone())),
            db,
            jwt_secret: jwt_secret.into(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::from(e)
        })?
}

/// Sign a token in the identity service's format. Used by provisioning
/// tooling and tests; the service itself only verifies tokens.
pub fn create_token(
    secret: &str,
    user_id: Uuid,
    role: Role,
    first_name: &str,
    last_name: &str,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        role,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

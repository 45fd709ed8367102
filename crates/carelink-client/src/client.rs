use reqwest::{Client as HttpClient, RequestBuilder};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use carelink_types::api::{
    ConversationResponse, ConversationSummary, CreateConversationRequest, ErrorResponse,
    MessageResponse, NotificationResponse, SendMessageRequest,
};
use carelink_types::models::Role;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

/// The user on the other side of a conversation to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counterpart {
    Doctor(Uuid),
    Patient(Uuid),
}

impl Counterpart {
    /// Counterpart behind a listing entry, e.g. to start a virtual conversation.
    pub fn of(summary: &ConversationSummary) -> Option<Self> {
        match summary.other_user_role {
            Role::Doctor => Some(Counterpart::Doctor(summary.other_user_id)),
            Role::Patient => Some(Counterpart::Patient(summary.other_user_id)),
            Role::Admin => None,
        }
    }

    fn request(&self) -> CreateConversationRequest {
        match self {
            Counterpart::Doctor(id) => CreateConversationRequest {
                doctor_id: Some(id.to_string()),
                patient_id: None,
            },
            Counterpart::Patient(id) => CreateConversationRequest {
                doctor_id: None,
                patient_id: Some(id.to_string()),
            },
        }
    }
}

/// Bearer-authenticated client for the messaging API.
pub struct ApiClient {
    http: HttpClient,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let resp = req.bearer_auth(&self.token).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = match resp.json::<ErrorResponse>().await {
                Ok(body) => body.error,
                Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
            };
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json::<T>().await?)
    }

    pub async fn conversations(&self) -> Result<Vec<ConversationSummary>, ClientError> {
        self.send(self.http.get(self.url("/conversations"))).await
    }

    pub async fn open_conversation(
        &self,
        counterpart: Counterpart,
    ) -> Result<ConversationResponse, ClientError> {
        self.send(
            self.http
                .post(self.url("/conversations"))
                .json(&counterpart.request()),
        )
        .await
    }

    /// Fetch a thread. The server marks the other side's messages read.
    pub async fn messages(&self, conversation_id: Uuid) -> Result<Vec<MessageResponse>, ClientError> {
        let path = format!("/conversations/{}/messages", conversation_id);
        self.send(self.http.get(self.url(&path))).await
    }

    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        content: &str,
    ) -> Result<MessageResponse, ClientError> {
        let path = format!("/conversations/{}/messages", conversation_id);
        let body = SendMessageRequest {
            content: content.to_string(),
        };
        self.send(self.http.post(self.url(&path)).json(&body)).await
    }

    pub async fn notifications(&self) -> Result<Vec<NotificationResponse>, ClientError> {
        self.send(self.http.get(self.url("/notifications"))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counterpart_names_the_right_field() {
        let id = Uuid::new_v4();

        let body = serde_json::to_value(Counterpart::Doctor(id).request()).unwrap();
        assert_eq!(body, serde_json::json!({ "doctorId": id.to_string() }));

        let body = serde_json::to_value(Counterpart::Patient(id).request()).unwrap();
        assert_eq!(body, serde_json::json!({ "patientId": id.to_string() }));
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let client = ApiClient::new("http://localhost:3000/", "t");
        assert_eq!(client.url("/conversations"), "http://localhost:3000/conversations");
    }
}

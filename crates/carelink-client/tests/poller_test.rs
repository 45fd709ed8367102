use std::sync::Arc;
use std::time::Duration;

use carelink_api::auth::{AppStateInner, create_token};
use carelink_client::poller;
use carelink_client::{ApiClient, ClientError, Counterpart, PollIntervals};
use carelink_db::Database;
use carelink_types::models::Role;
use tokio::net::TcpListener;
use tokio::time::timeout;
use uuid::Uuid;

const JWT_SECRET: &str = "client-test-secret";
const WAIT: Duration = Duration::from_secs(5);

struct Server {
    address: String,
    db: Arc<Database>,
}

impl Server {
    async fn start() -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let state = Arc::new(AppStateInner::new(db.clone(), JWT_SECRET));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let app = carelink_api::router(state);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { address, db }
    }

    fn client_for(&self, role: Role, first_name: &str, last_name: &str) -> (Uuid, ApiClient) {
        let id = Uuid::new_v4();
        self.db
            .create_user(
                &id.to_string(),
                &format!("{}@example.com", id),
                first_name,
                last_name,
                role,
            )
            .unwrap();
        let token = create_token(JWT_SECRET, id, role, first_name, last_name).unwrap();
        (id, ApiClient::new(&self.address, token))
    }
}

fn fast() -> PollIntervals {
    PollIntervals {
        conversations: Duration::from_millis(50),
        messages: Duration::from_millis(30),
    }
}

#[tokio::test]
async fn api_errors_carry_status_and_message() {
    let server = Server::start().await;
    let (_, patient) = server.client_for(Role::Patient, "Pat", "Doe");

    let err = patient
        .open_conversation(Counterpart::Doctor(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(matches!(err, ClientError::Api { ref message, .. } if message == "User not found"));

    let err = patient
        .send_message(Uuid::new_v4(), "hello")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn open_and_exchange_messages() {
    let server = Server::start().await;
    let (patient_id, patient) = server.client_for(Role::Patient, "Pat", "Doe");
    let (doctor_id, doctor) = server.client_for(Role::Doctor, "Ann", "Lee");

    let opened = patient
        .open_conversation(Counterpart::Doctor(doctor_id))
        .await
        .unwrap();
    let again = doctor
        .open_conversation(Counterpart::Patient(patient_id))
        .await
        .unwrap();
    assert_eq!(opened.id, again.id);

    let sent = doctor.send_message(opened.id, "  See you Monday ").await.unwrap();
    assert_eq!(sent.content, "See you Monday");
    assert_eq!(sent.sender_role, Role::Doctor);

    let thread = patient.messages(opened.id).await.unwrap();
    assert_eq!(thread.len(), 1);
    assert!(thread[0].is_read);

    let notifications = patient.notifications().await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].action_url.as_deref(), Some("/patient/messages"));
}

#[tokio::test]
async fn poller_publishes_conversations_and_active_thread() {
    let server = Server::start().await;
    let (_, patient) = server.client_for(Role::Patient, "Pat", "Doe");
    let (doctor_id, doctor) = server.client_for(Role::Doctor, "Ann", "Lee");

    let conversation = patient
        .open_conversation(Counterpart::Doctor(doctor_id))
        .await
        .unwrap();

    let handle = poller::spawn(Arc::new(patient), fast());
    let mut conversations = handle.conversations();
    let mut thread = handle.thread();

    doctor.send_message(conversation.id, "Results are in").await.unwrap();

    let listed = timeout(
        WAIT,
        conversations.wait_for(|list| {
            list.iter()
                .any(|c| c.id == Some(conversation.id) && c.last_message.as_deref() == Some("Results are in"))
        }),
    )
    .await
    .expect("conversation list never updated")
    .unwrap()
    .clone();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].other_user_id, doctor_id);

    handle.set_active(Some(conversation.id));
    doctor.send_message(conversation.id, "Call me").await.unwrap();

    let latest = timeout(
        WAIT,
        thread.wait_for(|t| {
            t.as_ref()
                .is_some_and(|t| t.conversation_id == conversation.id && t.messages.len() == 2)
        }),
    )
    .await
    .expect("thread never updated")
    .unwrap()
    .clone()
    .unwrap();
    assert_eq!(latest.messages[0].content, "Results are in");
    assert_eq!(latest.messages[1].content, "Call me");

    handle.set_active(None);
    timeout(WAIT, thread.wait_for(|t| t.is_none()))
        .await
        .expect("thread was not cleared")
        .unwrap();

    handle.shutdown().await;
}

#[tokio::test]
async fn poller_stops_when_dropped() {
    let server = Server::start().await;
    let (_, patient) = server.client_for(Role::Patient, "Pat", "Doe");

    let handle = poller::spawn(Arc::new(patient), fast());
    let mut conversations = handle.conversations();
    drop(handle);

    // Both senders go away once the tasks observe cancellation.
    let closed = timeout(WAIT, async {
        while conversations.changed().await.is_ok() {}
    })
    .await;
    assert!(closed.is_ok());
}

#[tokio::test]
async fn virtual_contacts_can_be_opened() {
    let server = Server::start().await;
    let (patient_id, patient) = server.client_for(Role::Patient, "Pat", "Doe");
    let (doctor_id, _) = server.client_for(Role::Doctor, "Ann", "Lee");
    server
        .db
        .create_appointment(
            &Uuid::new_v4().to_string(),
            &patient_id.to_string(),
            &doctor_id.to_string(),
            "2026-03-01T09:00:00.000Z",
            "scheduled",
        )
        .unwrap();

    let list = patient.conversations().await.unwrap();
    assert_eq!(list.len(), 1);
    assert!(list[0].is_virtual());

    let counterpart = Counterpart::of(&list[0]).unwrap();
    assert_eq!(counterpart, Counterpart::Doctor(doctor_id));
    let opened = patient.open_conversation(counterpart).await.unwrap();

    let list = patient.conversations().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, Some(opened.id));
    assert!(!list[0].is_virtual());
}

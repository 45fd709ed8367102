use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use carelink_types::api::{ConversationSummary, MessageResponse};

use crate::client::ApiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub conversations: Duration,
    pub messages: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            conversations: Duration::from_secs(10),
            messages: Duration::from_secs(3),
        }
    }
}

/// Latest fetched state of one conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub conversation_id: Uuid,
    pub messages: Vec<MessageResponse>,
}

/// Keeps a conversation list and the active thread fresh by polling.
///
/// Each successful poll replaces the published value, so readers always see
/// the most recent poll. New messages show up at most one interval late.
/// Failed polls are logged and retried on the next tick.
pub struct PollerHandle {
    conversations: watch::Receiver<Vec<ConversationSummary>>,
    thread: watch::Receiver<Option<Thread>>,
    active: watch::Sender<Option<Uuid>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

pub fn spawn(client: Arc<ApiClient>, intervals: PollIntervals) -> PollerHandle {
    let cancel = CancellationToken::new();
    let (conversations_tx, conversations_rx) = watch::channel(Vec::new());
    let (thread_tx, thread_rx) = watch::channel(None);
    let (active_tx, active_rx) = watch::channel(None);

    let tasks = vec![
        tokio::spawn(poll_conversations(
            client.clone(),
            intervals.conversations,
            conversations_tx,
            cancel.clone(),
        )),
        tokio::spawn(poll_thread(
            client,
            intervals.messages,
            active_rx,
            thread_tx,
            cancel.clone(),
        )),
    ];

    PollerHandle {
        conversations: conversations_rx,
        thread: thread_rx,
        active: active_tx,
        cancel,
        tasks,
    }
}

impl PollerHandle {
    pub fn conversations(&self) -> watch::Receiver<Vec<ConversationSummary>> {
        self.conversations.clone()
    }

    pub fn thread(&self) -> watch::Receiver<Option<Thread>> {
        self.thread.clone()
    }

    /// Switch the thread being polled. The new thread is fetched right away.
    pub fn set_active(&self, conversation_id: Option<Uuid>) {
        self.active.send_replace(conversation_id);
    }

    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            let _ = task.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_conversations(
    client: Arc<ApiClient>,
    every: Duration,
    tx: watch::Sender<Vec<ConversationSummary>>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = client.conversations() => result,
        };

        match result {
            Ok(list) => {
                tx.send_replace(list);
            }
            Err(e) => warn!("Conversation poll failed: {}", e),
        }
    }

    debug!("Conversation poller stopped");
}

async fn poll_thread(
    client: Arc<ApiClient>,
    every: Duration,
    mut active: watch::Receiver<Option<Uuid>>,
    tx: watch::Sender<Option<Thread>>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
            changed = active.changed() => {
                if changed.is_err() {
                    break;
                }
                interval.reset();
            }
        }

        let current = *active.borrow_and_update();
        let Some(conversation_id) = current else {
            tx.send_replace(None);
            continue;
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = client.messages(conversation_id) => result,
        };

        match result {
            // Drop answers for a thread the user has already left.
            Ok(messages) if *active.borrow() == Some(conversation_id) => {
                tx.send_replace(Some(Thread {
                    conversation_id,
                    messages,
                }));
            }
            Ok(_) => {}
            Err(e) => warn!("Message poll for {} failed: {}", conversation_id, e),
        }
    }

    debug!("Thread poller stopped");
}

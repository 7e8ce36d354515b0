//! Scripted in-memory backend shared by the synchronizer tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use creatorlink_sync::{
    ChatBackend, LiveEvent, Message, Result, SenderProfile, Subscription, SyncError, ThreadEvent,
};
use futures::channel::mpsc::UnboundedReceiver;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

pub const VIEWER: &str = "creator-1";
pub const BRAND: &str = "brand-1";

#[derive(Default)]
pub struct ScriptedBackend {
    history: Mutex<HashMap<String, Vec<Message>>>,
    profiles: Mutex<HashMap<String, SenderProfile>>,
    feeds: Arc<Mutex<HashMap<String, mpsc::Sender<LiveEvent>>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    pub fetch_started: Notify,
    pub fail_fetch: AtomicBool,
    pub fail_subscribe: AtomicBool,
    pub fail_mark: AtomicBool,
    pub mark_calls: Mutex<Vec<(String, String)>>,
    pub profile_calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_history(&self, conversation_id: &str, messages: Vec<Message>) {
        self.history
            .lock()
            .insert(conversation_id.to_string(), messages);
    }

    pub fn set_profile(&self, sender_id: &str, name: &str, avatar: &str) {
        self.profiles.lock().insert(
            sender_id.to_string(),
            SenderProfile {
                display_name: name.to_string(),
                avatar_url: avatar.to_string(),
            },
        );
    }

    /// Hold history fetches for `conversation_id` until the returned notify fires
    pub fn gate(&self, conversation_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .insert(conversation_id.to_string(), gate.clone());
        gate
    }

    pub fn is_subscribed(&self, conversation_id: &str) -> bool {
        self.feeds.lock().contains_key(conversation_id)
    }

    pub fn subscription_count(&self) -> usize {
        self.feeds.lock().len()
    }

    pub fn mark_count(&self) -> usize {
        self.mark_calls.lock().len()
    }

    /// Deliver a live event to the subscriber of the message's conversation
    pub async fn push(&self, event: LiveEvent) {
        let feed = event.message.conversation_id.clone();
        self.push_to(&feed, event).await;
    }

    /// Deliver a live event on a specific conversation's feed
    pub async fn push_to(&self, feed: &str, event: LiveEvent) {
        let sender = self
            .feeds
            .lock()
            .get(feed)
            .cloned()
            .expect("no subscriber for conversation");
        sender.send(event).await.expect("subscriber gone");
    }

    /// Close the live feed from the backend side
    pub fn drop_feed(&self, conversation_id: &str) {
        self.feeds.lock().remove(conversation_id);
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn fetch_conversation_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let gate = self.gates.lock().get(conversation_id).cloned();
        if let Some(gate) = gate {
            self.fetch_started.notify_one();
            gate.notified().await;
        }

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(SyncError::LoadFailure("storage unavailable".to_string()));
        }
        Ok(self
            .history
            .lock()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_messages_read(&self, conversation_id: &str, viewer_id: &str) -> Result<()> {
        self.mark_calls
            .lock()
            .push((conversation_id.to_string(), viewer_id.to_string()));
        if self.fail_mark.load(Ordering::SeqCst) {
            return Err(SyncError::WriteFailure("write rejected".to_string()));
        }
        Ok(())
    }

    async fn subscribe_to_new_messages(&self, conversation_id: &str) -> Result<Subscription> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(SyncError::SubscriptionFailure(
                "channel refused".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(16);
        self.feeds.lock().insert(conversation_id.to_string(), tx);

        let feeds = self.feeds.clone();
        let key = conversation_id.to_string();
        Ok(Subscription::new(conversation_id, rx).on_teardown(move || {
            feeds.lock().remove(&key);
        }))
    }

    async fn fetch_sender_profile(&self, sender_id: &str) -> Result<SenderProfile> {
        self.profile_calls.lock().push(sender_id.to_string());
        self.profiles
            .lock()
            .get(sender_id)
            .cloned()
            .ok_or_else(|| SyncError::ProfileResolutionFailure(format!("no profile for {}", sender_id)))
    }
}

pub fn message(conversation_id: &str, id: &str, secs: i64, from: &str, to: &str) -> Message {
    Message {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        sender_id: from.to_string(),
        receiver_id: to.to_string(),
        body: format!("message {}", id),
        created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        read_at: None,
        sender: Some(SenderProfile {
            display_name: from.to_string(),
            avatar_url: String::new(),
        }),
    }
}

pub fn read_message(conversation_id: &str, id: &str, secs: i64, from: &str, to: &str) -> Message {
    let mut msg = message(conversation_id, id, secs, from, to);
    msg.read_at = Some(Utc.timestamp_opt(1_700_000_000 + secs + 1, 0).unwrap());
    msg
}

/// Raw live payload: no denormalized sender profile
pub fn raw(conversation_id: &str, id: &str, secs: i64, from: &str, to: &str) -> Message {
    let mut msg = message(conversation_id, id, secs, from, to);
    msg.sender = None;
    msg
}

/// Wait for the first event matching `pred`, skipping others
pub async fn wait_for<F>(events: &mut UnboundedReceiver<ThreadEvent>, pred: F) -> ThreadEvent
where
    F: Fn(&ThreadEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.next().await.expect("event stream closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for thread event")
}

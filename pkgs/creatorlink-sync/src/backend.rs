//! Boundary to the hosted persistence service

use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::models::{LiveEvent, Message, SenderProfile};

/// Operations the synchronizer needs from the persistence service
///
/// Implementations are handed to the synchronizer as `Arc<dyn ChatBackend>`.
/// Failures should use the matching [`SyncError`](crate::SyncError) variant:
/// `LoadFailure` for fetches, `WriteFailure` for read marks, `SubscriptionFailure`
/// for the live feed and `ProfileResolutionFailure` for profile lookups.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// All messages of the conversation, oldest first
    async fn fetch_conversation_messages(&self, conversation_id: &str) -> Result<Vec<Message>>;

    /// Mark every message in the conversation addressed to `viewer_id` as read
    async fn mark_messages_read(&self, conversation_id: &str, viewer_id: &str) -> Result<()>;

    /// Start receiving inserts for the conversation (at-least-once delivery)
    async fn subscribe_to_new_messages(&self, conversation_id: &str) -> Result<Subscription>;

    /// Display profile for a sender id
    async fn fetch_sender_profile(&self, sender_id: &str) -> Result<SenderProfile>;

    /// Stop a subscription. Dropping the handle has the same effect.
    fn unsubscribe(&self, handle: SubscriptionHandle) {
        drop(handle);
    }
}

/// Live feed for one conversation: an event receiver plus its teardown handle
pub struct Subscription {
    handle: SubscriptionHandle,
    events: mpsc::Receiver<LiveEvent>,
}

impl Subscription {
    pub fn new(conversation_id: impl Into<String>, events: mpsc::Receiver<LiveEvent>) -> Self {
        Self {
            handle: SubscriptionHandle {
                conversation_id: conversation_id.into(),
                teardown: None,
            },
            events,
        }
    }

    /// Run `teardown` when the subscription handle is dropped
    pub fn on_teardown(mut self, teardown: impl FnOnce() + Send + 'static) -> Self {
        self.handle.teardown = Some(Box::new(teardown));
        self
    }

    pub fn conversation_id(&self) -> &str {
        &self.handle.conversation_id
    }

    pub async fn next_event(&mut self) -> Option<LiveEvent> {
        self.events.recv().await
    }

    /// Next already-buffered event, if any
    pub fn try_next_event(&mut self) -> Option<LiveEvent> {
        self.events.try_recv().ok()
    }

    /// Separate the teardown handle from the event stream
    pub fn split(self) -> (SubscriptionHandle, mpsc::Receiver<LiveEvent>) {
        (self.handle, self.events)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("conversation_id", &self.handle.conversation_id)
            .finish()
    }
}

/// Owns the unsubscribe action; runs it exactly once, on drop
pub struct SubscriptionHandle {
    conversation_id: String,
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("conversation_id", &self.conversation_id)
            .finish()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_teardown_runs_once_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (_tx, rx) = mpsc::channel(4);

        let subscription = Subscription::new("c1", rx).on_teardown(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let (handle, events) = subscription.split();
        drop(events);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        drop(handle);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

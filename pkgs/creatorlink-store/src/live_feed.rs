//! Live feed - fans newly persisted messages out to conversation subscribers

use creatorlink_sync::{LiveEvent, Subscription};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

#[derive(Default)]
struct FeedState {
    next_id: u64,
    subscribers: HashMap<String, Vec<(u64, mpsc::Sender<LiveEvent>)>>,
}

/// Per-conversation live event fan-out
#[derive(Clone)]
pub struct LiveFeed {
    state: Arc<Mutex<FeedState>>,
    capacity: usize,
}

impl LiveFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(FeedState::default())),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to events for one conversation; dropping the handle unsubscribes
    pub fn subscribe(&self, conversation_id: &str) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);

        let id = {
            let mut state = self.state.lock();
            state.next_id += 1;
            let id = state.next_id;
            state
                .subscribers
                .entry(conversation_id.to_string())
                .or_default()
                .push((id, sender));
            id
        };
        debug!("Subscriber {} joined conversation {}", id, conversation_id);

        let state = self.state.clone();
        let key = conversation_id.to_string();
        Subscription::new(conversation_id, receiver).on_teardown(move || {
            let mut state = state.lock();
            let empty = match state.subscribers.get_mut(&key) {
                Some(list) => {
                    list.retain(|(sid, _)| *sid != id);
                    list.is_empty()
                }
                None => false,
            };
            if empty {
                state.subscribers.remove(&key);
            }
            debug!("Subscriber {} left conversation {}", id, key);
        })
    }

    /// Deliver an event to every subscriber of its conversation
    ///
    /// Returns the number of subscribers the event was queued for. A subscriber whose
    /// buffer is full is removed and its channel closes once drained; closed ones are
    /// pruned.
    pub fn publish(&self, event: &LiveEvent) -> usize {
        let mut state = self.state.lock();
        let conversation_id = &event.message.conversation_id;
        let Some(list) = state.subscribers.get_mut(conversation_id) else {
            return 0;
        };

        let mut delivered = 0;
        list.retain(|(id, sender)| match sender.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Subscriber {} of {} is lagging at message {}, closing its feed",
                    id, conversation_id, event.message.id
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        });

        delivered
    }

    pub fn subscriber_count(&self, conversation_id: &str) -> usize {
        self.state
            .lock()
            .subscribers
            .get(conversation_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use creatorlink_sync::Message;

    fn event(conversation_id: &str, id: &str) -> LiveEvent {
        LiveEvent::insert(Message {
            id: id.to_string(),
            conversation_id: conversation_id.to_string(),
            sender_id: "brand-1".to_string(),
            receiver_id: "creator-1".to_string(),
            body: "hello".to_string(),
            created_at: Utc::now(),
            read_at: None,
            sender: None,
        })
    }

    #[tokio::test]
    async fn test_events_reach_only_their_conversation() {
        let feed = LiveFeed::new(8);
        let mut first = feed.subscribe("c1");
        let mut other = feed.subscribe("c2");

        assert_eq!(feed.publish(&event("c1", "m1")), 1);

        let received = first.next_event().await.expect("no event");
        assert_eq!(received.message.id, "m1");
        assert!(other.try_next_event().is_none());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let feed = LiveFeed::new(8);
        let a = feed.subscribe("c1");
        let b = feed.subscribe("c1");
        assert_eq!(feed.subscriber_count("c1"), 2);

        drop(a);
        assert_eq!(feed.subscriber_count("c1"), 1);
        drop(b);
        assert_eq!(feed.subscriber_count("c1"), 0);
        assert_eq!(feed.publish(&event("c1", "m1")), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_is_cut_off() {
        let feed = LiveFeed::new(1);
        let mut lagging = feed.subscribe("c1");

        assert_eq!(feed.publish(&event("c1", "m1")), 1);
        assert_eq!(feed.publish(&event("c1", "m2")), 0);
        assert_eq!(feed.subscriber_count("c1"), 0);

        // What was buffered is still delivered, then the feed ends
        let buffered = lagging.next_event().await.expect("no event");
        assert_eq!(buffered.message.id, "m1");
        assert!(lagging.next_event().await.is_none());

        drop(lagging);
        assert_eq!(feed.subscriber_count("c1"), 0);
    }
}

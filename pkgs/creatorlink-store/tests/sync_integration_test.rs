// Thread synchronizer running against the SQLite store and live feed

use chrono::Utc;
use creatorlink_store::{Profile, Store, StoreConfig};
use creatorlink_sync::{
    LiveEvent, LoadOutcome, Message, SyncConfig, ThreadEvent, ThreadState, ThreadSynchronizer,
};
use futures::StreamExt;
use std::time::Duration;
use tempfile::NamedTempFile;

async fn create_test_store(path: &NamedTempFile) -> Store {
    Store::open(StoreConfig {
        db_path: path.path().to_path_buf(),
        ..Default::default()
    })
    .await
    .expect("Failed to open store")
}

async fn next_appended(
    events: &mut futures::channel::mpsc::UnboundedReceiver<ThreadEvent>,
) -> String {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.next().await.expect("event stream closed") {
                ThreadEvent::MessageAppended { message_id, .. } => return message_id,
                _ => continue,
            }
        }
    })
    .await
    .expect("timed out waiting for appended message")
}

#[tokio::test]
async fn test_open_marks_history_read_and_follows_live_messages() {
    let temp_file = NamedTempFile::new().unwrap();
    let store = create_test_store(&temp_file).await;
    store
        .profiles
        .upsert(&Profile {
            id: "brand-1".to_string(),
            display_name: "Acme".to_string(),
            handle: "@acme".to_string(),
            avatar_url: None,
        })
        .await
        .unwrap();

    let conv = store
        .conversations
        .create("creator-1", "brand-1", None)
        .await
        .unwrap();
    store
        .messages
        .send(&conv, "brand-1", "creator-1", "Welcome aboard")
        .await
        .unwrap();

    let (sync, mut events) =
        ThreadSynchronizer::new(store.backend(), "creator-1", SyncConfig::default());
    let outcome = sync.open(&conv).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Ready { messages: 1 });
    assert_eq!(sync.state(), ThreadState::Ready);
    assert!(sync.messages()[0].read_at.is_some());
    assert_eq!(store.messages.mark_read(&conv, "creator-1").await.unwrap(), 0);
    assert_eq!(store.feed().subscriber_count(&conv), 1);

    let live = store
        .messages
        .send(&conv, "brand-1", "creator-1", "Brief attached")
        .await
        .unwrap();
    assert_eq!(next_appended(&mut events).await, live.id);

    let messages = sync.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].sender_name(), "Acme");

    // The live message was addressed to the viewer, so it gets marked too
    tokio::time::timeout(Duration::from_secs(5), async {
        while store
            .messages
            .history(&conv)
            .await
            .unwrap()
            .iter()
            .any(|m| m.read_at.is_none())
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("live message never marked read");

    sync.close();
    assert_eq!(store.feed().subscriber_count(&conv), 0);
}

fn live_insert(conversation_id: &str, id: &str) -> LiveEvent {
    LiveEvent::insert(Message {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        sender_id: "brand-1".to_string(),
        receiver_id: "creator-1".to_string(),
        body: format!("message {}", id),
        created_at: Utc::now(),
        read_at: None,
        sender: None,
    })
}

#[tokio::test]
async fn test_lagging_thread_reports_live_feed_lost() {
    let temp_file = NamedTempFile::new().unwrap();
    let store = Store::open(StoreConfig {
        db_path: temp_file.path().to_path_buf(),
        live_channel_capacity: 1,
    })
    .await
    .expect("Failed to open store");
    let conv = store
        .conversations
        .create("creator-1", "brand-1", None)
        .await
        .unwrap();

    let (sync, mut events) =
        ThreadSynchronizer::new(store.backend(), "creator-1", SyncConfig::default());
    sync.open(&conv).await.unwrap();
    assert!(sync.live_available());

    // Back to back, before the follow task gets to run
    assert_eq!(store.feed().publish(&live_insert(&conv, "x1")), 1);
    assert_eq!(store.feed().publish(&live_insert(&conv, "x2")), 0);

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let ThreadEvent::LiveUnavailable { .. } =
                events.next().await.expect("event stream closed")
            {
                return;
            }
        }
    })
    .await
    .expect("lost live feed was never reported");

    assert!(!sync.live_available());
    assert_eq!(sync.state(), ThreadState::Ready);
    let ids: Vec<String> = sync.messages().into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec!["x1"]);

    // Retrying reloads from storage and subscribes again
    sync.retry().await.unwrap();
    assert!(sync.live_available());
    assert_eq!(store.feed().subscriber_count(&conv), 1);
}

//! [`ChatBackend`] implementation over the local store

use async_trait::async_trait;
use creatorlink_sync::{ChatBackend, Message, SenderProfile, Subscription, SyncError};

use crate::live_feed::LiveFeed;
use crate::message_store::MessageStore;
use crate::profile_store::ProfileStore;

/// Serves a thread synchronizer from the SQLite store and the in-process live feed
#[derive(Clone)]
pub struct StoreBackend {
    messages: MessageStore,
    profiles: ProfileStore,
    feed: LiveFeed,
}

impl StoreBackend {
    pub fn new(messages: MessageStore, profiles: ProfileStore, feed: LiveFeed) -> Self {
        Self {
            messages,
            profiles,
            feed,
        }
    }
}

#[async_trait]
impl ChatBackend for StoreBackend {
    async fn fetch_conversation_messages(
        &self,
        conversation_id: &str,
    ) -> creatorlink_sync::Result<Vec<Message>> {
        self.messages
            .history(conversation_id)
            .await
            .map_err(|e| SyncError::LoadFailure(e.to_string()))
    }

    async fn mark_messages_read(
        &self,
        conversation_id: &str,
        viewer_id: &str,
    ) -> creatorlink_sync::Result<()> {
        self.messages
            .mark_read(conversation_id, viewer_id)
            .await
            .map(|_| ())
            .map_err(|e| SyncError::WriteFailure(e.to_string()))
    }

    async fn subscribe_to_new_messages(
        &self,
        conversation_id: &str,
    ) -> creatorlink_sync::Result<Subscription> {
        Ok(self.feed.subscribe(conversation_id))
    }

    async fn fetch_sender_profile(&self, sender_id: &str) -> creatorlink_sync::Result<SenderProfile> {
        match self.profiles.get(sender_id).await {
            Ok(Some(profile)) => Ok(profile.into()),
            Ok(None) => Err(SyncError::ProfileResolutionFailure(format!(
                "No profile for {}",
                sender_id
            ))),
            Err(e) => Err(SyncError::ProfileResolutionFailure(e.to_string())),
        }
    }
}

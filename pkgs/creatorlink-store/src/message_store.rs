//! Message store - persistence, history and read marks

use chrono::{DateTime, Utc};
use creatorlink_sync::{LiveEvent, Message, SenderProfile};
use sea_orm::{
    prelude::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::entities::{conversations, messages, profiles};
use crate::error::{Result, StoreError};
use crate::from_millis;
use crate::live_feed::LiveFeed;
use crate::profile_store::Profile;

fn to_message(model: messages::Model, sender: Option<SenderProfile>) -> Message {
    Message {
        id: model.id,
        conversation_id: model.conversation_id,
        sender_id: model.sender_id,
        receiver_id: model.receiver_id,
        body: model.body,
        created_at: from_millis(model.created_at),
        read_at: model.read_at.map(from_millis),
        sender,
    }
}

/// Message store
#[derive(Clone)]
pub struct MessageStore {
    db: DatabaseConnection,
    feed: LiveFeed,
}

impl MessageStore {
    pub fn new(db: DatabaseConnection, feed: LiveFeed) -> Self {
        Self { db, feed }
    }

    /// Persist a new message and publish it on the live feed
    pub async fn send(
        &self,
        conversation_id: &str,
        sender_id: &str,
        receiver_id: &str,
        body: &str,
    ) -> Result<Message> {
        self.send_at(conversation_id, sender_id, receiver_id, body, Utc::now())
            .await
    }

    /// Like [`send`](Self::send) with an explicit creation time
    pub async fn send_at(
        &self,
        conversation_id: &str,
        sender_id: &str,
        receiver_id: &str,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Message> {
        if body.trim().is_empty() {
            return Err(StoreError::InvalidInput("Message body is empty".to_string()));
        }

        let conversation = conversations::Entity::find_by_id(conversation_id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Conversation {}", conversation_id)))?;

        let participants = [conversation.creator_id.as_str(), conversation.brand_id.as_str()];
        if sender_id == receiver_id
            || !participants.contains(&sender_id)
            || !participants.contains(&receiver_id)
        {
            return Err(StoreError::InvalidInput(format!(
                "{} -> {} is not a direction of conversation {}",
                sender_id, receiver_id, conversation_id
            )));
        }

        let model = messages::Model {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            body: body.to_string(),
            created_at: created_at.timestamp_millis(),
            read_at: None,
        };
        let active = messages::ActiveModel {
            id: Set(model.id.clone()),
            conversation_id: Set(model.conversation_id.clone()),
            sender_id: Set(model.sender_id.clone()),
            receiver_id: Set(model.receiver_id.clone()),
            body: Set(model.body.clone()),
            created_at: Set(model.created_at),
            read_at: Set(None),
        };
        messages::Entity::insert(active)
            .exec_without_returning(&self.db)
            .await?;

        let message = to_message(model, None);
        let delivered = self.feed.publish(&LiveEvent::insert(message.clone()));
        debug!(
            "Stored message {} in {} ({} live subscribers)",
            message.id, conversation_id, delivered
        );

        Ok(message)
    }

    /// All messages of a conversation, oldest first, with sender profiles attached
    ///
    /// Senders without a stored profile come back with `sender: None`; the thread
    /// synchronizer shows those with its unknown-sender placeholder.
    pub async fn history(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let rows = messages::Entity::find()
            .filter(messages::Column::ConversationId.eq(conversation_id))
            .order_by_asc(messages::Column::CreatedAt)
            .order_by_asc(messages::Column::Id)
            .all(&self.db)
            .await?;

        let mut sender_ids: Vec<String> = rows.iter().map(|m| m.sender_id.clone()).collect();
        sender_ids.sort();
        sender_ids.dedup();

        let senders: HashMap<String, SenderProfile> = if sender_ids.is_empty() {
            HashMap::new()
        } else {
            profiles::Entity::find()
                .filter(profiles::Column::Id.is_in(sender_ids))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|p| (p.id.clone(), Profile::from(p).into()))
                .collect()
        };

        Ok(rows
            .into_iter()
            .map(|m| {
                let sender = senders.get(&m.sender_id).cloned();
                to_message(m, sender)
            })
            .collect())
    }

    /// Stamp every unread message addressed to `viewer_id` as read
    ///
    /// Already read messages keep their timestamp. Returns the number of rows stamped.
    pub async fn mark_read(&self, conversation_id: &str, viewer_id: &str) -> Result<u64> {
        let now = Utc::now().timestamp_millis();
        let result = messages::Entity::update_many()
            .col_expr(messages::Column::ReadAt, Expr::value(now))
            .filter(messages::Column::ConversationId.eq(conversation_id))
            .filter(messages::Column::ReceiverId.eq(viewer_id))
            .filter(messages::Column::ReadAt.is_null())
            .exec(&self.db)
            .await?;

        if result.rows_affected > 0 {
            info!(
                "Marked {} messages read in {} for {}",
                result.rows_affected, conversation_id, viewer_id
            );
        }
        Ok(result.rows_affected)
    }
}

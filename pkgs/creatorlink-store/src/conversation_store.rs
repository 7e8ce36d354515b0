//! Conversation store - creator/brand threads and per-viewer summaries

use chrono::{DateTime, Utc};
use creatorlink_sync::{Conversation, ParticipantRole};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::entities::{conversations, messages, profiles};
use crate::error::{Result, StoreError};
use crate::from_millis;

/// Stored conversation row, independent of any viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub creator_id: String,
    pub brand_id: String,
    pub campaign_name: Option<String>,
    pub creator_archived_at: Option<DateTime<Utc>>,
    pub brand_archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ConversationRecord {
    /// Role `user_id` plays in this conversation, if any
    pub fn role_of(&self, user_id: &str) -> Option<ParticipantRole> {
        if self.creator_id == user_id {
            Some(ParticipantRole::Creator)
        } else if self.brand_id == user_id {
            Some(ParticipantRole::Brand)
        } else {
            None
        }
    }

    /// Id of the participant on the other side from `role`
    pub fn counterpart(&self, role: ParticipantRole) -> &str {
        match role {
            ParticipantRole::Creator => &self.brand_id,
            ParticipantRole::Brand => &self.creator_id,
        }
    }
}

impl From<conversations::Model> for ConversationRecord {
    fn from(model: conversations::Model) -> Self {
        Self {
            id: model.id,
            creator_id: model.creator_id,
            brand_id: model.brand_id,
            campaign_name: model.campaign_name,
            creator_archived_at: model.creator_archived_at.map(from_millis),
            brand_archived_at: model.brand_archived_at.map(from_millis),
            created_at: from_millis(model.created_at),
        }
    }
}

/// Conversation store
#[derive(Clone)]
pub struct ConversationStore {
    db: DatabaseConnection,
}

impl ConversationStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create the conversation between a creator and a brand
    ///
    /// There is at most one conversation per pair; an existing one is returned as is.
    pub async fn create(
        &self,
        creator_id: &str,
        brand_id: &str,
        campaign_name: Option<&str>,
    ) -> Result<String> {
        if creator_id.is_empty() || brand_id.is_empty() {
            return Err(StoreError::InvalidInput(
                "Participant id is empty".to_string(),
            ));
        }
        if creator_id == brand_id {
            return Err(StoreError::InvalidInput(
                "A conversation needs two distinct participants".to_string(),
            ));
        }

        let existing = conversations::Entity::find()
            .filter(conversations::Column::CreatorId.eq(creator_id))
            .filter(conversations::Column::BrandId.eq(brand_id))
            .one(&self.db)
            .await?;
        if let Some(existing) = existing {
            debug!(
                "Conversation between {} and {} already exists: {}",
                creator_id, brand_id, existing.id
            );
            return Ok(existing.id);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let model = conversations::ActiveModel {
            id: Set(id.clone()),
            creator_id: Set(creator_id.to_string()),
            brand_id: Set(brand_id.to_string()),
            campaign_name: Set(campaign_name.map(str::to_string)),
            creator_archived_at: Set(None),
            brand_archived_at: Set(None),
            created_at: Set(Utc::now().timestamp_millis()),
        };
        conversations::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await?;

        info!(
            "Created conversation {} between {} and {}",
            id, creator_id, brand_id
        );
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Result<Option<ConversationRecord>> {
        let conversation = conversations::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?;

        Ok(conversation.map(ConversationRecord::from))
    }

    /// Conversation summaries for a viewer, most recent activity first
    ///
    /// Archived conversations are included; the filter engine decides visibility.
    pub async fn list_for_viewer(
        &self,
        viewer_id: &str,
        role: ParticipantRole,
    ) -> Result<Vec<Conversation>> {
        let column = match role {
            ParticipantRole::Creator => conversations::Column::CreatorId,
            ParticipantRole::Brand => conversations::Column::BrandId,
        };
        let rows = conversations::Entity::find()
            .filter(column.eq(viewer_id))
            .all(&self.db)
            .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let record = ConversationRecord::from(row);
            summaries.push(self.summarize(&record, viewer_id, role).await?);
        }

        summaries.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(summaries)
    }

    async fn summarize(
        &self,
        record: &ConversationRecord,
        viewer_id: &str,
        role: ParticipantRole,
    ) -> Result<Conversation> {
        let counterpart_id = record.counterpart(role);
        let profile = profiles::Entity::find_by_id(counterpart_id.to_string())
            .one(&self.db)
            .await?;

        let last = messages::Entity::find()
            .filter(messages::Column::ConversationId.eq(record.id.as_str()))
            .order_by_desc(messages::Column::CreatedAt)
            .order_by_desc(messages::Column::Id)
            .one(&self.db)
            .await?;

        let unread = messages::Entity::find()
            .filter(messages::Column::ConversationId.eq(record.id.as_str()))
            .filter(messages::Column::ReceiverId.eq(viewer_id))
            .filter(messages::Column::ReadAt.is_null())
            .count(&self.db)
            .await?;

        let (participant_name, participant_handle, avatar_url) = match profile {
            Some(p) => (p.display_name, p.handle, p.avatar_url),
            None => (counterpart_id.to_string(), counterpart_id.to_string(), None),
        };
        let (last_message, last_message_at) = match last {
            Some(m) => (m.body, from_millis(m.created_at)),
            None => (String::new(), record.created_at),
        };

        Ok(Conversation {
            id: record.id.clone(),
            participant_name,
            participant_handle,
            avatar_url,
            last_message,
            last_message_at,
            unread: unread > 0,
            campaign_name: record.campaign_name.clone(),
            creator_archived_at: record.creator_archived_at,
            brand_archived_at: record.brand_archived_at,
        })
    }

    /// Archive or unarchive a conversation for one role only
    ///
    /// Archiving an already archived conversation keeps the original timestamp.
    pub async fn set_archived(
        &self,
        id: &str,
        role: ParticipantRole,
        archived: bool,
    ) -> Result<()> {
        let model = conversations::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Conversation {}", id)))?;

        let current = match role {
            ParticipantRole::Creator => model.creator_archived_at,
            ParticipantRole::Brand => model.brand_archived_at,
        };
        let next = match (archived, current) {
            (true, Some(at)) => Some(at),
            (true, None) => Some(Utc::now().timestamp_millis()),
            (false, _) => None,
        };
        if next == current {
            return Ok(());
        }

        let mut active: conversations::ActiveModel = model.into();
        match role {
            ParticipantRole::Creator => active.creator_archived_at = Set(next),
            ParticipantRole::Brand => active.brand_archived_at = Set(next),
        }
        active.update(&self.db).await?;

        info!(
            "Conversation {} {} for {}",
            id,
            if archived { "archived" } else { "unarchived" },
            role
        );
        Ok(())
    }
}

//! Profile store for participant display information

use creatorlink_sync::SenderProfile;
use sea_orm::{sea_query::OnConflict, DatabaseConnection, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::profiles;
use crate::error::{Result, StoreError};

/// Display profile of a creator or brand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    pub handle: String,
    pub avatar_url: Option<String>,
}

impl From<profiles::Model> for Profile {
    fn from(model: profiles::Model) -> Self {
        Self {
            id: model.id,
            display_name: model.display_name,
            handle: model.handle,
            avatar_url: model.avatar_url,
        }
    }
}

impl From<Profile> for SenderProfile {
    fn from(profile: Profile) -> Self {
        Self {
            display_name: profile.display_name,
            avatar_url: profile.avatar_url.unwrap_or_default(),
        }
    }
}

/// Profile store
#[derive(Clone)]
pub struct ProfileStore {
    db: DatabaseConnection,
}

impl ProfileStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a profile or replace the existing one with the same id
    pub async fn upsert(&self, profile: &Profile) -> Result<()> {
        if profile.id.trim().is_empty() {
            return Err(StoreError::InvalidInput("Profile id is empty".to_string()));
        }

        let model = profiles::ActiveModel {
            id: Set(profile.id.clone()),
            display_name: Set(profile.display_name.clone()),
            handle: Set(profile.handle.clone()),
            avatar_url: Set(profile.avatar_url.clone()),
            updated_at: Set(chrono::Utc::now().timestamp_millis()),
        };

        profiles::Entity::insert(model)
            .on_conflict(
                OnConflict::column(profiles::Column::Id)
                    .update_columns([
                        profiles::Column::DisplayName,
                        profiles::Column::Handle,
                        profiles::Column::AvatarUrl,
                        profiles::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        debug!("Saved profile {} ({})", profile.id, profile.display_name);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Profile>> {
        let profile = profiles::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?;

        Ok(profile.map(Profile::from))
    }
}

//! Creatorlink Store - persistent conversation storage
//!
//! SQLite storage for profiles, conversations and messages using Sea-ORM, plus an
//! in-process live feed that pushes newly sent messages to subscribers.
//!
//! # Architecture
//!
//! - **ProfileStore**: display profiles (name, handle, avatar)
//! - **ConversationStore**: creator/brand threads, per-viewer summaries, per-role archival
//! - **MessageStore**: message persistence, history, read marks; publishes inserts
//! - **LiveFeed**: per-conversation fan-out of live insert events
//! - **StoreBackend**: the [`creatorlink_sync::ChatBackend`] implementation over the above
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use creatorlink_store::{Store, StoreConfig};
//! use creatorlink_sync::{ParticipantRole, SyncConfig, ThreadSynchronizer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::open(StoreConfig {
//!     db_path: "creatorlink.db".into(),
//!     ..Default::default()
//! })
//! .await?;
//!
//! let inbox = store
//!     .conversations
//!     .list_for_viewer("creator-1", ParticipantRole::Creator)
//!     .await?;
//!
//! let (sync, _events) = ThreadSynchronizer::new(store.backend(), "creator-1", SyncConfig::default());
//! if let Some(first) = inbox.first() {
//!     sync.open(&first.id).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod conversation_store;
pub mod entities;
pub mod error;
pub mod live_feed;
pub mod message_store;
pub mod migration;
pub mod profile_store;

pub use backend::StoreBackend;
pub use conversation_store::{ConversationRecord, ConversationStore};
pub use error::{Result, StoreError};
pub use live_feed::LiveFeed;
pub use message_store::MessageStore;
pub use profile_store::{Profile, ProfileStore};

use chrono::{DateTime, Utc};
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Configuration for the store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,

    /// Buffered live events per subscriber before new ones are dropped (default: 256)
    pub live_channel_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("creatorlink.db"),
            live_channel_capacity: 256,
        }
    }
}

impl StoreConfig {
    pub fn database_url(&self) -> Result<String> {
        let path = self
            .db_path
            .to_str()
            .ok_or_else(|| StoreError::InvalidInput("Invalid database path".to_string()))?
            .replace('\\', "/");
        Ok(format!("sqlite:{}?mode=rwc", path))
    }
}

/// All stores sharing one connection and one live feed
pub struct Store {
    pub profiles: ProfileStore,
    pub conversations: ConversationStore,
    pub messages: MessageStore,
    feed: LiveFeed,
}

impl Store {
    /// Open (or create) the database and run migrations
    pub async fn open(config: StoreConfig) -> Result<Self> {
        let db = Database::connect(config.database_url()?.as_str()).await?;
        crate::migration::Migrator::up(&db, None).await?;

        info!("Store initialized at {}", config.db_path.display());
        Ok(Self::with_connection(db, &config))
    }

    /// Build the stores over an existing, already migrated connection
    pub fn with_connection(db: DatabaseConnection, config: &StoreConfig) -> Self {
        let feed = LiveFeed::new(config.live_channel_capacity);
        Self {
            profiles: ProfileStore::new(db.clone()),
            conversations: ConversationStore::new(db.clone()),
            messages: MessageStore::new(db, feed.clone()),
            feed,
        }
    }

    pub fn feed(&self) -> &LiveFeed {
        &self.feed
    }

    /// Backend handle for a [`creatorlink_sync::ThreadSynchronizer`]
    pub fn backend(&self) -> Arc<StoreBackend> {
        Arc::new(StoreBackend::new(
            self.messages.clone(),
            self.profiles.clone(),
            self.feed.clone(),
        ))
    }
}

pub(crate) fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

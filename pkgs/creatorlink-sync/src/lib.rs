//! Creatorlink Sync - conversation synchronization for the creator/brand marketplace
//!
//! This crate keeps a live, ordered view of one conversation's messages and derives the
//! grouped conversation list shown in the inbox.
//!
//! # Architecture
//!
//! - **bucket**: classifies timestamps into Today / Yesterday / This Week / Earlier
//! - **filter**: search and status predicates over conversation summaries, then grouping
//! - **thread**: ordered message list, deduplicated on message id
//! - **reconciler**: marks messages addressed to the viewer as read
//! - **synchronizer**: loads history, follows the live feed, drives the reconciler
//! - **backend**: the [`ChatBackend`] trait the hosting application implements
//!
//! The backend handle is always passed in explicitly; nothing in this crate holds a
//! global client.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use creatorlink_sync::{ChatBackend, SyncConfig, ThreadSynchronizer};
//!
//! # async fn example(backend: Arc<dyn ChatBackend>) -> Result<(), Box<dyn std::error::Error>> {
//! let (sync, _events) = ThreadSynchronizer::new(backend, "creator-1", SyncConfig::default());
//! sync.open("conversation-42").await?;
//! for message in sync.messages() {
//!     println!("{}: {}", message.sender_name(), message.body);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod bucket;
pub mod error;
pub mod filter;
pub mod models;
pub mod reconciler;
pub mod synchronizer;
pub mod thread;

pub use backend::{ChatBackend, Subscription, SubscriptionHandle};
pub use bucket::{classify, classify_with_week_start, format_label, TimeBucket};
pub use error::{Result, SyncError};
pub use filter::{
    filter_and_group, filter_conversations, group_conversations, ConversationGroup,
    StatusFilter,
};
pub use models::{
    Conversation, LiveEvent, LiveEventKind, Message, ParticipantRole, SenderProfile,
};
pub use reconciler::{ReadStateReconciler, ReconcileOutcome};
pub use synchronizer::{LoadOutcome, ThreadEvent, ThreadState, ThreadSynchronizer};
pub use thread::MessageThread;

use chrono::Weekday;

/// Configuration for the synchronization core
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// First day of the calendar week used by the "This Week" bucket (default: Sunday)
    pub week_start: Weekday,

    /// Display name used when a sender profile cannot be resolved
    pub unknown_sender_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            week_start: Weekday::Sun,
            unknown_sender_name: "Unknown User".to_string(),
        }
    }
}

//! Error types for conversation synchronization

use thiserror::Error;

/// Errors that can occur while synchronizing a conversation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Failed to load messages: {0}")]
    LoadFailure(String),
    #[error("Failed to update read state: {0}")]
    WriteFailure(String),
    #[error("Failed to resolve sender profile: {0}")]
    ProfileResolutionFailure(String),
    #[error("Live updates unavailable: {0}")]
    SubscriptionFailure(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

//! Conversation and message data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Which side of the marketplace a participant is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Creator,
    Brand,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Creator => "creator",
            ParticipantRole::Brand => "brand",
        }
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "creator" => Ok(ParticipantRole::Creator),
            "brand" => Ok(ParticipantRole::Brand),
            other => Err(format!("Unknown participant role: {}", other)),
        }
    }
}

/// Conversation summary as seen by one viewer
///
/// A conversation is a durable thread between exactly one creator and one brand.
/// The participant fields describe the *other* side from the viewer's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub participant_name: String,
    pub participant_handle: String,
    pub avatar_url: Option<String>,
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
    /// Relative to the current viewer
    pub unread: bool,
    pub campaign_name: Option<String>,
    pub creator_archived_at: Option<DateTime<Utc>>,
    pub brand_archived_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// Archival timestamp for the given role
    pub fn archived_at(&self, role: ParticipantRole) -> Option<DateTime<Utc>> {
        match role {
            ParticipantRole::Creator => self.creator_archived_at,
            ParticipantRole::Brand => self.brand_archived_at,
        }
    }

    /// Archival is per role: one side archiving does not archive it for the other
    pub fn is_archived_for(&self, role: ParticipantRole) -> bool {
        self.archived_at(role).is_some()
    }
}

/// Sender display profile, resolved at read time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderProfile {
    pub display_name: String,
    pub avatar_url: String,
}

impl SenderProfile {
    /// Stand-in used when a profile lookup fails
    pub fn placeholder(display_name: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            avatar_url: String::new(),
        }
    }
}

/// A single directed message within a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    /// Denormalized sender profile; absent on raw live payloads
    pub sender: Option<SenderProfile>,
}

impl Message {
    /// True if addressed to `viewer_id` and not yet read
    pub fn is_unread_for(&self, viewer_id: &str) -> bool {
        self.receiver_id == viewer_id && self.read_at.is_none()
    }

    /// Set the read timestamp once; later calls keep the first value
    pub fn mark_read(&mut self, at: DateTime<Utc>) -> bool {
        if self.read_at.is_some() {
            return false;
        }
        self.read_at = Some(at);
        true
    }

    pub fn sender_name(&self) -> &str {
        self.sender
            .as_ref()
            .map(|p| p.display_name.as_str())
            .unwrap_or_default()
    }

    /// Thread order: creation time ascending, ties broken by id
    pub fn thread_order(a: &Message, b: &Message) -> Ordering {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Kind of change reported by the live feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiveEventKind {
    Insert,
    Update,
    Delete,
}

/// Notification that a message row changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveEvent {
    pub kind: LiveEventKind,
    pub message: Message,
}

impl LiveEvent {
    pub fn insert(message: Message) -> Self {
        Self {
            kind: LiveEventKind::Insert,
            message,
        }
    }
}

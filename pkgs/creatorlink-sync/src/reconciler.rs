//! Read-state reconciliation against the persistence service

use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::ChatBackend;
use crate::error::SyncError;

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing addressed to the viewer was unread; no write issued
    Skipped,
    /// The write went through for this many known-unread messages
    Marked { count: usize },
    /// The write failed; local state is left as it was
    Failed(SyncError),
}

/// Marks messages addressed to the viewer as read
///
/// The caller supplies the ids it knows to be unread. An empty list skips the write
/// entirely, which keeps repeated passes from issuing duplicate updates.
#[derive(Clone)]
pub struct ReadStateReconciler {
    backend: Arc<dyn ChatBackend>,
}

impl ReadStateReconciler {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub async fn reconcile(
        &self,
        conversation_id: &str,
        viewer_id: &str,
        pending: &[String],
    ) -> ReconcileOutcome {
        if pending.is_empty() {
            debug!(
                "No unread messages for {} in {}, skipping read update",
                viewer_id, conversation_id
            );
            return ReconcileOutcome::Skipped;
        }

        match self
            .backend
            .mark_messages_read(conversation_id, viewer_id)
            .await
        {
            Ok(()) => {
                debug!(
                    "Marked {} message(s) read for {} in {}",
                    pending.len(),
                    viewer_id,
                    conversation_id
                );
                ReconcileOutcome::Marked {
                    count: pending.len(),
                }
            }
            Err(e) => {
                warn!(
                    "Failed to mark messages read in {} for {}: {}",
                    conversation_id, viewer_id, e
                );
                ReconcileOutcome::Failed(e)
            }
        }
    }
}

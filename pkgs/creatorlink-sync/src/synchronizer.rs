//! Message thread synchronizer
//!
//! One synchronizer follows one open conversation at a time:
//!
//! ```text
//! Idle -> Loading -> Ready
//!                 -> Error
//! ```
//!
//! Opening a conversation subscribes to its live feed first and then fetches the
//! history, so an insert landing between the two is still seen; any overlap is absorbed
//! by id deduplication in [`MessageThread`]. Each open bumps a generation counter and
//! every asynchronous step re-checks it before touching state, so a slow load for a
//! conversation the viewer has already left is dropped on completion.

use chrono::Utc;
use futures::channel::mpsc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc as live;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{ChatBackend, SubscriptionHandle};
use crate::error::{Result, SyncError};
use crate::models::{LiveEvent, LiveEventKind, Message, SenderProfile};
use crate::reconciler::{ReadStateReconciler, ReconcileOutcome};
use crate::thread::MessageThread;
use crate::SyncConfig;

/// Lifecycle state of the open thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadState {
    Idle,
    Loading,
    Ready,
    Error,
}

/// Change notifications emitted by the synchronizer
#[derive(Debug, Clone, PartialEq)]
pub enum ThreadEvent {
    StateChanged {
        conversation_id: Option<String>,
        state: ThreadState,
    },
    MessageAppended {
        conversation_id: String,
        message_id: String,
    },
    DuplicateIgnored {
        conversation_id: String,
        message_id: String,
    },
    ReadMarked {
        conversation_id: String,
        count: usize,
    },
    ReadFailed {
        conversation_id: String,
        error: SyncError,
    },
    /// Live updates are not (or no longer) available; history stays usable
    LiveUnavailable {
        conversation_id: String,
        error: SyncError,
    },
}

/// Result of a completed open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Ready { messages: usize },
    /// Another conversation was opened (or the thread closed) while this load ran
    Superseded,
}

struct Inner {
    generation: u64,
    conversation_id: Option<String>,
    state: ThreadState,
    thread: MessageThread,
    live_available: bool,
    last_error: Option<SyncError>,
    subscription: Option<SubscriptionHandle>,
    live_task: Option<JoinHandle<()>>,
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Drop the live feed of whatever was open before
    fn teardown(&mut self) {
        if let Some(task) = self.live_task.take() {
            task.abort();
        }
        if let Some(handle) = self.subscription.take() {
            debug!("Unsubscribing from {}", handle.conversation_id());
        }
        self.live_available = false;
    }
}

struct Shared {
    backend: Arc<dyn ChatBackend>,
    reconciler: ReadStateReconciler,
    viewer_id: String,
    config: SyncConfig,
    inner: Mutex<Inner>,
    event_sender: mpsc::UnboundedSender<ThreadEvent>,
}

impl Shared {
    fn send_event(&self, event: ThreadEvent) {
        if let Err(e) = self.event_sender.unbounded_send(event) {
            debug!("Thread event dropped, no listener: {}", e);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.lock().is_current(generation)
    }

    /// Start a new generation for `conversation_id` (or for nothing, when closing)
    fn begin(&self, conversation_id: Option<&str>) -> u64 {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.teardown();
        inner.conversation_id = conversation_id.map(str::to_string);
        inner.thread = MessageThread::new();
        inner.last_error = None;
        inner.state = if conversation_id.is_some() {
            ThreadState::Loading
        } else {
            ThreadState::Idle
        };
        self.send_event(ThreadEvent::StateChanged {
            conversation_id: inner.conversation_id.clone(),
            state: inner.state,
        });
        inner.generation
    }

    async fn load(
        self: &Arc<Self>,
        generation: u64,
        conversation_id: &str,
    ) -> Result<LoadOutcome> {
        let subscription = self
            .backend
            .subscribe_to_new_messages(conversation_id)
            .await;

        if !self.is_current(generation) {
            debug!("Open of {} superseded before history fetch", conversation_id);
            return Ok(LoadOutcome::Superseded);
        }

        let history = self
            .backend
            .fetch_conversation_messages(conversation_id)
            .await;

        let (count, pending) = {
            let mut inner = self.inner.lock();
            if !inner.is_current(generation) {
                debug!("Discarding stale history for {}", conversation_id);
                return Ok(LoadOutcome::Superseded);
            }

            match history {
                Err(e) => {
                    warn!("Failed to load conversation {}: {}", conversation_id, e);
                    inner.state = ThreadState::Error;
                    inner.thread = MessageThread::new();
                    inner.last_error = Some(e.clone());
                    self.send_event(ThreadEvent::StateChanged {
                        conversation_id: Some(conversation_id.to_string()),
                        state: ThreadState::Error,
                    });
                    return Err(e);
                }
                Ok(mut messages) => {
                    for message in messages.iter_mut().filter(|m| m.sender.is_none()) {
                        message.sender = Some(SenderProfile::placeholder(
                            &self.config.unknown_sender_name,
                        ));
                    }
                    inner.thread = MessageThread::from_history(messages);
                    inner.state = ThreadState::Ready;
                    self.send_event(ThreadEvent::StateChanged {
                        conversation_id: Some(conversation_id.to_string()),
                        state: ThreadState::Ready,
                    });

                    match subscription {
                        Ok(subscription) => {
                            let (handle, events) = subscription.split();
                            inner.subscription = Some(handle);
                            inner.live_available = true;
                            inner.live_task = Some(tokio::spawn(
                                self.clone().follow(generation, events),
                            ));
                        }
                        Err(e) => {
                            warn!(
                                "Live updates unavailable for {}: {}",
                                conversation_id, e
                            );
                            inner.live_available = false;
                            self.send_event(ThreadEvent::LiveUnavailable {
                                conversation_id: conversation_id.to_string(),
                                error: e,
                            });
                        }
                    }

                    (inner.thread.len(), inner.thread.unread_ids_for(&self.viewer_id))
                }
            }
        };

        info!(
            "Loaded {} message(s) for conversation {}",
            count, conversation_id
        );
        self.reconcile(generation, conversation_id, pending).await;

        Ok(LoadOutcome::Ready { messages: count })
    }

    /// Drain the live feed until it closes or the generation moves on
    async fn follow(self: Arc<Self>, generation: u64, mut events: live::Receiver<LiveEvent>) {
        while let Some(event) = events.recv().await {
            if !self.is_current(generation) {
                return;
            }
            self.receive(generation, event).await;
        }

        let mut inner = self.inner.lock();
        if inner.is_current(generation) {
            inner.live_available = false;
            if let Some(conversation_id) = inner.conversation_id.clone() {
                warn!("Live feed for {} closed", conversation_id);
                self.send_event(ThreadEvent::LiveUnavailable {
                    conversation_id,
                    error: SyncError::SubscriptionFailure("live feed closed".to_string()),
                });
            }
        }
    }

    async fn receive(&self, generation: u64, event: LiveEvent) {
        if event.kind != LiveEventKind::Insert {
            debug!("Ignoring {:?} event for {}", event.kind, event.message.id);
            return;
        }

        let conversation_id = {
            let inner = self.inner.lock();
            let conversation_id = match inner.conversation_id.as_deref() {
                Some(open) if open == event.message.conversation_id => open.to_string(),
                _ => {
                    debug!(
                        "Ignoring live message {} for conversation {}",
                        event.message.id, event.message.conversation_id
                    );
                    return;
                }
            };

            // Known ids skip the profile lookup; `append` below stays the real check
            if inner.thread.contains(&event.message.id) {
                debug!("Duplicate live message {} ignored", event.message.id);
                self.send_event(ThreadEvent::DuplicateIgnored {
                    conversation_id,
                    message_id: event.message.id,
                });
                return;
            }
            conversation_id
        };

        let mut message = event.message;
        if message.sender.is_none() {
            message.sender = Some(self.resolve_sender(&message.sender_id).await);
        }

        let pending = {
            let mut inner = self.inner.lock();
            if !inner.is_current(generation) {
                return;
            }

            let message_id = message.id.clone();
            let addressed_to_viewer = message.is_unread_for(&self.viewer_id);
            if !inner.thread.append(message) {
                debug!("Duplicate live message {} ignored", message_id);
                self.send_event(ThreadEvent::DuplicateIgnored {
                    conversation_id,
                    message_id,
                });
                return;
            }

            debug!("Appended live message {} to {}", message_id, conversation_id);
            self.send_event(ThreadEvent::MessageAppended {
                conversation_id: conversation_id.clone(),
                message_id: message_id.clone(),
            });

            if addressed_to_viewer {
                vec![message_id]
            } else {
                Vec::new()
            }
        };

        if !pending.is_empty() {
            self.reconcile(generation, &conversation_id, pending).await;
        }
    }

    async fn resolve_sender(&self, sender_id: &str) -> SenderProfile {
        match self.backend.fetch_sender_profile(sender_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Using placeholder profile for sender {}: {}", sender_id, e);
                SenderProfile::placeholder(&self.config.unknown_sender_name)
            }
        }
    }

    async fn reconcile(&self, generation: u64, conversation_id: &str, pending: Vec<String>) {
        let outcome = self
            .reconciler
            .reconcile(conversation_id, &self.viewer_id, &pending)
            .await;

        match outcome {
            ReconcileOutcome::Skipped => {}
            ReconcileOutcome::Marked { .. } => {
                let mut inner = self.inner.lock();
                if inner.is_current(generation) {
                    let count = inner.thread.mark_read(&pending, Utc::now());
                    self.send_event(ThreadEvent::ReadMarked {
                        conversation_id: conversation_id.to_string(),
                        count,
                    });
                }
            }
            ReconcileOutcome::Failed(error) => {
                self.send_event(ThreadEvent::ReadFailed {
                    conversation_id: conversation_id.to_string(),
                    error,
                });
            }
        }
    }
}

/// Keeps the open conversation's message list in sync with the backend
pub struct ThreadSynchronizer {
    shared: Arc<Shared>,
}

impl ThreadSynchronizer {
    /// Create a synchronizer for `viewer_id`, returning it with its event receiver
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        viewer_id: impl Into<String>,
        config: SyncConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ThreadEvent>) {
        let (event_sender, event_receiver) = mpsc::unbounded();
        let shared = Arc::new(Shared {
            reconciler: ReadStateReconciler::new(backend.clone()),
            backend,
            viewer_id: viewer_id.into(),
            config,
            inner: Mutex::new(Inner {
                generation: 0,
                conversation_id: None,
                state: ThreadState::Idle,
                thread: MessageThread::new(),
                live_available: false,
                last_error: None,
                subscription: None,
                live_task: None,
            }),
            event_sender,
        });

        (Self { shared }, event_receiver)
    }

    /// Open a conversation, replacing whatever was open
    ///
    /// Returns `LoadOutcome::Superseded` if another open or a close happened before
    /// this load finished. A load failure leaves the thread in `ThreadState::Error`.
    pub async fn open(&self, conversation_id: &str) -> Result<LoadOutcome> {
        info!(
            "Opening conversation {} for {}",
            conversation_id, self.shared.viewer_id
        );
        let generation = self.shared.begin(Some(conversation_id));
        self.shared.load(generation, conversation_id).await
    }

    /// Re-open the current conversation after a failed load
    pub async fn retry(&self) -> Result<LoadOutcome> {
        let conversation_id = self
            .conversation_id()
            .ok_or_else(|| SyncError::LoadFailure("No conversation selected".to_string()))?;
        self.open(&conversation_id).await
    }

    /// Close the open conversation, tearing down its live feed
    pub fn close(&self) {
        if let Some(conversation_id) = self.conversation_id() {
            info!("Closing conversation {}", conversation_id);
        }
        self.shared.begin(None);
    }

    pub fn viewer_id(&self) -> &str {
        &self.shared.viewer_id
    }

    pub fn state(&self) -> ThreadState {
        self.shared.inner.lock().state
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.shared.inner.lock().conversation_id.clone()
    }

    /// Snapshot of the thread in display order
    pub fn messages(&self) -> Vec<Message> {
        self.shared.inner.lock().thread.messages().to_vec()
    }

    pub fn live_available(&self) -> bool {
        self.shared.inner.lock().live_available
    }

    /// The error behind `ThreadState::Error`, if any
    pub fn last_error(&self) -> Option<SyncError> {
        self.shared.inner.lock().last_error.clone()
    }
}

impl Drop for ThreadSynchronizer {
    fn drop(&mut self) {
        self.shared.inner.lock().teardown();
    }
}

//! Event system for attribution runs
//!
//! Every computation announces what it resolved, which pass won, who was
//! dropped and what was allocated. Listeners use this for audit trails;
//! the engine does not persist results itself.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::attribution::{AttributionPass, DropReason};

/// Events emitted by the attribution service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributionEvent {
    LineageResolved {
        meme_id: String,
        total_count: u32,
    },
    PassSelected {
        meme_id: String,
        pass: Option<AttributionPass>,
        contributors: usize,
    },
    ContributorDropped {
        meme_id: String,
        user_id: String,
        reason: DropReason,
    },
    DistributionComputed {
        meme_id: String,
        pass: Option<AttributionPass>,
        recipients: usize,
        allocated_units: u64,
        pool_units: u64,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &AttributionEvent);
}

/// Event bus for broadcasting attribution events
pub struct EventBus {
    sender: broadcast::Sender<AttributionEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: AttributionEvent) {
        trace!(event = ?event, "Emitting attribution event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<AttributionEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &AttributionEvent) {
        match event {
            AttributionEvent::DistributionComputed {
                meme_id,
                pass,
                recipients,
                allocated_units,
                pool_units,
            } => {
                info!(
                    meme_id = %meme_id,
                    pass = ?pass,
                    recipients,
                    allocated_units,
                    pool_units,
                    "Distribution computed"
                );
            }
            // The address join already warned with the offending value
            AttributionEvent::ContributorDropped { meme_id, user_id, reason } => {
                debug!(meme_id = %meme_id, user_id = %user_id, reason = %reason, "Contributor dropped from distribution");
            }
            AttributionEvent::PassSelected { meme_id, pass, contributors } => {
                debug!(meme_id = %meme_id, pass = ?pass, contributors, "Attribution pass selected");
            }
            _ => {
                trace!(event = ?event, "Attribution event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

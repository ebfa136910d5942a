//! Store change notifications
//!
//! Lets presenters redraw when a seller's records change without polling
//! the store.

use tokio::sync::broadcast;

/// Pending events kept per subscriber before the slowest one lags
const CHANNEL_CAPACITY: usize = 64;

/// Events emitted by the KPI store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataEvent {
    /// A fetch response was applied for this seller
    RecordsLoaded(String),
    /// A single record was upserted for this seller
    RecordSaved(String),
    /// A response arrived after a newer request for the same seller
    StaleResponseDiscarded { seller: String, token: u64 },
}

/// Fan-out of [`DataEvent`]s to any number of subscribers
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DataEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl EventBus {
    /// Fire and forget; an event nobody listens to is dropped
    pub fn publish(&self, event: DataEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DataEvent> {
        self.sender.subscribe()
    }
}

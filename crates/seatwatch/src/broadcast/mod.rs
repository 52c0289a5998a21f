//! Fan-out of seat deltas to every connected viewer.
//!
//! Best effort: events go to whoever is subscribed at send time, and
//! nothing is kept for clients that connect later.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::sync::SeatDelta;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum BroadcastEvent {
    SeatUpdates {
        timestamp: DateTime<Utc>,
        updates: Vec<SeatDelta>,
    },
    #[serde(rename_all = "camelCase")]
    SyncComplete {
        timestamp: DateTime<Utc>,
        total_sections: usize,
        updated_sections: usize,
    },
}

impl BroadcastEvent {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<BroadcastEvent>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        info!("Broadcaster initialized with capacity {capacity}");
        Self { tx }
    }

    /// Pushes one batch of deltas. An empty batch sends nothing.
    pub fn broadcast_seat_update(&self, deltas: &[SeatDelta]) {
        if deltas.is_empty() {
            return;
        }

        self.send(BroadcastEvent::SeatUpdates {
            timestamp: Utc::now(),
            updates: deltas.to_vec(),
        });
    }

    pub fn broadcast_sync_complete(&self, total_sections: usize, updated_sections: usize) {
        self.send(BroadcastEvent::SyncComplete {
            timestamp: Utc::now(),
            total_sections,
            updated_sections,
        });
    }

    fn send(&self, event: BroadcastEvent) {
        // No receivers is not an error.
        match self.tx.send(event) {
            Ok(count) => debug!("Broadcast event to {count} clients"),
            Err(_) => debug!("Broadcast dropped, no clients connected"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

//! Domain events emitted by the stock engine.
//!
//! Events are fired after the owning transaction commits; consumers must not
//! rely on them for correctness, only for notification and audit trails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    PickingCreated {
        picking_id: i64,
        name: String,
    },
    PickingReserved {
        picking_id: i64,
    },
    PickingCommitted {
        picking_id: i64,
        picking_type: String,
        project_id: Option<i64>,
        /// Correlation reference for downstream consumers.
        commit_ref: Uuid,
        date_done: DateTime<Utc>,
    },
    PickingCancelled {
        picking_id: i64,
    },
    PickingReturnedToDraft {
        picking_id: i64,
    },
    PickingDeleted {
        picking_id: i64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, logging instead of failing when the channel is gone.
    /// Events fire after commit, so a send failure must never unwind stock.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!(error = %e, "event channel closed; dropping domain event");
        }
    }
}

/// Consumes the event channel for the lifetime of the process.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        info!(?event, "domain event");
    }
}

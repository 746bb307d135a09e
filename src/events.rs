use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::snapshot::Snapshot;

/// Where a board replacement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOrigin {
    Local,
    Remote,
    Cache,
}

/// Notification fanned out to subscribers whenever the collection changes.
/// Carries no trip data; renderers re-query the list on receipt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardEvent {
    pub origin: ChangeOrigin,
    pub revision: String,
    pub trips: usize,
    pub at: DateTime<Utc>,
}

impl BoardEvent {
    pub fn for_snapshot(origin: ChangeOrigin, snapshot: &Snapshot) -> Self {
        BoardEvent {
            origin,
            revision: snapshot.revision.clone(),
            trips: snapshot.trips.len(),
            at: Utc::now(),
        }
    }
}

/// Broadcast fan-out for board changes. Slow or absent subscribers never
/// block the mutation path.
#[derive(Debug, Clone)]
pub struct BoardEvents {
    sender: broadcast::Sender<BoardEvent>,
}

impl BoardEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        BoardEvents { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: BoardEvent) {
        // send only errors when nobody is subscribed
        let _ = self.sender.send(event);
    }
}

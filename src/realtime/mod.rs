//! In-process change feed.
//!
//! Handlers publish a [`ChangeEvent`] after every successful write to a ride
//! or rental row; SSE subscribers receive the events matching their filter.
//! Delivery is best effort: a subscriber that falls behind the channel
//! capacity skips the events it missed.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Rides,
    CarRentals,
    Drivers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub record_id: Uuid,
    /// The row after the change (or before it, for deletes)
    pub record: serde_json::Value,
}

impl ChangeEvent {
    pub fn new<T: Serialize>(table: Table, kind: ChangeKind, record_id: Uuid, record: &T) -> Self {
        Self {
            table,
            kind,
            record_id,
            record: serde_json::to_value(record).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Which events a subscriber wants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: Table,
    pub record_id: Option<Uuid>,
}

impl ChangeFilter {
    pub fn table(table: Table) -> Self {
        Self {
            table,
            record_id: None,
        }
    }

    pub fn row(table: Table, record_id: Uuid) -> Self {
        Self {
            table,
            record_id: Some(record_id),
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.table == self.table && self.record_id.is_none_or(|id| id == event.record_id)
    }
}

#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: ChangeEvent) {
        let receivers = self.sender.send(event).unwrap_or(0);
        tracing::trace!(receivers, "Change event published");
    }

    pub fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    filter: ChangeFilter,
}

impl Subscription {
    /// Next matching event, or `None` once the feed is gone
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Realtime subscriber lagged, events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ride_event(id: Uuid, kind: ChangeKind) -> ChangeEvent {
        ChangeEvent::new(Table::Rides, kind, id, &json!({ "id": id, "status": "accepted" }))
    }

    #[tokio::test]
    async fn row_subscription_only_sees_its_row() {
        let feed = ChangeFeed::new();
        let watched = Uuid::new_v4();
        let mut sub = feed.subscribe(ChangeFilter::row(Table::Rides, watched));

        feed.publish(ride_event(Uuid::new_v4(), ChangeKind::Update));
        feed.publish(ChangeEvent::new(Table::CarRentals, ChangeKind::Insert, watched, &json!({})));
        feed.publish(ride_event(watched, ChangeKind::Update));

        let event = sub.next().await.unwrap();
        assert_eq!(event.record_id, watched);
        assert_eq!(event.table, Table::Rides);
        assert_eq!(event.record["status"], "accepted");
    }

    #[tokio::test]
    async fn table_subscription_sees_every_row() {
        let feed = ChangeFeed::new();
        let mut sub = feed.subscribe(ChangeFilter::table(Table::Rides));
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        feed.publish(ride_event(a, ChangeKind::Insert));
        feed.publish(ride_event(b, ChangeKind::Update));

        assert_eq!(sub.next().await.unwrap().record_id, a);
        assert_eq!(sub.next().await.unwrap().kind, ChangeKind::Update);
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_fine() {
        let feed = ChangeFeed::new();
        assert_eq!(feed.subscriber_count(), 0);
        feed.publish(ride_event(Uuid::new_v4(), ChangeKind::Delete));
    }

    #[tokio::test]
    async fn subscription_ends_when_feed_is_dropped() {
        let feed = ChangeFeed::new();
        let mut sub = feed.subscribe(ChangeFilter::table(Table::Drivers));
        drop(feed);
        assert!(sub.next().await.is_none());
    }
}

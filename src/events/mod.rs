use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::workflow::{EntityKind, UserRole};

/// Notifications published after a command commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    OrderPlaced {
        order_id: Uuid,
        customer_id: Uuid,
        delivery_id: Option<Uuid>,
    },
    StatusChanged {
        audit_id: i64,
        entity: EntityKind,
        entity_id: Uuid,
        from_status: Option<String>,
        to_status: String,
        actor_id: Uuid,
        actor_role: UserRole,
        at: DateTime<Utc>,
    },
    AssigneeChanged {
        entity: EntityKind,
        entity_id: Uuid,
        assignee_id: Option<Uuid>,
        previous_assignee_id: Option<Uuid>,
    },
    HarvestProgressRecorded {
        request_id: Uuid,
        progress: i32,
        updated_by: Uuid,
    },
}

impl Event {
    pub fn entity_id(&self) -> Uuid {
        match self {
            Event::OrderPlaced { order_id, .. } => *order_id,
            Event::StatusChanged { entity_id, .. } | Event::AssigneeChanged { entity_id, .. } => {
                *entity_id
            }
            Event::HarvestProgressRecorded { request_id, .. } => *request_id,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
    fanout: broadcast::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>, fanout: broadcast::Sender<Event>) -> Self {
        Self { sender, fanout }
    }

    /// Attaches a subscriber that sees every event after the processor logs it.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.fanout.subscribe()
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends and logs on failure. Commands have already committed when this runs.
    pub async fn send_or_log(&self, event: Event) {
        let entity_id = event.entity_id();
        if let Err(e) = self.send(event).await {
            warn!(%entity_id, "event dropped: {}", e);
        }
    }
}

/// Creates the event channel pair plus the fan-out used by subscribers.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>, broadcast::Sender<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    let (fanout, _) = broadcast::channel(capacity);
    (EventSender::new(tx, fanout.clone()), rx, fanout)
}

/// Drains the event channel, logging each event and forwarding it to subscribers.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, fanout: broadcast::Sender<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::StatusChanged {
                entity,
                entity_id,
                from_status,
                to_status,
                actor_id,
                ..
            } => info!(
                %entity,
                %entity_id,
                from = from_status.as_deref().unwrap_or("-"),
                to = %to_status,
                %actor_id,
                "status changed"
            ),
            Event::AssigneeChanged {
                entity,
                entity_id,
                assignee_id,
                ..
            } => info!(%entity, %entity_id, assignee = ?assignee_id, "assignee changed"),
            Event::OrderPlaced {
                order_id,
                customer_id,
                ..
            } => info!(%order_id, %customer_id, "order placed"),
            Event::HarvestProgressRecorded {
                request_id,
                progress,
                ..
            } => info!(%request_id, progress, "harvest progress recorded"),
        }

        if fanout.send(event).is_err() {
            debug!("no event subscribers");
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_subscribers() {
        let (sender, rx, fanout) = channel(8);
        let mut subscriber = sender.subscribe();
        let handle = tokio::spawn(process_events(rx, fanout));

        let order_id = Uuid::new_v4();
        sender
            .send(Event::OrderPlaced {
                order_id,
                customer_id: Uuid::new_v4(),
                delivery_id: None,
            })
            .await
            .unwrap();

        let received = subscriber.recv().await.unwrap();
        assert_eq!(received.entity_id(), order_id);

        drop(sender);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn send_fails_once_processor_is_gone() {
        let (sender, rx, _fanout) = channel(1);
        drop(rx);
        let result = sender
            .send(Event::HarvestProgressRecorded {
                request_id: Uuid::new_v4(),
                progress: 10,
                updated_by: Uuid::new_v4(),
            })
            .await;
        assert!(result.is_err());
    }
}

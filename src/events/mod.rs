use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the services after a successful write. Delivery here is
/// log-only; external fan-out (notifications, webhooks) is a collaborator
/// concern and lives outside this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderUpdated(Uuid),
    OrderDeleted(Uuid),
    OrderPaid(Uuid),
    OrderCompleted(Uuid),

    // Catalog / staff events
    FrameCreated(Uuid),
    EmployeeCreated(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates a bounded event channel pair.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Consumes events until every sender is dropped. Runs as a background task
/// spawned at startup.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processor started");

    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(id) => info!(order_id = %id, "Order created"),
            Event::OrderUpdated(id) => info!(order_id = %id, "Order updated"),
            Event::OrderDeleted(id) => info!(order_id = %id, "Order deleted"),
            Event::OrderPaid(id) => info!(order_id = %id, "Order paid"),
            Event::OrderCompleted(id) => info!(order_id = %id, "Order completed"),
            Event::FrameCreated(id) => info!(frame_id = %id, "Frame created"),
            Event::EmployeeCreated(id) => info!(employee_id = %id, "Employee created"),
        }
    }

    warn!("Event channel closed; processor shutting down");
}

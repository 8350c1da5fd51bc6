use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the services after their writes commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderPaid(Uuid),
    OrderDelivered(Uuid),
    OrderDeleted(Uuid),
    /// Cached views of this order are stale.
    OrderInvalidated(Uuid),
    CartCleared(Uuid),
    CartClaimed { cart_id: Uuid, user_id: Uuid },
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

    /// Sends an event, logging instead of failing when nobody is listening.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropped domain event");
        }
    }
}

/// Builds a sender and the receiver to hand to [`process_events`].
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender::new(tx), rx)
}

/// Consumes events until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");
    while let Some(event) = rx.recv().await {
        match event {
            Event::OrderCreated(order_id) => info!(order_id = %order_id, "order created"),
            Event::OrderPaid(order_id) => info!(order_id = %order_id, "order paid"),
            Event::OrderDelivered(order_id) => info!(order_id = %order_id, "order delivered"),
            Event::OrderDeleted(order_id) => info!(order_id = %order_id, "order deleted"),
            Event::OrderInvalidated(order_id) => {
                info!(order_id = %order_id, "order views invalidated")
            }
            Event::CartCleared(cart_id) => info!(cart_id = %cart_id, "cart cleared"),
            Event::CartClaimed { cart_id, user_id } => {
                info!(cart_id = %cart_id, user_id = %user_id, "session cart claimed")
            }
        }
    }
    info!("Event processing loop stopped");
}

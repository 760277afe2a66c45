use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

pub mod side_effects;

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

    /// Sends an event, logging instead of failing when the channel is gone.
    /// Event emission is observational and must never fail a request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartCreated(Uuid),
    CartItemAdded { cart_id: Uuid, product_id: Uuid },
    CartItemRemoved { cart_id: Uuid, item_id: Uuid },
    CartBookingSet { cart_id: Uuid, service_id: Uuid },
    CartCheckedOut(Uuid),
    CartAbandoned(Uuid),

    // Checkout events
    CheckoutStarted { cart_id: Uuid, session_id: Uuid },
    CheckoutCompleted { session_id: Uuid, payment_id: String },

    // Payment events
    PaymentCaptured { session_id: Uuid, payment_id: String },
    PaymentPending { session_id: Uuid, payment_id: String },
    PaymentFailed { session_id: Uuid },

    // Materialization events
    OrderCreated(Uuid),
    BookingCreated(Uuid),

    // Calendar sync events
    BookingCalendarSynced { booking_id: Uuid, event_id: String },
    BookingCalendarSyncSkipped { booking_id: Uuid },
    BookingCalendarSyncFailed { booking_id: Uuid },
}

// Process incoming events. This consumer only records them; durable work
// runs through the side-effect queue instead.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::CheckoutCompleted {
                session_id,
                ref payment_id,
            } => {
                info!(%session_id, %payment_id, "checkout completed");
            }
            Event::PaymentFailed { session_id } => {
                warn!(%session_id, "payment failed");
            }
            Event::BookingCalendarSyncFailed { booking_id } => {
                warn!(%booking_id, "calendar sync failed");
            }
            other => {
                info!("event: {:?}", other);
            }
        }
    }

    warn!("Event processing loop has ended");
}

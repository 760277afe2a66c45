pub mod carts;
pub mod checkout;
pub mod common;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::side_effects::SideEffectQueue;
use crate::events::EventSender;
use crate::services::payments::PaymentGateway;
use crate::services::{CartService, CheckoutService};

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        side_effects: SideEffectQueue,
        config: Arc<AppConfig>,
    ) -> Self {
        let cart = Arc::new(CartService::new(
            db.clone(),
            event_sender.clone(),
            config.clone(),
        ));
        let checkout = Arc::new(CheckoutService::new(
            db,
            cart.clone(),
            gateway,
            side_effects,
            event_sender,
            config,
        ));

        Self { cart, checkout }
    }
}

//! Shopping cart lifecycle.
//!
//! Carts are keyed by an opaque, client-held session token scoped to one
//! business. All prices come from the product/service rows at write time;
//! nothing monetary is ever trusted from the client.

use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::{
    cart, cart_booking, cart_booking::CartBookingStatus, cart_item, Cart, CartBooking,
    CartBookingModel, CartItem, CartItemModel, CartItemType, CartModel, CartStatus, Product,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

/// Input for creating (or re-issuing) a cart
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateCartInput {
    /// Client-generated token; one is issued when absent.
    pub session_token: Option<String>,
}

/// Input for adding an item to a cart
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Input for setting the cart's booking draft
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetBookingInput {
    pub service_id: Uuid,
    pub start_time: chrono::DateTime<Utc>,
    pub end_time: chrono::DateTime<Utc>,
    pub timezone: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

/// Cart with its line items and booking draft
#[derive(Debug, Serialize)]
pub struct CartWithContents {
    pub cart: CartModel,
    pub items: Vec<CartItemModel>,
    pub booking: Option<CartBookingModel>,
}

fn generate_session_token() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();
    format!("cart_{}", suffix)
}

fn line_total_cents(unit_price_cents: i64, quantity: i32) -> i64 {
    unit_price_cents * quantity as i64
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    /// Create a cart for a session token, or hand back the existing open one.
    ///
    /// A token that is still active under a *different* business marks that
    /// older cart abandoned first; the token follows the customer, not the
    /// storefront they last visited.
    #[instrument(skip(self))]
    pub async fn create_cart(
        &self,
        business_id: Uuid,
        input: CreateCartInput,
    ) -> Result<CartModel, ServiceError> {
        let now = Utc::now();
        let session_token = input
            .session_token
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(generate_session_token);

        if let Some(existing) = Cart::find()
            .filter(cart::Column::SessionToken.eq(session_token.clone()))
            .filter(cart::Column::Status.eq(CartStatus::Active))
            .one(&*self.db)
            .await?
        {
            if existing.business_id == business_id && existing.is_open(now) {
                return Ok(existing);
            }

            let existing_id = existing.id;
            let mut abandon: cart::ActiveModel = existing.into();
            abandon.status = Set(CartStatus::Abandoned);
            abandon.updated_at = Set(now);
            abandon.update(&*self.db).await?;
            self.event_sender
                .send_or_log(Event::CartAbandoned(existing_id))
                .await;
        }

        let cart_id = Uuid::new_v4();
        let cart = cart::ActiveModel {
            id: Set(cart_id),
            session_token: Set(session_token),
            business_id: Set(business_id),
            status: Set(CartStatus::Active),
            expires_at: Set(now + Duration::hours(self.config.cart_ttl_hours)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let cart = cart.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartCreated(cart_id))
            .await;

        info!("Created cart: {}", cart_id);
        Ok(cart)
    }

    /// Fetch a cart with items and booking draft.
    pub async fn get_cart(
        &self,
        business_id: Uuid,
        session_token: &str,
    ) -> Result<CartWithContents, ServiceError> {
        let cart = self.find_cart(business_id, session_token).await?;
        let items = self.items(cart.id).await?;
        let booking = self.booking_draft(cart.id).await?;
        Ok(CartWithContents {
            cart,
            items,
            booking,
        })
    }

    /// Add a product to the cart, or bump quantity if already present.
    /// Unit price and name are snapshotted from the product row; the line
    /// total is recomputed server-side.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        business_id: Uuid,
        session_token: &str,
        input: AddItemInput,
    ) -> Result<CartWithContents, ServiceError> {
        if input.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be positive".to_string(),
            ));
        }

        let cart = self.find_open_cart(business_id, session_token).await?;

        let product = Product::find_by_id(input.product_id)
            .one(&*self.db)
            .await?
            .filter(|p| p.business_id == business_id && p.active)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        let txn = self.db.begin().await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .one(&txn)
            .await?;

        if let Some(item) = existing {
            let quantity = item.quantity + input.quantity;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(quantity);
            item.unit_price_cents = Set(product.price_cents);
            item.line_total_cents = Set(line_total_cents(product.price_cents, quantity));
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        } else {
            cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product.id),
                name: Set(product.name.clone()),
                item_type: Set(CartItemType::Product),
                unit_price_cents: Set(product.price_cents),
                quantity: Set(input.quantity),
                line_total_cents: Set(line_total_cents(product.price_cents, input.quantity)),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                product_id: product.id,
            })
            .await;

        self.get_cart(business_id, session_token).await
    }

    /// Remove a line item.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        business_id: Uuid,
        session_token: &str,
        item_id: Uuid,
    ) -> Result<CartWithContents, ServiceError> {
        let cart = self.find_open_cart(business_id, session_token).await?;

        let item = CartItem::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .filter(|i| i.cart_id == cart.id)
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        CartItem::delete_by_id(item.id).exec(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                item_id,
            })
            .await;

        self.get_cart(business_id, session_token).await
    }

    /// Set or replace the cart's single booking draft.
    #[instrument(skip(self, input))]
    pub async fn set_booking(
        &self,
        business_id: Uuid,
        session_token: &str,
        input: SetBookingInput,
    ) -> Result<CartWithContents, ServiceError> {
        if input.end_time <= input.start_time {
            return Err(ServiceError::ValidationError(
                "Booking end time must be after start time".to_string(),
            ));
        }

        let cart = self.find_open_cart(business_id, session_token).await?;

        let service = crate::entities::BusinessService::find_by_id(input.service_id)
            .one(&*self.db)
            .await?
            .filter(|s| s.business_id == business_id && s.active)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Service {} not found", input.service_id))
            })?;

        let txn = self.db.begin().await?;

        // One draft per cart: replace any previous one.
        CartBooking::delete_many()
            .filter(cart_booking::Column::CartId.eq(cart.id))
            .filter(cart_booking::Column::Status.eq(CartBookingStatus::Draft))
            .exec(&txn)
            .await?;

        cart_booking::ActiveModel {
            id: Set(Uuid::new_v4()),
            cart_id: Set(cart.id),
            service_id: Set(service.id),
            start_time: Set(input.start_time),
            end_time: Set(input.end_time),
            timezone: Set(input.timezone),
            customer_name: Set(input.customer_name),
            customer_email: Set(input.customer_email),
            customer_phone: Set(input.customer_phone),
            notes: Set(input.notes),
            status: Set(CartBookingStatus::Draft),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartBookingSet {
                cart_id: cart.id,
                service_id: service.id,
            })
            .await;

        self.get_cart(business_id, session_token).await
    }

    /// Load the cart for checkout. Absent carts are a client-visible
    /// validation failure, not a 404.
    ///
    /// Checked-out carts are still returned: a resubmission of an
    /// already-paid cart must reach the idempotency gate so the caller can
    /// be pointed at the prior payment instead of getting a generic
    /// not-found. The orchestrator enforces openness after the gate.
    pub async fn load_for_checkout(
        &self,
        business_id: Uuid,
        session_token: &str,
    ) -> Result<CartModel, ServiceError> {
        Cart::find()
            .filter(cart::Column::BusinessId.eq(business_id))
            .filter(cart::Column::SessionToken.eq(session_token))
            .filter(cart::Column::Status.ne(CartStatus::Abandoned))
            .order_by_desc(cart::Column::CreatedAt)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::ValidationError("Cart not found or has expired".to_string())
            })
    }

    /// Post-checkout status write.
    pub async fn mark_checked_out(&self, cart: &CartModel) -> Result<(), ServiceError> {
        let mut update: cart::ActiveModel = cart.clone().into();
        update.status = Set(CartStatus::CheckedOut);
        update.updated_at = Set(Utc::now());
        update.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartCheckedOut(cart.id))
            .await;

        info!("Cart checked out: {}", cart.id);
        Ok(())
    }

    pub async fn items(&self, cart_id: Uuid) -> Result<Vec<CartItemModel>, ServiceError> {
        Ok(CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .all(&*self.db)
            .await?)
    }

    pub async fn booking_draft(
        &self,
        cart_id: Uuid,
    ) -> Result<Option<CartBookingModel>, ServiceError> {
        Ok(CartBooking::find()
            .filter(cart_booking::Column::CartId.eq(cart_id))
            .filter(cart_booking::Column::Status.eq(CartBookingStatus::Draft))
            .one(&*self.db)
            .await?)
    }

    async fn find_cart(
        &self,
        business_id: Uuid,
        session_token: &str,
    ) -> Result<CartModel, ServiceError> {
        Cart::find()
            .filter(cart::Column::BusinessId.eq(business_id))
            .filter(cart::Column::SessionToken.eq(session_token))
            .filter(cart::Column::Status.eq(CartStatus::Active))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart not found".to_string()))
    }

    async fn find_open_cart(
        &self,
        business_id: Uuid,
        session_token: &str,
    ) -> Result<CartModel, ServiceError> {
        let cart = self.find_cart(business_id, session_token).await?;
        if !cart.is_open(Utc::now()) {
            return Err(ServiceError::InvalidOperation(
                "Cart has expired".to_string(),
            ));
        }
        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_prefixed_and_unique() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert!(a.starts_with("cart_"));
        assert_eq!(a.len(), "cart_".len() + 24);
        assert_ne!(a, b);
    }

    #[test]
    fn line_totals_multiply_price_by_quantity() {
        assert_eq!(line_total_cents(1000, 2), 2000);
        assert_eq!(line_total_cents(2550, 3), 7650);
        assert_eq!(line_total_cents(1, 100), 100);
    }

    #[test]
    fn cart_open_requires_active_and_unexpired() {
        let now = Utc::now();
        let mut cart = CartModel {
            id: Uuid::new_v4(),
            session_token: "cart_x".into(),
            business_id: Uuid::new_v4(),
            status: CartStatus::Active,
            expires_at: now + Duration::hours(1),
            created_at: now,
            updated_at: now,
        };
        assert!(cart.is_open(now));

        cart.expires_at = now - Duration::minutes(1);
        assert!(!cart.is_open(now));

        cart.expires_at = now + Duration::hours(1);
        cart.status = CartStatus::CheckedOut;
        assert!(!cart.is_open(now));
    }
}

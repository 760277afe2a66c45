//! The checkout orchestrator.
//!
//! Turns an active cart into a paid, recorded, and notified transaction:
//! validate and price, gate on a prior paid session, create a session
//! ledger row, charge the gateway, materialize order/booking records, then
//! hand side effects to the queue. Payment capture strictly precedes
//! materialization; materialization strictly precedes side effects.
//!
//! The one rule everything else bends around: once the gateway has captured
//! a payment, no downstream failure may surface as a checkout failure. A
//! customer who was charged sees success; broken bookkeeping is logged under
//! the request's trace ID for operator reconciliation.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::{
    booking, booking::BookingStatus, cart_booking, cart_booking::CartBookingStatus,
    checkout_session, shop_order, shop_order_item, BookingModel, BusinessProfile,
    BusinessProfileModel, BusinessService, BusinessServiceModel, CalendarSyncStatus,
    CartBookingModel, CartItemModel, CartItemType, CheckoutSession, CheckoutStatus,
    ShopOrderModel,
};
use crate::errors::ServiceError;
use crate::events::side_effects::{SideEffectJob, SideEffectQueue};
use crate::events::{Event, EventSender};
use crate::observability::current_request_id;
use crate::services::cart::CartService;
use crate::services::notifications;
use crate::services::payments::{
    CreatePaymentRequest, GatewayPayment, IdempotencyKey, PaymentGateway,
};

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    carts: Arc<CartService>,
    gateway: Arc<dyn PaymentGateway>,
    side_effects: SideEffectQueue,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

/// One checkout submission.
#[derive(Debug, Clone)]
pub struct CheckoutInput {
    pub business_id: Uuid,
    pub session_token: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    /// Single-use payment token from the client-side payment SDK.
    pub source_id: String,
}

/// Everything the client needs to reference what was created.
#[derive(Debug)]
pub struct CheckoutOutcome {
    pub checkout_session_id: Uuid,
    pub square_payment_id: String,
    pub shop_order_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
}

/// Priced cart, computed once during validation. The booking price is a
/// snapshot: materialization consumes these numbers and never re-queries
/// the service's price.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PricedCart {
    items_subtotal_cents: i64,
    booking_price_cents: i64,
    subtotal_cents: i64,
    tax_cents: i64,
    total_cents: i64,
}

fn compute_tax_cents(subtotal_cents: i64, tax_rate: f64) -> i64 {
    let rate = Decimal::from_f64_retain(tax_rate).unwrap_or(Decimal::ZERO);
    (Decimal::from(subtotal_cents) * rate)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

fn price_cart(items: &[CartItemModel], booking_price_cents: i64, tax_rate: f64) -> PricedCart {
    // Line totals are recomputed here; stored values are never trusted.
    let items_subtotal_cents: i64 = items
        .iter()
        .map(|item| item.unit_price_cents * item.quantity as i64)
        .sum();
    let subtotal_cents = items_subtotal_cents + booking_price_cents;
    let tax_cents = compute_tax_cents(subtotal_cents, tax_rate);
    PricedCart {
        items_subtotal_cents,
        booking_price_cents,
        subtotal_cents,
        tax_cents,
        total_cents: subtotal_cents + tax_cents,
    }
}

/// Contact fields for the booking row: values submitted at checkout time
/// override whatever the draft collected earlier.
fn booking_contact(
    input: &CheckoutInput,
    draft: &CartBookingModel,
) -> (String, String, Option<String>) {
    let phone = input
        .customer_phone
        .clone()
        .or_else(|| draft.customer_phone.clone());
    (
        input.customer_name.clone(),
        input.customer_email.clone(),
        phone,
    )
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        carts: Arc<CartService>,
        gateway: Arc<dyn PaymentGateway>,
        side_effects: SideEffectQueue,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            carts,
            gateway,
            side_effects,
            event_sender,
            config,
        }
    }

    #[instrument(skip(self, input), fields(business_id = %input.business_id))]
    pub async fn checkout(&self, input: CheckoutInput) -> Result<CheckoutOutcome, ServiceError> {
        let trace_id = current_request_id()
            .map(|rid| rid.as_str().to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        // -- Validating ------------------------------------------------------
        let business = BusinessProfile::find_by_id(input.business_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::ValidationError("Unknown business".to_string()))?;

        let location_id = business.square_location_id.clone().ok_or_else(|| {
            ServiceError::ConfigurationError(
                "Payments are not configured for this business".to_string(),
            )
        })?;

        let cart = self
            .carts
            .load_for_checkout(input.business_id, &input.session_token)
            .await?;

        // -- Idempotency gate ------------------------------------------------
        // Checked before anything else about the cart's state: a
        // resubmission of an already-paid cart (by then `checked_out`) must
        // come back with the prior payment reference, never a new charge.
        if let Some(prior) = CheckoutSession::find()
            .filter(checkout_session::Column::CartId.eq(cart.id))
            .filter(checkout_session::Column::Status.eq(CheckoutStatus::Paid))
            .one(&*self.db)
            .await?
        {
            info!(%trace_id, cart_id = %cart.id, "duplicate submission for already-paid cart");
            return Err(ServiceError::DuplicateCheckout {
                payment_id: prior.square_payment_id.unwrap_or_default(),
            });
        }

        if !cart.is_open(Utc::now()) {
            return Err(ServiceError::ValidationError(
                "Cart not found or has expired".to_string(),
            ));
        }

        let items = self.carts.items(cart.id).await?;
        let booking_draft = self.carts.booking_draft(cart.id).await?;

        if items.is_empty() && booking_draft.is_none() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }

        let booked_service = match &booking_draft {
            Some(draft) => Some(
                BusinessService::find_by_id(draft.service_id)
                    .one(&*self.db)
                    .await?
                    .filter(|s| s.business_id == input.business_id && s.active)
                    .ok_or_else(|| {
                        ServiceError::ValidationError(
                            "Booked service is no longer available".to_string(),
                        )
                    })?,
            ),
            None => None,
        };

        let priced = price_cart(
            &items,
            booked_service.as_ref().map(|s| s.price_cents).unwrap_or(0),
            self.config.default_tax_rate,
        );

        // -- New attempt -----------------------------------------------------
        let idempotency_key = IdempotencyKey::generate(cart.id);
        let session_id = Uuid::new_v4();
        let now = Utc::now();
        let session = checkout_session::ActiveModel {
            id: Set(session_id),
            cart_id: Set(cart.id),
            idempotency_key: Set(idempotency_key.as_str().to_string()),
            amount_subtotal_cents: Set(priced.subtotal_cents),
            amount_tax_cents: Set(priced.tax_cents),
            amount_total_cents: Set(priced.total_cents),
            currency: Set(business.currency.clone()),
            status: Set(CheckoutStatus::Processing),
            square_payment_id: Set(None),
            paid_at: Set(None),
            error_message: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::CheckoutStarted {
                cart_id: cart.id,
                session_id,
            })
            .await;

        // -- PaymentPending --------------------------------------------------
        let payment = match self
            .gateway
            .create_payment(CreatePaymentRequest {
                amount_cents: priced.total_cents,
                currency: session.currency.clone(),
                source_id: input.source_id.clone(),
                idempotency_key,
                location_id,
                reference_id: session_id.to_string(),
                buyer_email: input.customer_email.clone(),
                note: Some(format!("{} checkout", business.name)),
            })
            .await
        {
            Ok(payment) => payment,
            Err(err) => {
                warn!(%trace_id, %session_id, "payment failed: {}", err);
                let update = checkout_session::ActiveModel {
                    id: Set(session_id),
                    status: Set(CheckoutStatus::Failed),
                    error_message: Set(Some(err.to_string())),
                    updated_at: Set(Utc::now()),
                    ..Default::default()
                };
                if let Err(db_err) = update.update(&*self.db).await {
                    error!(%trace_id, %session_id, "could not record payment failure: {}", db_err);
                }
                self.event_sender
                    .send_or_log(Event::PaymentFailed { session_id })
                    .await;
                return Err(err.into_service_error());
            }
        };

        // From here on money has moved. Local failures are bookkeeping and
        // must never be surfaced to the customer as a checkout failure.
        let session_status = if payment.completed {
            CheckoutStatus::Paid
        } else {
            CheckoutStatus::Pending
        };
        let paid_at = if payment.completed { Some(Utc::now()) } else { None };

        let update = checkout_session::ActiveModel {
            id: Set(session_id),
            status: Set(session_status),
            square_payment_id: Set(Some(payment.payment_id.clone())),
            paid_at: Set(paid_at),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Err(db_err) = update.update(&*self.db).await {
            // The paid-session unique index also trips here when a
            // concurrent attempt won the race after our gate check; either
            // way the charge exists at the gateway and must be reconciled.
            error!(
                %trace_id, %session_id, payment_id = %payment.payment_id,
                "payment captured but session could not be recorded: {}", db_err
            );
            return Err(ServiceError::InternalError(format!(
                "payment {} captured but not recorded",
                payment.payment_id
            )));
        }

        let captured_event = if payment.completed {
            Event::PaymentCaptured {
                session_id,
                payment_id: payment.payment_id.clone(),
            }
        } else {
            Event::PaymentPending {
                session_id,
                payment_id: payment.payment_id.clone(),
            }
        };
        self.event_sender.send_or_log(captured_event).await;

        // -- Materializing ---------------------------------------------------
        let product_items: Vec<&CartItemModel> = items
            .iter()
            .filter(|item| item.item_type == CartItemType::Product)
            .collect();

        let mut shop_order: Option<ShopOrderModel> = None;
        if !product_items.is_empty() {
            match self
                .create_shop_order(&business, &session, &payment, &priced, &product_items, &input, paid_at)
                .await
            {
                Ok(order) => {
                    self.event_sender
                        .send_or_log(Event::OrderCreated(order.id))
                        .await;
                    shop_order = Some(order);
                }
                Err(err) => {
                    error!(
                        %trace_id, %session_id,
                        "order materialization failed after payment capture: {}", err
                    );
                }
            }
        }

        let mut booking_record: Option<BookingModel> = None;
        if let (Some(draft), Some(service)) = (&booking_draft, &booked_service) {
            match self
                .create_booking(&business, &session, &payment, &priced, draft, service, &input, session_status)
                .await
            {
                Ok(created) => {
                    self.event_sender
                        .send_or_log(Event::BookingCreated(created.id))
                        .await;
                    booking_record = Some(created);
                }
                Err(err) => {
                    error!(
                        %trace_id, %session_id,
                        "booking materialization failed after payment capture: {}", err
                    );
                }
            }
        }

        if let Err(err) = self.carts.mark_checked_out(&cart).await {
            error!(%trace_id, cart_id = %cart.id, "failed to mark cart checked out: {}", err);
        }

        // -- SideEffects -----------------------------------------------------
        if let Some(created) = &booking_record {
            self.side_effects.submit(
                SideEffectJob::CalendarSync {
                    booking_id: created.id,
                },
                &trace_id,
            );
        }
        for message in
            notifications::checkout_messages(&business, shop_order.as_ref(), booking_record.as_ref())
        {
            self.side_effects
                .submit(SideEffectJob::Email { message }, &trace_id);
        }

        self.event_sender
            .send_or_log(Event::CheckoutCompleted {
                session_id,
                payment_id: payment.payment_id.clone(),
            })
            .await;

        info!(
            %trace_id, %session_id, payment_id = %payment.payment_id,
            total_cents = priced.total_cents, "checkout complete"
        );

        Ok(CheckoutOutcome {
            checkout_session_id: session_id,
            square_payment_id: payment.payment_id,
            shop_order_id: shop_order.map(|o| o.id),
            booking_id: booking_record.map(|b| b.id),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_shop_order(
        &self,
        business: &BusinessProfileModel,
        session: &checkout_session::Model,
        payment: &GatewayPayment,
        priced: &PricedCart,
        items: &[&CartItemModel],
        input: &CheckoutInput,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<ShopOrderModel, ServiceError> {
        let txn = self.db.begin().await?;
        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let order = shop_order::ActiveModel {
            id: Set(order_id),
            business_id: Set(business.id),
            checkout_session_id: Set(session.id),
            order_number: Set(format!(
                "ORD-{}",
                order_id.simple().to_string()[..8].to_uppercase()
            )),
            customer_name: Set(input.customer_name.clone()),
            customer_email: Set(input.customer_email.clone()),
            customer_phone: Set(input.customer_phone.clone()),
            subtotal_cents: Set(priced.items_subtotal_cents),
            tax_cents: Set(priced.tax_cents),
            // The booked service's portion lives on the booking row; the
            // order total excludes it.
            total_cents: Set(priced.total_cents - priced.booking_price_cents),
            currency: Set(session.currency.clone()),
            square_payment_id: Set(payment.payment_id.clone()),
            idempotency_key: Set(session.idempotency_key.clone()),
            paid_at: Set(paid_at),
            status: Set("confirmed".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for item in items {
            shop_order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(item.product_id),
                name: Set(item.name.clone()),
                unit_price_cents: Set(item.unit_price_cents),
                quantity: Set(item.quantity),
                line_total_cents: Set(item.unit_price_cents * item.quantity as i64),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        info!(order_id = %order.id, order_number = %order.order_number, "shop order created");
        Ok(order)
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_booking(
        &self,
        business: &BusinessProfileModel,
        session: &checkout_session::Model,
        payment: &GatewayPayment,
        priced: &PricedCart,
        draft: &CartBookingModel,
        service: &BusinessServiceModel,
        input: &CheckoutInput,
        session_status: CheckoutStatus,
    ) -> Result<BookingModel, ServiceError> {
        let (customer_name, customer_email, customer_phone) = booking_contact(input, draft);
        let duration_minutes = (draft.end_time - draft.start_time).num_minutes() as i32;

        let txn = self.db.begin().await?;
        let now = Utc::now();

        let created = booking::ActiveModel {
            id: Set(Uuid::new_v4()),
            business_id: Set(business.id),
            checkout_session_id: Set(session.id),
            service_id: Set(service.id),
            service_name: Set(service.name.clone()),
            customer_name: Set(customer_name),
            customer_email: Set(customer_email),
            customer_phone: Set(customer_phone),
            notes: Set(draft.notes.clone()),
            booking_date: Set(draft.start_time),
            duration_minutes: Set(duration_minutes),
            timezone: Set(draft.timezone.clone()),
            status: Set(BookingStatus::Confirmed),
            payment_amount_cents: Set(priced.booking_price_cents),
            payment_status: Set(session_status.as_str().to_string()),
            payment_id: Set(payment.payment_id.clone()),
            calendar_event_id: Set(None),
            calendar_sync_status: Set(CalendarSyncStatus::Pending),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut converted: cart_booking::ActiveModel = draft.clone().into();
        converted.status = Set(CartBookingStatus::Converted);
        converted.updated_at = Set(now);
        converted.update(&txn).await?;

        txn.commit().await?;

        info!(booking_id = %created.id, service = %created.service_name, "booking created");
        Ok(created)
    }
}

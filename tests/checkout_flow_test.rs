//! End-to-end tests for the checkout orchestrator.
//!
//! Covers the core guarantees: correct totals, the idempotency gate, the
//! empty-cart rejection, payment-precedes-materialization, tolerance of
//! partial materialization after capture, and the asymmetry that a captured
//! payment never surfaces as a failure.

mod common;

use axum::http::Method;
use chrono::{Duration as ChronoDuration, Utc};
use common::{response_json, GatewayBehavior, TestApp};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde_json::json;
use uuid::Uuid;

use storefront_api::entities::{
    booking, cart, checkout_session, shop_order, shop_order_item, Booking, Cart, CartStatus,
    CheckoutSession, CheckoutStatus, ShopOrder, ShopOrderItem,
};

async fn find_cart(app: &TestApp, session_token: &str) -> cart::Model {
    Cart::find()
        .filter(cart::Column::SessionToken.eq(session_token))
        .one(&*app.state.db)
        .await
        .expect("query cart")
        .expect("cart exists")
}

async fn sessions_for(app: &TestApp, cart_id: Uuid) -> Vec<checkout_session::Model> {
    CheckoutSession::find()
        .filter(checkout_session::Column::CartId.eq(cart_id))
        .all(&*app.state.db)
        .await
        .expect("query sessions")
}

/// 2 x $10.00 product plus a $25.00 service booking in one cart.
#[tokio::test]
async fn mixed_cart_checkout_creates_order_and_booking() {
    let app = TestApp::new().await;
    let business = app.seed_business(true, None).await;
    let mug = app.seed_product(business.id, "Ceramic Mug", 1000).await;
    let haircut = app.seed_service(business.id, "Haircut", 2500, 60).await;

    let token = "tok-mixed-1";
    app.create_cart(business.id, token).await;
    let add = app.add_product(business.id, token, mug.id, 2).await;
    assert_eq!(add.status(), 200);
    let start = Utc::now() + ChronoDuration::days(3);
    let set = app.set_booking(business.id, token, haircut.id, start, 60).await;
    assert_eq!(set.status(), 200);

    let response = app.submit_checkout(business.id, token).await;
    assert_eq!(response.status(), 200);
    assert!(response.headers().get("x-request-id").is_some());

    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["squarePaymentId"], "sq_pay_1");
    assert!(!body["traceId"].as_str().unwrap().is_empty());
    let order_id: Uuid = body["shopOrderId"].as_str().unwrap().parse().unwrap();
    let booking_id: Uuid = body["bookingId"].as_str().unwrap().parse().unwrap();

    // session ledger: subtotal 4500, tax 360 (8% half-up), total 4860
    let cart_row = find_cart(&app, token).await;
    assert_eq!(cart_row.status, CartStatus::CheckedOut);
    let sessions = sessions_for(&app, cart_row.id).await;
    assert_eq!(sessions.len(), 1);
    let session = &sessions[0];
    assert_eq!(session.status, CheckoutStatus::Paid);
    assert_eq!(session.amount_subtotal_cents, 4500);
    assert_eq!(session.amount_tax_cents, 360);
    assert_eq!(session.amount_total_cents, 4860);
    assert!(session.paid_at.is_some());
    assert!(session.idempotency_key.starts_with("chk_"));
    assert_eq!(session.square_payment_id.as_deref(), Some("sq_pay_1"));

    // the gateway saw the full total, the location, and the session reference
    let requests = app.gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].amount_cents, 4860);
    assert_eq!(requests[0].currency, "USD");
    assert_eq!(requests[0].location_id, "LOC_TEST_1");
    assert_eq!(requests[0].reference_id, session.id.to_string());
    assert_eq!(requests[0].buyer_email, "ada@example.com");

    // shop order excludes the service portion: 2000 + 360 tax = 2360
    let order = ShopOrder::find_by_id(order_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("order exists");
    assert_eq!(order.subtotal_cents, 2000);
    assert_eq!(order.tax_cents, 360);
    assert_eq!(order.total_cents, 2360);
    assert_eq!(order.square_payment_id, "sq_pay_1");
    assert_eq!(order.customer_name, "Ada Lovelace");
    assert_eq!(order.idempotency_key, session.idempotency_key);

    let items = ShopOrderItem::find()
        .filter(shop_order_item::Column::OrderId.eq(order.id))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Ceramic Mug");
    assert_eq!(items[0].unit_price_cents, 1000);
    assert_eq!(items[0].quantity, 2);
    assert_eq!(items[0].line_total_cents, 2000);

    // booking carries the service price and the checkout-time contact info,
    // falling back to the draft for the phone number
    let booking_row = Booking::find_by_id(booking_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("booking exists");
    assert_eq!(booking_row.payment_amount_cents, 2500);
    assert_eq!(booking_row.duration_minutes, 60);
    assert_eq!(booking_row.payment_status, "paid");
    assert_eq!(booking_row.payment_id, "sq_pay_1");
    assert_eq!(booking_row.service_name, "Haircut");
    assert_eq!(booking_row.customer_name, "Ada Lovelace");
    assert_eq!(booking_row.customer_email, "ada@example.com");
    assert_eq!(booking_row.customer_phone.as_deref(), Some("+1 555 0100"));
    assert_eq!(booking_row.notes.as_deref(), Some("first visit"));
}

#[tokio::test]
async fn duplicate_submission_returns_prior_payment_without_new_charge() {
    let app = TestApp::new().await;
    let business = app.seed_business(true, None).await;
    let mug = app.seed_product(business.id, "Ceramic Mug", 1000).await;

    let token = "tok-dup-1";
    app.create_cart(business.id, token).await;
    app.add_product(business.id, token, mug.id, 1).await;

    let first = app.submit_checkout(business.id, token).await;
    assert_eq!(first.status(), 200);
    let first_body = response_json(first).await;
    let first_payment = first_body["squarePaymentId"].as_str().unwrap().to_string();

    let second = app.submit_checkout(business.id, token).await;
    assert_eq!(second.status(), 400);
    let second_body = response_json(second).await;
    assert_eq!(second_body["paymentId"], first_payment.as_str());
    assert!(second_body["error"]
        .as_str()
        .unwrap()
        .contains("already completed"));

    // exactly one charge, exactly one paid session
    assert_eq!(app.gateway.call_count(), 1);
    let cart_row = find_cart(&app, token).await;
    let paid: Vec<_> = sessions_for(&app, cart_row.id)
        .await
        .into_iter()
        .filter(|s| s.status == CheckoutStatus::Paid)
        .collect();
    assert_eq!(paid.len(), 1);
}

#[tokio::test]
async fn empty_cart_rejected_before_any_gateway_call() {
    let app = TestApp::new().await;
    let business = app.seed_business(true, None).await;

    let token = "tok-empty-1";
    app.create_cart(business.id, token).await;

    let response = app.submit_checkout(business.id, token).await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("empty"));

    assert_eq!(app.gateway.call_count(), 0);
    let cart_row = find_cart(&app, token).await;
    assert!(sessions_for(&app, cart_row.id).await.is_empty());
    assert_eq!(cart_row.status, CartStatus::Active);
}

#[tokio::test]
async fn declined_card_fails_session_and_materializes_nothing() {
    let app = TestApp::new().await;
    app.gateway.set_behavior(GatewayBehavior::Decline);
    let business = app.seed_business(true, None).await;
    let mug = app.seed_product(business.id, "Ceramic Mug", 1000).await;
    let haircut = app.seed_service(business.id, "Haircut", 2500, 60).await;

    let token = "tok-decline-1";
    app.create_cart(business.id, token).await;
    app.add_product(business.id, token, mug.id, 1).await;
    app.set_booking(
        business.id,
        token,
        haircut.id,
        Utc::now() + ChronoDuration::days(1),
        60,
    )
    .await;

    let response = app.submit_checkout(business.id, token).await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("declined"));

    // session is terminally failed with the gateway's message recorded
    let cart_row = find_cart(&app, token).await;
    let sessions = sessions_for(&app, cart_row.id).await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status, CheckoutStatus::Failed);
    assert!(sessions[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("Insufficient funds"));
    assert!(sessions[0].square_payment_id.is_none());

    // payment precedes materialization: nothing was created
    assert!(ShopOrder::find().all(&*app.state.db).await.unwrap().is_empty());
    assert!(Booking::find().all(&*app.state.db).await.unwrap().is_empty());
    assert_eq!(cart_row.status, CartStatus::Active);
}

#[tokio::test]
async fn gateway_outage_maps_to_bad_gateway() {
    let app = TestApp::new().await;
    app.gateway.set_behavior(GatewayBehavior::Unreachable);
    let business = app.seed_business(true, None).await;
    let mug = app.seed_product(business.id, "Ceramic Mug", 1000).await;

    let token = "tok-outage-1";
    app.create_cart(business.id, token).await;
    app.add_product(business.id, token, mug.id, 1).await;

    let response = app.submit_checkout(business.id, token).await;
    assert_eq!(response.status(), 502);

    let cart_row = find_cart(&app, token).await;
    let sessions = sessions_for(&app, cart_row.id).await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status, CheckoutStatus::Failed);
}

#[tokio::test]
async fn unconfigured_business_rejected_before_session() {
    let app = TestApp::new().await;
    let business = app.seed_business(false, None).await;
    let mug = app.seed_product(business.id, "Ceramic Mug", 1000).await;

    let token = "tok-noconfig-1";
    app.create_cart(business.id, token).await;
    app.add_product(business.id, token, mug.id, 1).await;

    let response = app.submit_checkout(business.id, token).await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("not configured"));

    assert_eq!(app.gateway.call_count(), 0);
    let cart_row = find_cart(&app, token).await;
    assert!(sessions_for(&app, cart_row.id).await.is_empty());
}

#[tokio::test]
async fn missing_cart_is_a_client_error() {
    let app = TestApp::new().await;
    let business = app.seed_business(true, None).await;

    let response = app.submit_checkout(business.id, "tok-never-created").await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("not found"));
    assert_eq!(app.gateway.call_count(), 0);
}

/// Fault injection: the order insert fails after the charge succeeded. The
/// customer was charged, so the response must still be success, with the
/// booking that did materialize and a null order reference.
#[tokio::test]
async fn order_insert_failure_after_capture_still_reports_success() {
    let app = TestApp::new().await;
    let business = app.seed_business(true, None).await;
    let mug = app.seed_product(business.id, "Ceramic Mug", 1000).await;
    let haircut = app.seed_service(business.id, "Haircut", 2500, 60).await;

    let token = "tok-partial-1";
    app.create_cart(business.id, token).await;
    app.add_product(business.id, token, mug.id, 2).await;
    app.set_booking(
        business.id,
        token,
        haircut.id,
        Utc::now() + ChronoDuration::days(2),
        60,
    )
    .await;

    // break the order path only
    app.state
        .db
        .execute_unprepared("DROP TABLE shop_order_items")
        .await
        .expect("drop shop_order_items");

    let response = app.submit_checkout(business.id, token).await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert!(body["shopOrderId"].is_null());
    assert!(body["bookingId"].is_string());

    // order transaction rolled back, booking landed, cart closed
    assert!(ShopOrder::find()
        .filter(shop_order::Column::BusinessId.eq(business.id))
        .all(&*app.state.db)
        .await
        .unwrap()
        .is_empty());
    let booking_id: Uuid = body["bookingId"].as_str().unwrap().parse().unwrap();
    assert!(Booking::find_by_id(booking_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .is_some());
    assert_eq!(find_cart(&app, token).await.status, CartStatus::CheckedOut);
}

#[tokio::test]
async fn async_settlement_records_pending_session() {
    let app = TestApp::new().await;
    app.gateway.set_behavior(GatewayBehavior::SettleAsync);
    let business = app.seed_business(true, None).await;
    let haircut = app.seed_service(business.id, "Haircut", 2500, 45).await;

    let token = "tok-async-1";
    app.create_cart(business.id, token).await;
    app.set_booking(
        business.id,
        token,
        haircut.id,
        Utc::now() + ChronoDuration::days(1),
        45,
    )
    .await;

    let response = app.submit_checkout(business.id, token).await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert!(body["bookingId"].is_string());

    let cart_row = find_cart(&app, token).await;
    let sessions = sessions_for(&app, cart_row.id).await;
    assert_eq!(sessions[0].status, CheckoutStatus::Pending);
    assert!(sessions[0].paid_at.is_none());

    // a payment identifier exists, so materialization proceeded
    let booking_id: Uuid = body["bookingId"].as_str().unwrap().parse().unwrap();
    let booking_row = Booking::find_by_id(booking_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(booking_row.payment_status, "pending");
    assert_eq!(booking_row.duration_minutes, 45);
    assert_eq!(booking_row.status, booking::BookingStatus::Confirmed);
}

/// A definitively failed attempt must not block a fresh attempt for the
/// same cart; each attempt gets its own session and idempotency key.
#[tokio::test]
async fn failed_attempt_does_not_block_a_new_attempt() {
    let app = TestApp::new().await;
    app.gateway.set_behavior(GatewayBehavior::Decline);
    let business = app.seed_business(true, None).await;
    let mug = app.seed_product(business.id, "Ceramic Mug", 1000).await;

    let token = "tok-retry-1";
    app.create_cart(business.id, token).await;
    app.add_product(business.id, token, mug.id, 1).await;

    let first = app.submit_checkout(business.id, token).await;
    assert_eq!(first.status(), 400);

    app.gateway.set_behavior(GatewayBehavior::CompleteImmediately);
    let second = app.submit_checkout(business.id, token).await;
    assert_eq!(second.status(), 200);

    assert_eq!(app.gateway.call_count(), 2);
    let requests = app.gateway.requests();
    assert_ne!(
        requests[0].idempotency_key, requests[1].idempotency_key,
        "each attempt must carry a fresh idempotency key"
    );

    let cart_row = find_cart(&app, token).await;
    let sessions = sessions_for(&app, cart_row.id).await;
    assert_eq!(sessions.len(), 2);
    assert_eq!(
        sessions
            .iter()
            .filter(|s| s.status == CheckoutStatus::Failed)
            .count(),
        1
    );
    assert_eq!(
        sessions
            .iter()
            .filter(|s| s.status == CheckoutStatus::Paid)
            .count(),
        1
    );
}

#[tokio::test]
async fn malformed_email_rejected_by_validation() {
    let app = TestApp::new().await;
    let business = app.seed_business(true, None).await;
    let mug = app.seed_product(business.id, "Ceramic Mug", 1000).await;

    let token = "tok-badmail-1";
    app.create_cart(business.id, token).await;
    app.add_product(business.id, token, mug.id, 1).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/businesses/{}/checkout", business.id),
            Some(json!({
                "session_token": token,
                "customer_name": "Ada Lovelace",
                "customer_email": "not-an-email",
                "source_id": "cnon:card-nonce-ok"
            })),
        )
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(app.gateway.call_count(), 0);
}

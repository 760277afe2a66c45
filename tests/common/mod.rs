//! Shared harness for integration tests: an application router over a
//! throwaway SQLite database, a counting fake payment gateway, and seed
//! helpers for businesses, products, services, and calendar integrations.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    middleware, Router,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::{
    config::AppConfig,
    db,
    entities::{
        booking, business_profile, business_service, calendar_integration, product, Booking,
        BusinessProfileModel, BusinessServiceModel, CalendarIntegrationModel, CalendarSyncStatus,
        ProductModel,
    },
    events::side_effects::{spawn_worker, RetryPolicy, SideEffectQueue},
    events::{self, EventSender},
    handlers::AppServices,
    observability::request_id_middleware,
    services::payments::{CreatePaymentRequest, GatewayError, GatewayPayment, PaymentGateway},
    services::{CalendarSyncService, NotificationService},
    AppState,
};

/// What the fake gateway should do with the next charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayBehavior {
    /// Capture completes synchronously (`COMPLETED`).
    CompleteImmediately,
    /// Payment accepted but settles asynchronously.
    SettleAsync,
    /// Card declined.
    Decline,
    /// Transport failure; outcome unknown to the caller.
    Unreachable,
}

/// In-memory gateway that records every invocation.
pub struct FakeGateway {
    behavior: Mutex<GatewayBehavior>,
    requests: Mutex<Vec<CreatePaymentRequest>>,
    counter: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(GatewayBehavior::CompleteImmediately),
            requests: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
        })
    }

    pub fn set_behavior(&self, behavior: GatewayBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn call_count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CreatePaymentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> Result<GatewayPayment, GatewayError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request);

        match *self.behavior.lock().unwrap() {
            GatewayBehavior::CompleteImmediately => Ok(GatewayPayment {
                payment_id: format!("sq_pay_{}", n),
                completed: true,
            }),
            GatewayBehavior::SettleAsync => Ok(GatewayPayment {
                payment_id: format!("sq_pay_{}", n),
                completed: false,
            }),
            GatewayBehavior::Decline => Err(GatewayError::Declined {
                code: "CARD_DECLINED".to_string(),
                detail: "Insufficient funds".to_string(),
            }),
            GatewayBehavior::Unreachable => Err(GatewayError::Transport(
                "connection reset by gateway".to_string(),
            )),
        }
    }
}

/// Application harness over a fresh throwaway database.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    _event_task: tokio::task::JoinHandle<()>,
    _worker_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Construct the app, letting the caller adjust config first (external
    /// service base URLs, retry policy, etc).
    pub async fn with_config<F: FnOnce(&mut AppConfig)>(customize: F) -> Self {
        let db_file = std::env::temp_dir().join(format!(
            "storefront_test_{}.db",
            Uuid::new_v4().simple()
        ));

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_file.display()),
            "127.0.0.1",
            0,
            "test",
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        // fast retries so side-effect assertions do not slow the suite down
        cfg.side_effect_backoff_ms = 10;
        cfg.side_effect_timeout_secs = 2;
        customize(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let cfg_arc = Arc::new(cfg.clone());

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway = FakeGateway::new();
        let (side_effects, side_effect_rx) = SideEffectQueue::new(cfg.side_effect_queue_capacity);
        let calendar = CalendarSyncService::new(db_arc.clone(), cfg_arc.clone());
        let mailer = NotificationService::from_config(&cfg);
        let worker_task = spawn_worker(
            side_effects.clone(),
            side_effect_rx,
            calendar,
            mailer,
            RetryPolicy::from_config(&cfg),
        );

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            gateway.clone(),
            side_effects,
            cfg_arc,
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", storefront_api::api_v1_routes())
            .layer(middleware::from_fn(request_id_middleware))
            .with_state(state.clone());

        Self {
            router,
            state,
            gateway,
            _event_task: event_task,
            _worker_task: worker_task,
        }
    }

    /// Send a JSON request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    // ---- seed helpers ----

    pub async fn seed_business(
        &self,
        payments_configured: bool,
        notification_email: Option<&str>,
    ) -> BusinessProfileModel {
        let now = Utc::now();
        business_profile::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Juniper Salon".to_string()),
            square_location_id: Set(payments_configured.then(|| "LOC_TEST_1".to_string())),
            notification_email: Set(notification_email.map(String::from)),
            currency: Set("USD".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed business")
    }

    pub async fn seed_product(
        &self,
        business_id: Uuid,
        name: &str,
        price_cents: i64,
    ) -> ProductModel {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            business_id: Set(business_id),
            name: Set(name.to_string()),
            price_cents: Set(price_cents),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    pub async fn seed_service(
        &self,
        business_id: Uuid,
        name: &str,
        price_cents: i64,
        duration_minutes: i32,
    ) -> BusinessServiceModel {
        let now = Utc::now();
        business_service::ActiveModel {
            id: Set(Uuid::new_v4()),
            business_id: Set(business_id),
            name: Set(name.to_string()),
            price_cents: Set(price_cents),
            duration_minutes: Set(duration_minutes),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed service")
    }

    pub async fn seed_calendar_integration(
        &self,
        business_id: Uuid,
        connected: bool,
        token_expires_at: DateTime<Utc>,
    ) -> CalendarIntegrationModel {
        let now = Utc::now();
        calendar_integration::ActiveModel {
            id: Set(Uuid::new_v4()),
            business_id: Set(business_id),
            provider: Set("google".to_string()),
            calendar_id: Set("primary".to_string()),
            access_token: Set("stored-access-token".to_string()),
            refresh_token: Set("stored-refresh-token".to_string()),
            token_expires_at: Set(token_expires_at),
            timezone: Set("America/Los_Angeles".to_string()),
            connected: Set(connected),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed calendar integration")
    }

    // ---- flow helpers ----

    pub async fn create_cart(&self, business_id: Uuid, session_token: &str) {
        let response = self
            .request(
                Method::POST,
                &format!("/api/v1/businesses/{}/carts", business_id),
                Some(json!({ "session_token": session_token })),
            )
            .await;
        assert_eq!(response.status(), 201, "cart creation should succeed");
    }

    pub async fn add_product(
        &self,
        business_id: Uuid,
        session_token: &str,
        product_id: Uuid,
        quantity: i32,
    ) -> axum::response::Response {
        self.request(
            Method::POST,
            &format!(
                "/api/v1/businesses/{}/carts/{}/items",
                business_id, session_token
            ),
            Some(json!({ "product_id": product_id, "quantity": quantity })),
        )
        .await
    }

    pub async fn set_booking(
        &self,
        business_id: Uuid,
        session_token: &str,
        service_id: Uuid,
        start: DateTime<Utc>,
        minutes: i64,
    ) -> axum::response::Response {
        self.request(
            Method::PUT,
            &format!(
                "/api/v1/businesses/{}/carts/{}/booking",
                business_id, session_token
            ),
            Some(json!({
                "service_id": service_id,
                "start_time": start.to_rfc3339(),
                "end_time": (start + ChronoDuration::minutes(minutes)).to_rfc3339(),
                "timezone": "America/Los_Angeles",
                "customer_phone": "+1 555 0100",
                "notes": "first visit"
            })),
        )
        .await
    }

    pub async fn submit_checkout(
        &self,
        business_id: Uuid,
        session_token: &str,
    ) -> axum::response::Response {
        self.request(
            Method::POST,
            &format!("/api/v1/businesses/{}/checkout", business_id),
            Some(json!({
                "session_token": session_token,
                "customer_name": "Ada Lovelace",
                "customer_email": "ada@example.com",
                "source_id": "cnon:card-nonce-ok"
            })),
        )
        .await
    }

    /// Poll until the booking's calendar sync leaves `pending` (or the
    /// timeout elapses), returning the final status observed.
    pub async fn wait_for_sync_status(
        &self,
        booking_id: Uuid,
        timeout: Duration,
    ) -> CalendarSyncStatus {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let record: booking::Model = Booking::find_by_id(booking_id)
                .one(&*self.state.db)
                .await
                .expect("query booking")
                .expect("booking exists");
            if record.calendar_sync_status != CalendarSyncStatus::Pending
                || tokio::time::Instant::now() > deadline
            {
                return record.calendar_sync_status;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
        self._worker_task.abort();
    }
}

/// Decode a response body as JSON.
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

//! Storefront API Library
//!
//! Checkout orchestration for small-business storefronts: carts, card
//! payments, shop orders, service bookings, calendar sync, and confirmation
//! emails.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod observability;
pub mod openapi;
pub mod services;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Versioned API routes
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .nest(
            "/businesses/{business_id}/carts",
            handlers::carts::cart_routes(),
        )
        .route(
            "/businesses/{business_id}/checkout",
            post(handlers::checkout::submit_checkout),
        )
}

async fn api_status() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");
    Json(json!({
        "status": "ok",
        "version": version,
        "service": "storefront-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": std::env::var("APP__ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
    }))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<Value>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    Ok(Json(json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

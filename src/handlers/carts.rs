use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use uuid::Uuid;

use crate::handlers::common::{created_response, success_response};
use crate::services::cart::{AddItemInput, CreateCartInput, SetBookingInput};
use crate::{errors::ServiceError, AppState};

/// Creates the router for cart endpoints, nested under
/// `/businesses/{business_id}/carts`.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_cart))
        .route("/{session_token}", get(get_cart))
        .route("/{session_token}/items", post(add_item))
        .route("/{session_token}/items/{item_id}", delete(remove_item))
        .route("/{session_token}/booking", put(set_booking))
}

/// Create a cart (or re-issue the open one for this session token)
#[utoipa::path(
    post,
    path = "/api/v1/businesses/{business_id}/carts",
    tag = "Carts",
    request_body = CreateCartInput,
    responses(
        (status = 201, description = "Cart created or re-issued"),
    )
)]
pub async fn create_cart(
    State(state): State<AppState>,
    Path(business_id): Path<Uuid>,
    Json(payload): Json<CreateCartInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.cart.create_cart(business_id, payload).await?;
    Ok(created_response(cart))
}

/// Fetch a cart with items and booking draft
#[utoipa::path(
    get,
    path = "/api/v1/businesses/{business_id}/carts/{session_token}",
    tag = "Carts",
    responses(
        (status = 200, description = "Cart with contents"),
        (status = 404, description = "No active cart for this token"),
    )
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Path((business_id, session_token)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state
        .services
        .cart
        .get_cart(business_id, &session_token)
        .await?;
    Ok(success_response(cart))
}

/// Add a product to the cart
#[utoipa::path(
    post,
    path = "/api/v1/businesses/{business_id}/carts/{session_token}/items",
    tag = "Carts",
    request_body = AddItemInput,
    responses(
        (status = 200, description = "Updated cart"),
        (status = 400, description = "Cart not active or quantity invalid"),
    )
)]
pub async fn add_item(
    State(state): State<AppState>,
    Path((business_id, session_token)): Path<(Uuid, String)>,
    Json(payload): Json<AddItemInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state
        .services
        .cart
        .add_item(business_id, &session_token, payload)
        .await?;
    Ok(success_response(cart))
}

/// Remove a line item from the cart
async fn remove_item(
    State(state): State<AppState>,
    Path((business_id, session_token, item_id)): Path<(Uuid, String, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state
        .services
        .cart
        .remove_item(business_id, &session_token, item_id)
        .await?;
    Ok(success_response(cart))
}

/// Set or replace the cart's booking draft
#[utoipa::path(
    put,
    path = "/api/v1/businesses/{business_id}/carts/{session_token}/booking",
    tag = "Carts",
    request_body = SetBookingInput,
    responses(
        (status = 200, description = "Updated cart"),
        (status = 400, description = "Invalid booking window or inactive cart"),
    )
)]
pub async fn set_booking(
    State(state): State<AppState>,
    Path((business_id, session_token)): Path<(Uuid, String)>,
    Json(payload): Json<SetBookingInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state
        .services
        .cart
        .set_booking(business_id, &session_token, payload)
        .await?;
    Ok(success_response(cart))
}

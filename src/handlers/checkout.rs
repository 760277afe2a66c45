use axum::extract::{Json, Path, State};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::common::validate_input;
use crate::observability::current_request_id;
use crate::services::checkout::CheckoutInput;
use crate::{errors::ServiceError, AppState};

/// Checkout submission body.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    /// Opaque, client-held cart token
    #[validate(length(min = 1))]
    pub session_token: String,
    #[validate(length(min = 1))]
    pub customer_name: String,
    #[validate(email)]
    pub customer_email: String,
    pub customer_phone: Option<String>,
    /// Single-use payment token from the payment SDK; never a card number
    #[validate(length(min = 1))]
    pub source_id: String,
}

/// Successful checkout response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub success: bool,
    pub trace_id: String,
    pub checkout_session_id: Uuid,
    pub square_payment_id: String,
    pub shop_order_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
}

/// Submit a cart for payment and materialization.
#[utoipa::path(
    post,
    path = "/api/v1/businesses/{business_id}/checkout",
    tag = "Checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Charged and recorded", body = CheckoutResponse),
        (status = 400, description = "Rejected before charge, or duplicate submission (body carries the prior paymentId)", body = crate::errors::ErrorBody),
        (status = 502, description = "Payment gateway unavailable", body = crate::errors::ErrorBody),
    )
)]
pub async fn submit_checkout(
    State(state): State<AppState>,
    Path(business_id): Path<Uuid>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ServiceError> {
    validate_input(&payload)?;

    let outcome = state
        .services
        .checkout
        .checkout(CheckoutInput {
            business_id,
            session_token: payload.session_token,
            customer_name: payload.customer_name,
            customer_email: payload.customer_email,
            customer_phone: payload.customer_phone,
            source_id: payload.source_id,
        })
        .await?;

    let trace_id = current_request_id()
        .map(|rid| rid.as_str().to_string())
        .unwrap_or_default();

    Ok(Json(CheckoutResponse {
        success: true,
        trace_id,
        checkout_session_id: outcome.checkout_session_id,
        square_payment_id: outcome.square_payment_id,
        shop_order_id: outcome.shop_order_id,
        booking_id: outcome.booking_id,
    }))
}

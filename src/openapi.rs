use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        description = r#"
Checkout orchestration for small-business storefronts.

A cart (shop products and/or one service booking) is submitted with a
tokenized card source and becomes a paid, recorded, and notified
transaction. Calendar sync and confirmation emails are best-effort side
effects and never fail a checkout.

Duplicate submissions of an already-paid cart return HTTP 400 with the
prior `paymentId` instead of charging again.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Checkout", description = "Cart-to-payment orchestration"),
        (name = "Carts", description = "Cart contents management")
    ),
    paths(
        crate::handlers::checkout::submit_checkout,
        crate::handlers::carts::create_cart,
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_item,
        crate::handlers::carts::set_booking,
    ),
    components(schemas(
        crate::handlers::checkout::CheckoutRequest,
        crate::handlers::checkout::CheckoutResponse,
        crate::services::cart::CreateCartInput,
        crate::services::cart::AddItemInput,
        crate::services::cart::SetBookingInput,
        crate::errors::ErrorBody,
    ))
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_generates() {
        let openapi = ApiDoc::openapi();
        let json = serde_json::to_string(&openapi).unwrap();
        assert!(json.contains("Storefront API"));
        assert!(json.contains("/api/v1/businesses/{business_id}/checkout"));
    }
}

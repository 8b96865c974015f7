use axum::{extract::State, http::StatusCode, Json};

use crate::{
    auth::RequestContext,
    errors::ServiceError,
    handlers::common::ValidatedJson,
    services::checkout::{CheckoutRequest, CheckoutResult},
    ApiResponse, AppState,
};

/// Ring up a cart
///
/// Prices the cart, records the order and its transaction, and deducts one
/// cup per unit from inventory, all in one database transaction.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutRequest,
    params(
        ("x-user-id" = i32, Header, description = "Authenticated cashier id"),
        ("x-user-role" = Option<String>, Header, description = "admin or cashier")
    ),
    responses(
        (status = 201, description = "Order completed", body = CheckoutResult,
            headers(("x-request-id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid cart or payment", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing caller identity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product, size or addon", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough stock", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    ctx: RequestContext,
    ValidatedJson(request): ValidatedJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutResult>>), ServiceError> {
    let result = state.checkout.checkout(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(result))))
}

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::payments::{PaymentMethodList, PaymentReceipt, PaymentVerification, SettlePaymentRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/methods", get(list_methods))
        .route("/verify/{order_id}", get(verify_payment))
        .route("/{provider}", post(settle_payment))
}

#[utoipa::path(
    get,
    path = "/api/payments/methods",
    responses(
        (status = 200, description = "Available payment rails", body = ApiResponse<PaymentMethodList>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn list_methods(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Json<ApiResponse<PaymentMethodList>> {
    Json(payment_service::payment_methods(&state.config))
}

#[utoipa::path(
    post,
    path = "/api/payments/{provider}",
    params(
        ("provider" = String, Path, description = "jazzcash, easypaisa or stripe")
    ),
    request_body = SettlePaymentRequest,
    responses(
        (status = 200, description = "Payment settled, order confirmed", body = ApiResponse<PaymentReceipt>),
        (status = 400, description = "Missing or malformed payment fields"),
        (status = 403, description = "Not the order owner"),
        (status = 404, description = "Order or provider not found"),
        (status = 409, description = "Already paid or order not pending"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn settle_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(provider): Path<String>,
    Json(payload): Json<SettlePaymentRequest>,
) -> AppResult<Json<ApiResponse<PaymentReceipt>>> {
    let resp = payment_service::settle_payment(&state, &user, &provider, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments/verify/{order_id}",
    params(
        ("order_id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Payment state of the order", body = ApiResponse<PaymentVerification>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PaymentVerification>>> {
    let resp = payment_service::verify_payment(&state, &user, order_id).await?;
    Ok(Json(resp))
}

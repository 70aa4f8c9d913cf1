use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    config::AppConfig,
    domain::{OrderStatus, PaymentMethod, PaymentStatus},
    dto::payments::{
        PaymentMethodInfo, PaymentMethodList, PaymentReceipt, PaymentVerification,
        SettlePaymentRequest,
    },
    entity::orders::{Column as OrderCol, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_owner, ensure_owner_or_elevated},
    models::Order,
    response::ApiResponse,
    services::payment_simulator::{PaymentCredentials, validate_card, validate_wallet_phone},
    state::AppState,
};

/// Validate the rail-specific fields before anything touches the database.
pub fn credentials_for(
    method: PaymentMethod,
    payload: &SettlePaymentRequest,
) -> AppResult<PaymentCredentials> {
    match method {
        PaymentMethod::Jazzcash | PaymentMethod::Easypaisa => Ok(PaymentCredentials::Wallet {
            phone: validate_wallet_phone(payload.phone.as_deref())?,
        }),
        PaymentMethod::Stripe => Ok(PaymentCredentials::Card(validate_card(
            payload.card_number.as_deref(),
            payload.expiry_month.as_deref(),
            payload.expiry_year.as_deref(),
            payload.cvc.as_deref(),
        )?)),
    }
}

/// Only a `PENDING` order with a `PENDING` payment can be settled.
pub fn ensure_settleable(order: &Order) -> AppResult<()> {
    if order.payment_status == PaymentStatus::Completed {
        return Err(AppError::AlreadyPaid);
    }
    if order.status != OrderStatus::Pending || order.payment_status != PaymentStatus::Pending {
        return Err(AppError::InvalidTransition {
            from: order.status,
            to: OrderStatus::Confirmed,
        });
    }
    Ok(())
}

pub async fn settle_payment(
    state: &AppState,
    user: &AuthUser,
    provider: &str,
    payload: SettlePaymentRequest,
) -> AppResult<ApiResponse<PaymentReceipt>> {
    let method: PaymentMethod = provider
        .parse()
        .map_err(|_| AppError::NotFound("Payment provider"))?;
    let credentials = credentials_for(method, &payload)?;

    let order = Orders::find_by_id(payload.order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    ensure_owner(user, order.user_id)?;
    let order = Order::try_from(order)?;
    ensure_settleable(&order)?;

    tracing::info!(
        provider = method.display_name(),
        order_id = %order.id,
        amount = order.total_amount,
        payer = %credentials.masked(),
        "processing payment"
    );

    let result = state
        .payments
        .settle(method, order.total_amount, order.id)
        .await;

    // The guard makes settlement exactly-once even when two requests
    // race through the simulated delay together.
    let updated = Orders::update_many()
        .col_expr(OrderCol::PaymentId, Expr::value(result.provider_payment_id.clone()))
        .col_expr(OrderCol::PaymentMethod, Expr::value(method.as_str()))
        .col_expr(OrderCol::PaymentStatus, Expr::value(PaymentStatus::Completed.as_str()))
        .col_expr(OrderCol::Status, Expr::value(OrderStatus::Confirmed.as_str()))
        .col_expr(OrderCol::UpdatedAt, Expr::current_timestamp().into())
        .filter(OrderCol::Id.eq(order.id))
        .filter(OrderCol::Status.eq(OrderStatus::Pending.as_str()))
        .filter(OrderCol::PaymentStatus.eq(PaymentStatus::Pending.as_str()))
        .exec(&state.orm)
        .await?;

    if updated.rows_affected == 0 {
        let current = Orders::find_by_id(order.id)
            .one(&state.orm)
            .await?
            .ok_or(AppError::NotFound("Order"))?;
        let current = Order::try_from(current)?;
        tracing::warn!(
            order_id = %order.id,
            status = %current.status,
            payment_status = %current.payment_status,
            "payment lost race, discarding simulated charge"
        );
        ensure_settleable(&current)?;
        return Err(AppError::AlreadyPaid);
    }

    tracing::info!(
        order_id = %order.id,
        payment_id = %result.provider_payment_id,
        "payment completed"
    );

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::PaymentSettle,
        Some(serde_json::json!({
            "order_id": order.id,
            "provider": method,
            "payment_id": result.provider_payment_id,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let card = match credentials {
        PaymentCredentials::Card(card) => Some(card),
        PaymentCredentials::Wallet { .. } => None,
    };
    Ok(ApiResponse::ok(
        result.message.clone(),
        PaymentReceipt {
            result,
            card,
            demo_mode: state.config.demo_mode,
        },
    ))
}

pub async fn verify_payment(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<PaymentVerification>> {
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    ensure_owner_or_elevated(user, order.user_id)?;
    let order = Order::try_from(order)?;

    Ok(ApiResponse::ok(
        "Payment status",
        PaymentVerification {
            order_id: order.id,
            payment_id: order.payment_id,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            order_status: order.status,
            amount: order.total_amount,
        },
    ))
}

pub fn payment_methods(config: &AppConfig) -> ApiResponse<PaymentMethodList> {
    let methods = PaymentMethod::ALL
        .iter()
        .map(|method| PaymentMethodInfo {
            id: *method,
            name: method.display_name(),
            description: match method {
                PaymentMethod::Jazzcash => "Pay with your JazzCash mobile wallet",
                PaymentMethod::Easypaisa => "Pay with your Easypaisa mobile wallet",
                PaymentMethod::Stripe => "Pay with a credit or debit card",
            },
            currency: method.currency(),
            requires_phone: method.is_mobile_wallet(),
            requires_card: !method.is_mobile_wallet(),
            demo_mode: config.demo_mode,
        })
        .collect();
    ApiResponse::ok("Payment methods", PaymentMethodList { methods })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn order(status: OrderStatus, payment_status: PaymentStatus) -> Order {
        Order {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            total_amount: 10_000,
            status,
            payment_method: PaymentMethod::Jazzcash,
            payment_status,
            payment_id: None,
            shipping_address: "House 1, Street 2, Lahore".into(),
            phone: "03001234567".into(),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn only_pending_orders_settle() {
        assert!(ensure_settleable(&order(OrderStatus::Pending, PaymentStatus::Pending)).is_ok());
        assert!(matches!(
            ensure_settleable(&order(OrderStatus::Confirmed, PaymentStatus::Completed)),
            Err(AppError::AlreadyPaid)
        ));
        assert!(matches!(
            ensure_settleable(&order(OrderStatus::Cancelled, PaymentStatus::Failed)),
            Err(AppError::InvalidTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Confirmed
            })
        ));
    }

    #[test]
    fn wallets_need_a_phone_and_cards_need_card_fields() {
        let wallet = SettlePaymentRequest {
            phone: Some("03001234567".into()),
            ..Default::default()
        };
        assert!(credentials_for(PaymentMethod::Easypaisa, &wallet).is_ok());
        assert!(credentials_for(PaymentMethod::Stripe, &wallet).is_err());

        let card = SettlePaymentRequest {
            card_number: Some("5555555555554444".into()),
            expiry_month: Some("08".into()),
            expiry_year: Some("2031".into()),
            cvc: Some("321".into()),
            ..Default::default()
        };
        match credentials_for(PaymentMethod::Stripe, &card) {
            Ok(PaymentCredentials::Card(details)) => {
                assert_eq!(details.brand, "Mastercard");
                assert_eq!(details.last4, "4444");
            }
            other => panic!("expected card credentials, got {other:?}"),
        }
        assert!(credentials_for(PaymentMethod::Jazzcash, &card).is_err());
    }

    #[test]
    fn method_listing_covers_every_rail() {
        let config = AppConfig {
            database_url: "postgres://localhost/test".into(),
            host: "127.0.0.1".into(),
            port: 3000,
            db_max_connections: 1,
            jwt_secret: "secret".into(),
            payment_delay_min: std::time::Duration::ZERO,
            payment_delay_max: std::time::Duration::ZERO,
            demo_mode: true,
        };
        let methods = payment_methods(&config).into_data().expect("data").methods;
        assert_eq!(methods.len(), 3);
        let card = methods
            .iter()
            .find(|m| m.id == PaymentMethod::Stripe)
            .expect("card rail");
        assert_eq!(card.currency, "USD");
        assert!(card.requires_card && !card.requires_phone);
        assert!(methods.iter().all(|m| m.demo_mode));
    }
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    domain::{OrderStatus, PaymentMethod, PaymentStatus},
    services::payment_simulator::{CardDetails, PaymentResult},
};

/// Union of the fields the three rails accept. Wallets need `phone`
/// (`mpin` is accepted and ignored); the card rail needs the card fields.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SettlePaymentRequest {
    pub order_id: Uuid,
    pub phone: Option<String>,
    pub mpin: Option<String>,
    pub card_number: Option<String>,
    pub expiry_month: Option<String>,
    pub expiry_year: Option<String>,
    pub cvc: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentReceipt {
    #[serde(flatten)]
    pub result: PaymentResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<CardDetails>,
    pub demo_mode: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentVerification {
    pub order_id: Uuid,
    pub payment_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub amount: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentMethodInfo {
    pub id: PaymentMethod,
    #[schema(value_type = String)]
    pub name: &'static str,
    #[schema(value_type = String)]
    pub description: &'static str,
    #[schema(value_type = String)]
    pub currency: &'static str,
    pub requires_phone: bool,
    pub requires_card: bool,
    pub demo_mode: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentMethodList {
    pub methods: Vec<PaymentMethodInfo>,
}

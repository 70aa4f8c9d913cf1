use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// Mutations recorded in `audit_logs`. Each maps to a stable action string
/// and the table it touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    CartAdd,
    CartRemove,
    OrderCreate,
    OrderCancel,
    OrderStatusUpdate,
    PaymentSettle,
    ProductCreate,
    ProductUpdate,
    InventoryAdjust,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::CartAdd => "cart_add",
            AuditAction::CartRemove => "cart_remove",
            AuditAction::OrderCreate => "order_create",
            AuditAction::OrderCancel => "order_cancel",
            AuditAction::OrderStatusUpdate => "order_status_update",
            AuditAction::PaymentSettle => "payment_settle",
            AuditAction::ProductCreate => "product_create",
            AuditAction::ProductUpdate => "product_update",
            AuditAction::InventoryAdjust => "inventory_adjust",
        }
    }

    pub fn resource(self) -> &'static str {
        match self {
            AuditAction::CartAdd | AuditAction::CartRemove => "cart_items",
            AuditAction::OrderCreate
            | AuditAction::OrderCancel
            | AuditAction::OrderStatusUpdate
            | AuditAction::PaymentSettle => "orders",
            AuditAction::ProductCreate
            | AuditAction::ProductUpdate
            | AuditAction::InventoryAdjust => "products",
        }
    }
}

/// Append one audit row. Callers run this after their transaction commits
/// and only log a warning on failure.
pub async fn log_audit(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: AuditAction,
    metadata: Option<Value>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(action.as_str())
    .bind(action.resource())
    .bind(metadata)
    .execute(pool)
    .await?;

    tracing::debug!(action = action.as_str(), ?user_id, "audit recorded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_name_the_table_they_touch() {
        assert_eq!(AuditAction::OrderCreate.as_str(), "order_create");
        assert_eq!(AuditAction::PaymentSettle.resource(), "orders");
        assert_eq!(AuditAction::CartRemove.resource(), "cart_items");
        assert_eq!(AuditAction::InventoryAdjust.resource(), "products");
    }
}

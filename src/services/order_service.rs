use std::collections::HashMap;

use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    FromQueryResult, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Set, Statement, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    domain::{OrderStatus, PaymentStatus},
    dto::orders::{CreateOrderRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        carts::{Column as CartCol, Entity as Carts},
        order_items::{self, ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::Column as ProdCol,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_elevated, ensure_owner_or_elevated},
    models::{Order, OrderItem, parse_column},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::inventory_service,
    state::AppState,
};

/// A cart line joined with its product, read under a row lock on the product.
#[derive(Debug, Clone, FromQueryResult)]
pub struct CheckoutLine {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub price: i64,
    pub stock: i32,
    pub is_active: bool,
}

/// Check every line against live stock and return the frozen order total.
/// Fails on the first unavailable or short line so no partial order exists.
pub fn validate_checkout(lines: &[CheckoutLine]) -> AppResult<i64> {
    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let mut total: i64 = 0;
    for line in lines {
        if line.quantity < 1 {
            return Err(AppError::InvalidInput("Cart has invalid quantity".into()));
        }
        if !line.is_active {
            return Err(AppError::InvalidInput(format!(
                "{} is no longer available",
                line.name
            )));
        }
        if line.stock < line.quantity {
            return Err(AppError::InsufficientStock {
                product_id: line.product_id,
                name: line.name.clone(),
            });
        }
        let line_total = line
            .price
            .checked_mul(i64::from(line.quantity))
            .ok_or_else(|| AppError::InvalidInput("Order total overflow".into()))?;
        total = total
            .checked_add(line_total)
            .ok_or_else(|| AppError::InvalidInput("Order total overflow".into()))?;
    }
    Ok(total)
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let shipping_address = payload.shipping_address.trim().to_string();
    let phone = payload.phone.trim().to_string();
    if shipping_address.is_empty() {
        return Err(AppError::InvalidInput("shipping_address is required".into()));
    }
    if phone.is_empty() {
        return Err(AppError::InvalidInput("phone is required".into()));
    }
    let notes = payload
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let txn = state.orm.begin().await?;

    // Locking the cart row serializes checkouts of the same cart.
    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::EmptyCart)?;

    // Product rows are locked in id order so concurrent checkouts over
    // overlapping products queue instead of deadlocking.
    let lines = CheckoutLine::find_by_statement(Statement::from_sql_and_values(
        txn.get_database_backend(),
        r#"
        SELECT ci.product_id, p.name, ci.quantity, p.price, p.stock, p.is_active
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.product_id
        FOR UPDATE OF p
        "#,
        [cart.id.into()],
    ))
    .all(&txn)
    .await?;

    let total_amount = validate_checkout(&lines)?;

    // Conditional decrements; any failure drops the transaction and rolls
    // back the lines already reserved.
    for line in &lines {
        inventory_service::reserve(&txn, line.product_id, line.quantity).await?;
    }

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        total_amount: Set(total_amount),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        payment_method: Set(payload.payment_method.as_str().to_string()),
        payment_status: Set(PaymentStatus::Pending.as_str().to_string()),
        payment_id: Set(None),
        shipping_address: Set(shipping_address),
        phone: Set(phone),
        notes: Set(notes),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for line in &lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            price: Set(line.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(item.into());
    }

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        user_id = %user.user_id,
        total = total_amount,
        lines = items.len(),
        "order created"
    );

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::OrderCreate,
        Some(serde_json::json!({ "order_id": order.id, "total_amount": total_amount })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::ok(
        "Order created",
        OrderWithItems {
            order: Order::try_from(order)?,
            items,
        },
    ))
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    ensure_owner_or_elevated(user, order.user_id)?;

    let order = cancel_locked(&txn, order).await?;
    let items = load_items(&txn, order.id).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::OrderCancel,
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::ok(
        "Order cancelled",
        OrderWithItems {
            order: Order::try_from(order)?,
            items,
        },
    ))
}

/// Move a locked `PENDING` order to `CANCELLED` and credit its lines back.
/// The status guard in the `UPDATE` makes stock restoration happen at most
/// once per order.
async fn cancel_locked(txn: &DatabaseTransaction, order: OrderModel) -> AppResult<OrderModel> {
    let current: OrderStatus = parse_column(&order.status)?;
    let rejected = AppError::InvalidTransition {
        from: current,
        to: OrderStatus::Cancelled,
    };
    if !current.can_transition_to(OrderStatus::Cancelled) {
        return Err(rejected);
    }

    let result = Orders::update_many()
        .col_expr(OrderCol::Status, Expr::value(OrderStatus::Cancelled.as_str()))
        .col_expr(OrderCol::PaymentStatus, Expr::value(PaymentStatus::Failed.as_str()))
        .col_expr(OrderCol::UpdatedAt, Expr::current_timestamp().into())
        .filter(OrderCol::Id.eq(order.id))
        .filter(OrderCol::Status.eq(OrderStatus::Pending.as_str()))
        .exec(txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(rejected);
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(txn)
        .await?;
    for item in &items {
        inventory_service::release(txn, item.product_id, item.quantity).await?;
    }

    tracing::info!(order_id = %order.id, lines = items.len(), "order cancelled, stock restored");

    Orders::find_by_id(order.id)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound("Order"))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_elevated(user)?;
    let next: OrderStatus = payload.status.parse().map_err(AppError::InvalidInput)?;

    let txn = state.orm.begin().await?;
    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    let current: OrderStatus = parse_column(&order.status)?;

    let order = if next == OrderStatus::Cancelled {
        cancel_locked(&txn, order).await?
    } else {
        if !current.can_transition_to(next) {
            return Err(AppError::InvalidTransition { from: current, to: next });
        }
        let result = Orders::update_many()
            .col_expr(OrderCol::Status, Expr::value(next.as_str()))
            .col_expr(OrderCol::UpdatedAt, Expr::current_timestamp().into())
            .filter(OrderCol::Id.eq(order.id))
            .filter(OrderCol::Status.eq(current.as_str()))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::InvalidTransition { from: current, to: next });
        }
        Orders::find_by_id(order.id)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound("Order"))?
    };

    let items = load_items(&txn, order.id).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, from = %current, to = %next, "order status updated");

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::OrderStatusUpdate,
        Some(serde_json::json!({ "order_id": order.id, "from": current, "to": next })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::ok(
        "Order updated",
        OrderWithItems {
            order: Order::try_from(order)?,
            items,
        },
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let condition = query
        .condition()?
        .add(OrderCol::UserId.eq(user.user_id));
    list_with_condition(state, condition, &query, None).await
}

/// Orders containing at least one of the seller's products, with lines
/// restricted to those products.
pub async fn list_seller_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_elevated(user)?;

    let order_ids: Vec<Uuid> = OrderItems::find()
        .select_only()
        .column(OrderItemCol::OrderId)
        .distinct()
        .join(JoinType::InnerJoin, order_items::Relation::Products.def())
        .filter(ProdCol::SellerId.eq(user.user_id))
        .into_tuple()
        .all(&state.orm)
        .await?;

    let condition = query.condition()?.add(OrderCol::Id.is_in(order_ids));
    list_with_condition(state, condition, &query, Some(user.user_id)).await
}

pub(crate) async fn list_with_condition(
    state: &AppState,
    condition: Condition,
    query: &OrderListQuery,
    seller_id: Option<Uuid>,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = attach_items(&state.orm, orders, seller_id).await?;
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    ensure_owner_or_elevated(user, order.user_id)?;

    let items = load_items(&state.orm, order.id).await?;
    Ok(ApiResponse::ok(
        "OK",
        OrderWithItems {
            order: Order::try_from(order)?,
            items,
        },
    ))
}

pub(crate) async fn load_items<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();
    Ok(items)
}

async fn attach_items<C: ConnectionTrait>(
    conn: &C,
    orders: Vec<OrderModel>,
    seller_id: Option<Uuid>,
) -> AppResult<Vec<OrderWithItems>> {
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut finder = OrderItems::find().filter(OrderItemCol::OrderId.is_in(ids));
    if let Some(seller_id) = seller_id {
        finder = finder
            .join(JoinType::InnerJoin, order_items::Relation::Products.def())
            .filter(ProdCol::SellerId.eq(seller_id));
    }

    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in finder.order_by_asc(OrderItemCol::CreatedAt).all(conn).await? {
        grouped.entry(item.order_id).or_default().push(item.into());
    }

    orders
        .into_iter()
        .map(|order| {
            let items = grouped.remove(&order.id).unwrap_or_default();
            Ok(OrderWithItems {
                order: Order::try_from(order)?,
                items,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, stock: i32, price: i64) -> CheckoutLine {
        CheckoutLine {
            product_id: Uuid::new_v4(),
            name: "Mechanical keyboard".into(),
            quantity,
            price,
            stock,
            is_active: true,
        }
    }

    #[test]
    fn total_is_frozen_from_line_prices() {
        let lines = vec![line(3, 5, 12_000), line(1, 1, 500)];
        assert_eq!(validate_checkout(&lines).unwrap(), 36_500);
    }

    #[test]
    fn empty_cart_is_rejected() {
        assert!(matches!(validate_checkout(&[]), Err(AppError::EmptyCart)));
    }

    #[test]
    fn short_line_names_the_product() {
        let ok = line(1, 5, 100);
        let short = line(10, 5, 100);
        let short_id = short.product_id;
        match validate_checkout(&[ok, short]) {
            Err(AppError::InsufficientStock { product_id, name }) => {
                assert_eq!(product_id, short_id);
                assert_eq!(name, "Mechanical keyboard");
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn inactive_product_blocks_checkout() {
        let mut inactive = line(1, 5, 100);
        inactive.is_active = false;
        assert!(matches!(
            validate_checkout(&[inactive]),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn overflow_is_rejected() {
        assert!(validate_checkout(&[line(2, 5, i64::MAX)]).is_err());
    }
}

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    db::DbPool,
    dto::cart::{AddToCartRequest, CartLine, CartProduct, CartView, UpdateCartItemRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::CartItem,
    response::ApiResponse,
};

#[derive(FromRow)]
struct CartLineRow {
    item_id: Uuid,
    quantity: i32,
    product_id: Uuid,
    name: String,
    price: i64,
    stock: i32,
    is_active: bool,
    added_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ProductStockRow {
    name: String,
    stock: i32,
    is_active: bool,
}

/// Return the caller's cart, creating it on first use. Safe to race:
/// the unique `user_id` constraint collapses concurrent creations.
pub async fn get_or_create_cart(pool: &DbPool, user_id: Uuid) -> AppResult<Uuid> {
    sqlx::query("INSERT INTO carts (id, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
        .bind(Uuid::new_v4())
        .bind(user_id)
        .execute(pool)
        .await?;

    let (cart_id,): (Uuid,) = sqlx::query_as("SELECT id FROM carts WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(cart_id)
}

pub async fn get_cart(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let cart = load_cart(pool, user.user_id).await?;
    Ok(ApiResponse::ok("OK", cart))
}

pub async fn add_item(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    let quantity = payload.quantity.unwrap_or(1);
    if quantity < 1 {
        return Err(AppError::InvalidInput("quantity must be at least 1".into()));
    }

    let product = find_product(pool, payload.product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or(AppError::NotFound("Product"))?;
    if product.stock < quantity {
        return Err(AppError::InsufficientStock {
            product_id: payload.product_id,
            name: product.name,
        });
    }

    let cart_id = get_or_create_cart(pool, user.user_id).await?;

    // Insert-or-increment in one statement so parallel adds never lose an
    // update; the cumulative quantity is checked against live stock on the
    // locked row.
    let item: Option<CartItem> = sqlx::query_as(
        r#"
        INSERT INTO cart_items (id, cart_id, product_id, quantity)
        SELECT $1, $2, p.id, $4
        FROM products p
        WHERE p.id = $3 AND p.is_active AND p.stock >= $4
        ON CONFLICT (cart_id, product_id) DO UPDATE
        SET quantity = cart_items.quantity + EXCLUDED.quantity
        WHERE cart_items.quantity + EXCLUDED.quantity
              <= (SELECT stock FROM products WHERE id = EXCLUDED.product_id)
        RETURNING id, cart_id, product_id, quantity, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(cart_id)
    .bind(payload.product_id)
    .bind(quantity)
    .fetch_optional(pool)
    .await?;

    let Some(item) = item else {
        // The product may have changed since the first read.
        let current = find_product(pool, payload.product_id).await?;
        return Err(rejected_add(payload.product_id, current));
    };

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        AuditAction::CartAdd,
        Some(serde_json::json!({
            "product_id": item.product_id,
            "added": quantity,
            "quantity": item.quantity,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let cart = load_cart(pool, user.user_id).await?;
    Ok(ApiResponse::ok("Added to cart", cart))
}

pub async fn update_item(
    pool: &DbPool,
    user: &AuthUser,
    item_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartView>> {
    if payload.quantity < 1 {
        return Err(AppError::InvalidInput("Quantity must be at least 1".into()));
    }

    let product: Option<(Uuid, String, i32)> = sqlx::query_as(
        r#"
        SELECT p.id, p.name, p.stock
        FROM cart_items ci
        JOIN carts c ON c.id = ci.cart_id
        JOIN products p ON p.id = ci.product_id
        WHERE ci.id = $1 AND c.user_id = $2
        "#,
    )
    .bind(item_id)
    .bind(user.user_id)
    .fetch_optional(pool)
    .await?;
    let (product_id, name, stock) = product.ok_or(AppError::NotFound("Cart item"))?;

    if stock < payload.quantity {
        return Err(AppError::InsufficientStock { product_id, name });
    }

    // Stock is re-checked in the write itself in case it dropped since the read.
    let updated = sqlx::query(
        r#"
        UPDATE cart_items ci
        SET quantity = $3
        FROM carts c, products p
        WHERE ci.id = $1 AND c.id = ci.cart_id AND c.user_id = $2
          AND p.id = ci.product_id AND p.stock >= $3
        "#,
    )
    .bind(item_id)
    .bind(user.user_id)
    .bind(payload.quantity)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::InsufficientStock { product_id, name });
    }

    let cart = load_cart(pool, user.user_id).await?;
    Ok(ApiResponse::ok("Cart updated", cart))
}

pub async fn remove_item(
    pool: &DbPool,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<CartView>> {
    let result = sqlx::query(
        r#"
        DELETE FROM cart_items ci
        USING carts c
        WHERE ci.id = $1 AND c.id = ci.cart_id AND c.user_id = $2
        "#,
    )
    .bind(item_id)
    .bind(user.user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Cart item"));
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        AuditAction::CartRemove,
        Some(serde_json::json!({ "item_id": item_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let cart = load_cart(pool, user.user_id).await?;
    Ok(ApiResponse::ok("Removed from cart", cart))
}

pub async fn clear_cart(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    sqlx::query(
        "DELETE FROM cart_items ci USING carts c WHERE c.id = ci.cart_id AND c.user_id = $1",
    )
    .bind(user.user_id)
    .execute(pool)
    .await?;

    let cart = load_cart(pool, user.user_id).await?;
    Ok(ApiResponse::ok("Cart cleared", cart))
}

/// Sum of `price * quantity` over the lines, using whatever prices the
/// lines were loaded with (live product prices for a cart).
pub fn cart_total(lines: &[CartLine]) -> AppResult<i64> {
    lines.iter().try_fold(0i64, |acc, line| {
        acc.checked_add(line.line_total)
            .ok_or_else(|| AppError::InvalidInput("Cart total overflow".into()))
    })
}

fn line_total(price: i64, quantity: i32) -> AppResult<i64> {
    price
        .checked_mul(i64::from(quantity))
        .ok_or_else(|| AppError::InvalidInput("Cart line total overflow".into()))
}

async fn load_cart(pool: &DbPool, user_id: Uuid) -> AppResult<CartView> {
    let cart_id = get_or_create_cart(pool, user_id).await?;

    let rows = sqlx::query_as::<_, CartLineRow>(
        r#"
        SELECT ci.id AS item_id, ci.quantity, ci.created_at AS added_at,
               p.id AS product_id, p.name, p.price, p.stock, p.is_active
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.created_at, ci.id
        "#,
    )
    .bind(cart_id)
    .fetch_all(pool)
    .await?;

    let items = rows
        .into_iter()
        .map(|row| {
            Ok(CartLine {
                id: row.item_id,
                quantity: row.quantity,
                line_total: line_total(row.price, row.quantity)?,
                added_at: row.added_at,
                product: CartProduct {
                    id: row.product_id,
                    name: row.name,
                    price: row.price,
                    stock: row.stock,
                    is_active: row.is_active,
                },
            })
        })
        .collect::<AppResult<Vec<CartLine>>>()?;

    Ok(CartView {
        id: cart_id,
        user_id,
        total: cart_total(&items)?,
        item_count: items.iter().map(|line| i64::from(line.quantity)).sum(),
        items,
    })
}

/// Why an add that passed the pre-checks inserted nothing: the product is
/// gone or deactivated, or the cumulative quantity exceeds live stock.
fn rejected_add(product_id: Uuid, current: Option<ProductStockRow>) -> AppError {
    match current {
        Some(product) if product.is_active => AppError::InsufficientStock {
            product_id,
            name: product.name,
        },
        _ => AppError::NotFound("Product"),
    }
}

async fn find_product(pool: &DbPool, product_id: Uuid) -> AppResult<Option<ProductStockRow>> {
    let row = sqlx::query_as::<_, ProductStockRow>(
        "SELECT name, stock, is_active FROM products WHERE id = $1",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: i32) -> CartLine {
        CartLine {
            id: Uuid::new_v4(),
            quantity,
            line_total: price * i64::from(quantity),
            added_at: Utc::now(),
            product: CartProduct {
                id: Uuid::new_v4(),
                name: "Keycap set".into(),
                price,
                stock: 10,
                is_active: true,
            },
        }
    }

    #[test]
    fn total_sums_line_totals() {
        let lines = vec![line(1_500, 2), line(250, 4)];
        assert_eq!(cart_total(&lines).unwrap(), 4_000);
    }

    #[test]
    fn empty_cart_totals_zero() {
        assert_eq!(cart_total(&[]).unwrap(), 0);
    }

    #[test]
    fn rejected_add_reports_deactivation_as_not_found() {
        let id = Uuid::new_v4();
        let row = |is_active| ProductStockRow {
            name: "Keycap set".into(),
            stock: 3,
            is_active,
        };
        assert!(matches!(
            rejected_add(id, Some(row(false))),
            AppError::NotFound("Product")
        ));
        assert!(matches!(rejected_add(id, None), AppError::NotFound("Product")));
        assert!(matches!(
            rejected_add(id, Some(row(true))),
            AppError::InsufficientStock { product_id, .. } if product_id == id
        ));
    }

    #[test]
    fn total_overflow_is_rejected() {
        let half = i64::MAX / 2 + 1;
        let err = cart_total(&[line(half, 1), line(half, 1)]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn line_overflow_is_rejected() {
        assert!(matches!(
            line_total(i64::MAX / 2 + 1, 2),
            Err(AppError::InvalidInput(_))
        ));
        assert_eq!(line_total(1_500, 3).unwrap(), 4_500);
    }
}

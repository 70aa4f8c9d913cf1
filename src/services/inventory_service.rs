//! Stock ledger. Every mutation is a single conditional `UPDATE` so no
//! reader can ever see negative stock, whether it runs inside a caller's
//! transaction or directly on the pool.

use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    entity::products::{Column as ProdCol, Entity as Products},
    error::{AppError, AppResult},
};

/// Decrement stock by `quantity` only if at least that much is on hand.
/// Fails with `InsufficientStock` and leaves stock untouched otherwise.
pub async fn reserve<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<()> {
    if quantity < 1 {
        return Err(AppError::InvalidInput(
            "reservation quantity must be at least 1".into(),
        ));
    }

    let result = Products::update_many()
        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(quantity))
        .col_expr(ProdCol::UpdatedAt, Expr::current_timestamp().into())
        .filter(ProdCol::Id.eq(product_id))
        .filter(ProdCol::Stock.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        let name = product_name(conn, product_id)
            .await?
            .ok_or(AppError::NotFound("Product"))?;
        tracing::info!(%product_id, quantity, "reservation rejected");
        return Err(AppError::InsufficientStock { product_id, name });
    }

    Ok(())
}

/// Credit stock back. Callers must only release what they reserved earlier;
/// the order state machine is what keeps this from running twice.
pub async fn release<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<()> {
    if quantity < 1 {
        return Err(AppError::InvalidInput(
            "release quantity must be at least 1".into(),
        ));
    }

    let result = Products::update_many()
        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(quantity))
        .col_expr(ProdCol::UpdatedAt, Expr::current_timestamp().into())
        .filter(ProdCol::Id.eq(product_id))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        tracing::warn!(%product_id, quantity, "release targeted a missing product");
    }

    Ok(())
}

/// Apply a signed delta, refusing any change that would go below zero.
/// Returns the new stock level.
pub async fn adjust<C: ConnectionTrait>(conn: &C, product_id: Uuid, delta: i32) -> AppResult<i32> {
    if delta == 0 {
        return Err(AppError::InvalidInput("delta must not be 0".into()));
    }
    if delta < 0 {
        let quantity = delta
            .checked_neg()
            .ok_or_else(|| AppError::InvalidInput("delta is out of range".into()))?;
        reserve(conn, product_id, quantity).await?;
    } else {
        let result = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(delta))
            .col_expr(ProdCol::UpdatedAt, Expr::current_timestamp().into())
            .filter(ProdCol::Id.eq(product_id))
            .exec(conn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Product"));
        }
    }

    current_stock(conn, product_id)
        .await?
        .ok_or(AppError::NotFound("Product"))
}

pub async fn current_stock<C: ConnectionTrait>(conn: &C, product_id: Uuid) -> AppResult<Option<i32>> {
    let stock = Products::find_by_id(product_id)
        .select_only()
        .column(ProdCol::Stock)
        .into_tuple::<i32>()
        .one(conn)
        .await?;
    Ok(stock)
}

async fn product_name<C: ConnectionTrait>(conn: &C, product_id: Uuid) -> AppResult<Option<String>> {
    let name = Products::find_by_id(product_id)
        .select_only()
        .column(ProdCol::Name)
        .into_tuple::<String>()
        .one(conn)
        .await?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use sea_orm::DatabaseConnection;

    use super::*;

    #[tokio::test]
    async fn adjust_rejects_out_of_range_deltas_before_touching_the_db() {
        let conn = DatabaseConnection::Disconnected;
        let id = Uuid::new_v4();
        assert!(matches!(
            adjust(&conn, id, i32::MIN).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            adjust(&conn, id, 0).await,
            Err(AppError::InvalidInput(_))
        ));
    }
}

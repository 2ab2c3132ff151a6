//! Stock ledger: every change to `products.stock` goes through here, always
//! inside the caller's transaction.

use std::collections::BTreeMap;

use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Expr, LockType},
};
use uuid::Uuid;

use crate::{
    entity::{
        Products,
        order_items,
        products::{self, Column as ProdCol},
    },
    error::{AppError, AppResult},
};

/// Lock the given product rows `FOR UPDATE`. Rows are locked in ascending id
/// order so that concurrent checkouts over overlapping products cannot deadlock.
pub async fn lock_products<C: ConnectionTrait>(
    conn: &C,
    product_ids: &[Uuid],
) -> AppResult<Vec<products::Model>> {
    let mut ids = product_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    Ok(Products::find()
        .filter(ProdCol::Id.is_in(ids))
        .order_by_asc(ProdCol::Id)
        .lock(LockType::Update)
        .all(conn)
        .await?)
}

/// Take `quantity` units out of stock. The update only matches while enough
/// stock remains, so the balance can never go negative.
pub async fn reserve<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<()> {
    let result = Products::update_many()
        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(quantity))
        .col_expr(ProdCol::UpdatedAt, Expr::current_timestamp().into())
        .filter(ProdCol::Id.eq(product_id))
        .filter(ProdCol::Stock.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected != 1 {
        return Err(AppError::InvalidState(format!(
            "Insufficient stock for product {product_id}"
        )));
    }
    Ok(())
}

/// Put the quantities recorded on an order's lines back into stock. Rows are
/// locked and updated in the same ascending id order checkout uses.
pub async fn restore<C: ConnectionTrait>(
    conn: &C,
    items: &[order_items::Model],
) -> AppResult<()> {
    let mut quantities: BTreeMap<Uuid, i32> = BTreeMap::new();
    for item in items {
        *quantities.entry(item.product_id).or_default() += item.quantity;
    }
    let ids: Vec<Uuid> = quantities.keys().copied().collect();
    lock_products(conn, &ids).await?;

    for (product_id, quantity) in quantities {
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(quantity))
            .col_expr(ProdCol::UpdatedAt, Expr::current_timestamp().into())
            .filter(ProdCol::Id.eq(product_id))
            .exec(conn)
            .await?;
    }
    tracing::debug!(lines = items.len(), "stock restored");
    Ok(())
}

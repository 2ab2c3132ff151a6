//! Per-user cart. Stock is checked when a line is written but nothing is
//! reserved; checkout re-verifies under row locks.

use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, sea_query::OnConflict,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartLine, CartView, UpdateCartItemRequest},
    entity::{
        CartItems, Carts, Products,
        cart_items::{self, Column as CartItemCol},
        carts::{self, Column as CartCol},
        products,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Fetch the user's cart, creating it on first access.
pub async fn get_or_create_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<carts::Model> {
    if let Some(cart) = Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .one(conn)
        .await?
    {
        return Ok(cart);
    }

    let active = carts::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        created_at: NotSet,
    };
    Carts::insert(active)
        .on_conflict(OnConflict::column(CartCol::UserId).do_nothing().to_owned())
        .exec_without_returning(conn)
        .await?;

    Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("cart missing after insert")))
}

async fn cart_view<C: ConnectionTrait>(conn: &C, cart: &carts::Model) -> AppResult<CartView> {
    let rows = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .find_also_related(Products)
        .all(conn)
        .await?;

    let items: Vec<CartLine> = rows
        .into_iter()
        .filter_map(|(item, product)| {
            product.map(|product| CartLine {
                id: item.id,
                product_id: product.id,
                name: product.name,
                price: product.price,
                image: product.image,
                stock: product.stock,
                quantity: item.quantity,
                subtotal: product.price * i64::from(item.quantity),
            })
        })
        .collect();

    Ok(CartView {
        id: cart.id,
        item_count: items.iter().map(|line| i64::from(line.quantity)).sum(),
        subtotal: items.iter().map(|line| line.subtotal).sum(),
        items,
    })
}

fn ensure_in_stock(product: &products::Model, quantity: i32) -> AppResult<()> {
    if quantity > product.stock {
        return Err(AppError::BadRequest(format!(
            "Not enough stock for {}: {} available",
            product.name, product.stock
        )));
    }
    Ok(())
}

async fn find_line<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
    product_id: Uuid,
) -> AppResult<Option<cart_items::Model>> {
    Ok(CartItems::find()
        .filter(CartItemCol::CartId.eq(cart_id))
        .filter(CartItemCol::ProductId.eq(product_id))
        .one(conn)
        .await?)
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let cart = get_or_create_cart(&state.orm, user.user_id).await?;
    Ok(ApiResponse::ok(cart_view(&state.orm, &cart).await?))
}

pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    let quantity = payload.quantity()?;
    let product = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    let cart = get_or_create_cart(&state.orm, user.user_id).await?;

    match find_line(&state.orm, cart.id, product.id).await? {
        Some(line) => {
            let merged = line
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| AppError::BadRequest("Quantity is too large".into()))?;
            ensure_in_stock(&product, merged)?;
            let mut active: cart_items::ActiveModel = line.into();
            active.quantity = Set(merged);
            active.update(&state.orm).await?;
        }
        None => {
            ensure_in_stock(&product, quantity)?;
            cart_items::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product.id),
                quantity: Set(quantity),
                created_at: NotSet,
            }
            .insert(&state.orm)
            .await?;
        }
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        "cart_items",
        serde_json::json!({ "product_id": product.id, "quantity": quantity }),
    )
    .await;

    let view = cart_view(&state.orm, &cart).await?;
    Ok(ApiResponse::success("Added to cart", view, Some(Meta::empty())))
}

pub async fn update_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartView>> {
    if payload.quantity < 1 {
        return Err(AppError::BadRequest("Quantity must be at least 1".into()));
    }
    let cart = get_or_create_cart(&state.orm, user.user_id).await?;
    let line = find_line(&state.orm, cart.id, product_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart item"))?;
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    ensure_in_stock(&product, payload.quantity)?;

    let mut active: cart_items::ActiveModel = line.into();
    active.quantity = Set(payload.quantity);
    active.update(&state.orm).await?;

    let view = cart_view(&state.orm, &cart).await?;
    Ok(ApiResponse::success("Cart updated", view, Some(Meta::empty())))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<CartView>> {
    let cart = get_or_create_cart(&state.orm, user.user_id).await?;
    let result = CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(product_id))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Cart item"));
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_remove",
        "cart_items",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    let view = cart_view(&state.orm, &cart).await?;
    Ok(ApiResponse::success("Removed from cart", view, Some(Meta::empty())))
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let cart = get_or_create_cart(&state.orm, user.user_id).await?;
    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&state.orm)
        .await?;

    let view = cart_view(&state.orm, &cart).await?;
    Ok(ApiResponse::success("Cart cleared", view, Some(Meta::empty())))
}

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait, sea_query::LockType,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{
        CheckoutResponse, CreateOrderRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest,
    },
    entity::{
        Addresses, CartItems, Carts, OrderItems, Orders,
        addresses::{self, Column as AddrCol},
        cart_items::Column as CartItemCol,
        carts::Column as CartCol,
        enums::{OrderStatus, PaymentStatus},
        order_items::{self, Column as OrderItemCol},
        orders::{self, Column as OrderCol},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{payment_service, stock},
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: i64,
    pub shipping: i64,
    pub total: i64,
}

/// Sum `(unit price, quantity)` lines and add shipping. Overflow is an error.
pub fn compute_totals(lines: &[(i64, i32)], shipping: i64) -> AppResult<Totals> {
    let overflow = || AppError::BadRequest("Order total is too large".into());
    let subtotal = lines.iter().try_fold(0i64, |acc, &(price, quantity)| {
        price
            .checked_mul(i64::from(quantity))
            .and_then(|line| acc.checked_add(line))
            .ok_or_else(overflow)
    })?;
    let total = subtotal.checked_add(shipping).ok_or_else(overflow)?;
    Ok(Totals {
        subtotal,
        shipping,
        total,
    })
}

fn address_snapshot(address: &addresses::Model) -> serde_json::Value {
    serde_json::json!({
        "id": address.id,
        "name": address.name,
        "address": address.address,
        "city": address.city,
        "zip_code": address.zip_code,
    })
}

/// Turn the user's cart into an order in one transaction: lock and re-check
/// stock, write the order and its lines, take the stock, empty the cart.
pub async fn place_order(
    db: &DatabaseConnection,
    user_id: Uuid,
    payload: &CreateOrderRequest,
    shipping_fee: i64,
) -> AppResult<(orders::Model, Vec<order_items::Model>)> {
    let txn = db.begin().await?;

    // Holding the cart row serializes checkouts of the same cart; a second
    // checkout sees the lines the first one cleared.
    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Cart"))?;

    let lines = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .all(&txn)
        .await?;
    if lines.is_empty() {
        return Err(AppError::NotFound("Cart is empty".into()));
    }

    let address = Addresses::find_by_id(payload.shipping_address_id)
        .filter(AddrCol::UserId.eq(user_id))
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid shipping address".into()))?;

    let product_ids: Vec<Uuid> = lines.iter().map(|line| line.product_id).collect();
    let products: HashMap<Uuid, _> = stock::lock_products(&txn, &product_ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut priced = Vec::with_capacity(lines.len());
    for line in &lines {
        let product = products
            .get(&line.product_id)
            .ok_or_else(|| AppError::not_found("Product"))?;
        if product.stock < line.quantity {
            return Err(AppError::InvalidState(format!(
                "Insufficient stock for {}: {} available",
                product.name, product.stock
            )));
        }
        priced.push((product, line.quantity));
    }

    let totals = compute_totals(
        &priced
            .iter()
            .map(|(product, quantity)| (product.price, *quantity))
            .collect::<Vec<_>>(),
        shipping_fee,
    )?;

    let order = orders::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        subtotal: Set(totals.subtotal),
        shipping: Set(totals.shipping),
        total: Set(totals.total),
        status: Set(OrderStatus::Processing),
        payment_status: Set(PaymentStatus::Pending),
        payment_method: Set(payload.payment_method.trim().to_string()),
        shipping_address: Set(address_snapshot(&address)),
        payment_token: Set(None),
        payment_redirect_url: Set(None),
        gateway_event_at: Set(None),
        paid_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(priced.len());
    for (product, quantity) in &priced {
        let item = order_items::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            product_name: Set(product.name.clone()),
            product_image: Set(product.image.clone()),
            price: Set(product.price),
            quantity: Set(*quantity),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(item);

        stock::reserve(&txn, product.id, *quantity).await?;
    }

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;

    txn.commit().await?;
    Ok((order, items))
}

pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    payload.validate()?;
    let shipping_fee = payload
        .shipping_fee
        .unwrap_or(state.config.default_shipping_fee);

    let (order, items) = place_order(&state.orm, user.user_id, &payload, shipping_fee).await?;
    tracing::info!(order_id = %order.id, total = order.total, "order placed");

    audit::record(
        &state.pool,
        Some(user.user_id),
        "checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "total": order.total }),
    )
    .await;

    // The order is committed; a gateway failure leaves it payable later.
    let (order, payment) = match payment_service::begin_payment(state, order.clone(), &items).await
    {
        Ok((order, intent)) => (order, Some(intent)),
        Err(err) => {
            tracing::warn!(order_id = %order.id, error = %err, "payment initialization failed");
            (order, None)
        }
    };

    Ok(ApiResponse::success(
        "Order created",
        CheckoutResponse {
            order: order.into(),
            items: items.into_iter().map(Into::into).collect(),
            payment,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();
    if !(query.all.unwrap_or(false) && user.is_admin()) {
        condition = condition.add(OrderCol::UserId.eq(user.user_id));
    }
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status: OrderStatus = status.parse().map_err(AppError::BadRequest)?;
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let finder = Orders::find().filter(condition);
    let finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn order_items<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> AppResult<Vec<order_items::Model>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .order_by_asc(OrderItemCol::Id)
        .all(conn)
        .await?)
}

/// Load an order with a row lock held until the surrounding transaction ends.
pub async fn lock_order<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<orders::Model> {
    Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))
}

fn with_items(order: orders::Model, items: Vec<order_items::Model>) -> OrderWithItems {
    OrderWithItems {
        order: order.into(),
        items: items.into_iter().map(Into::into).collect(),
    }
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    user.ensure_owner_or_admin(order.user_id)?;

    let items = order_items(&state.orm, order.id).await?;
    Ok(ApiResponse::success("OK", with_items(order, items), Some(Meta::empty())))
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;
    let order = lock_order(&txn, id).await?;

    if order.user_id != user.user_id {
        return Err(AppError::Forbidden(
            "You can only cancel your own orders".into(),
        ));
    }
    if order.status != OrderStatus::Processing {
        return Err(AppError::InvalidState(format!(
            "Only PROCESSING orders can be cancelled; order is {}",
            order.status
        )));
    }

    let items = order_items(&txn, order.id).await?;
    stock::restore(&txn, &items).await?;

    let paid = order.payment_status == PaymentStatus::Paid;
    let mut active: orders::ActiveModel = order.into();
    active.status = Set(OrderStatus::Cancelled);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    if paid {
        tracing::warn!(order_id = %order.id, "paid order cancelled; refund required");
    }
    tracing::info!(order_id = %order.id, "order cancelled");
    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_cancel",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order cancelled",
        with_items(order, items),
        Some(Meta::empty()),
    ))
}

pub async fn update_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let next: OrderStatus = payload.status.parse().map_err(AppError::BadRequest)?;

    let txn = state.orm.begin().await?;
    let order = lock_order(&txn, id).await?;
    let current = order.status;

    if !current.can_transition_to(next) {
        return Err(AppError::InvalidState(format!(
            "Cannot change order status from {current} to {next}"
        )));
    }

    let items = order_items(&txn, order.id).await?;
    if current == OrderStatus::Processing && next == OrderStatus::Cancelled {
        stock::restore(&txn, &items).await?;
        if order.payment_status == PaymentStatus::Paid {
            tracing::warn!(order_id = %order.id, "paid order cancelled by admin; refund required");
        }
    }

    let mut active: orders::ActiveModel = order.into();
    active.status = Set(next);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, from = %current, to = %next, "order status updated");
    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": current, "to": next }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order status updated",
        with_items(order, items),
        Some(Meta::empty()),
    ))
}

mod common;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use storefront_api::{
    dto::orders::{CreateOrderRequest, UpdateOrderStatusRequest},
    entity::{
        Orders,
        enums::{OrderStatus, PaymentStatus},
    },
    error::AppError,
    payment::{Notification, reconcile::is_stale},
    services::{cart_service, order_service, payment_service},
};
use uuid::Uuid;

use common::{
    add_to_cart, create_address, create_category, create_product, create_user, setup, stock_of,
};

fn order_request(address_id: Uuid) -> CreateOrderRequest {
    CreateOrderRequest {
        shipping_address_id: address_id,
        payment_method: "bank_transfer".into(),
        shipping_fee: Some(10),
    }
}

fn at(value: &str) -> chrono::NaiveDateTime {
    storefront_api::payment::midtrans::parse_gateway_time(value).expect("timestamp")
}

#[tokio::test]
async fn checkout_places_order_takes_stock_and_empties_cart() -> anyhow::Result<()> {
    let Some((state, gateway)) = setup().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let category = create_category(&state).await?;
    let a = create_product(&state, category, 100, 5).await?;
    let b = create_product(&state, category, 50, 5).await?;
    let address = create_address(&state, &user).await?;

    add_to_cart(&state, &user, a, 1).await?;
    add_to_cart(&state, &user, b, 1).await?;
    // Adding again merges into the existing line.
    add_to_cart(&state, &user, b, 1).await?;

    let resp = order_service::checkout(&state, &user, order_request(address)).await?;
    let data = resp.data.expect("checkout data");

    assert_eq!(data.order.subtotal, 200);
    assert_eq!(data.order.shipping, 10);
    assert_eq!(data.order.total, 210);
    assert_eq!(data.order.status, OrderStatus::Processing);
    assert_eq!(data.order.payment_status, PaymentStatus::Pending);
    assert_eq!(data.items.len(), 2);
    assert_eq!(data.order.shipping_address["city"], "Bandung");

    let payment = data.payment.expect("payment intent");
    assert_eq!(payment.token, format!("tok-{}", data.order.id));

    assert_eq!(stock_of(&state, a).await?, 4);
    assert_eq!(stock_of(&state, b).await?, 3);

    let cart = cart_service::get_cart(&state, &user).await?.data.expect("cart");
    assert!(cart.items.is_empty());
    assert_eq!(cart.subtotal, 0);

    let stored = Orders::find_by_id(data.order.id)
        .one(&state.orm)
        .await?
        .expect("stored order");
    assert_eq!(stored.payment_token.as_deref(), Some(payment.token.as_str()));

    let sent = gateway
        .created()
        .into_iter()
        .find(|req| req.transaction_details.order_id == data.order.id.to_string())
        .expect("gateway request");
    assert_eq!(sent.items_total(), sent.transaction_details.gross_amount);

    // Lines written in one transaction share a timestamp; id breaks the tie.
    let fetched = order_service::get_order(&state, &user, data.order.id)
        .await?
        .data
        .expect("order");
    let ids: Vec<Uuid> = fetched.items.iter().map(|item| item.id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);

    Ok(())
}

#[tokio::test]
async fn checkout_rejects_empty_cart_and_foreign_address() -> anyhow::Result<()> {
    let Some((state, _gateway)) = setup().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let stranger = create_user(&state, "user").await?;
    let address = create_address(&state, &user).await?;
    let foreign_address = create_address(&state, &stranger).await?;

    let err = order_service::checkout(&state, &user, order_request(address))
        .await
        .expect_err("empty cart");
    assert!(matches!(err, AppError::NotFound(_)));

    let category = create_category(&state).await?;
    let product = create_product(&state, category, 100, 3).await?;
    add_to_cart(&state, &user, product, 2).await?;

    let err = order_service::checkout(&state, &user, order_request(foreign_address))
        .await
        .expect_err("foreign address");
    assert!(matches!(err, AppError::BadRequest(_)));

    // Nothing was taken by the failed attempt.
    assert_eq!(stock_of(&state, product).await?, 3);
    let cart = cart_service::get_cart(&state, &user).await?.data.expect("cart");
    assert_eq!(cart.item_count, 2);

    Ok(())
}

#[tokio::test]
async fn checkout_fails_atomically_when_stock_ran_out() -> anyhow::Result<()> {
    let Some((state, _gateway)) = setup().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let other = create_user(&state, "user").await?;
    let category = create_category(&state).await?;
    let plenty = create_product(&state, category, 20, 10).await?;
    let scarce = create_product(&state, category, 30, 2).await?;
    let address = create_address(&state, &user).await?;
    let other_address = create_address(&state, &other).await?;

    add_to_cart(&state, &user, plenty, 3).await?;
    add_to_cart(&state, &user, scarce, 2).await?;
    add_to_cart(&state, &other, scarce, 1).await?;

    order_service::checkout(&state, &other, order_request(other_address)).await?;
    assert_eq!(stock_of(&state, scarce).await?, 1);

    let err = order_service::checkout(&state, &user, order_request(address))
        .await
        .expect_err("stock is short");
    assert!(matches!(err, AppError::InvalidState(_)));

    assert_eq!(stock_of(&state, plenty).await?, 10);
    assert_eq!(stock_of(&state, scarce).await?, 1);
    let cart = cart_service::get_cart(&state, &user).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 2);

    Ok(())
}

#[tokio::test]
async fn concurrent_checkouts_sell_the_last_unit_once() -> anyhow::Result<()> {
    let Some((state, _gateway)) = setup().await? else {
        return Ok(());
    };
    let category = create_category(&state).await?;
    let product = create_product(&state, category, 500, 1).await?;

    let first = create_user(&state, "user").await?;
    let second = create_user(&state, "user").await?;
    let first_address = create_address(&state, &first).await?;
    let second_address = create_address(&state, &second).await?;
    add_to_cart(&state, &first, product, 1).await?;
    add_to_cart(&state, &second, product, 1).await?;

    let first_req = order_request(first_address);
    let second_req = order_request(second_address);
    let (a, b) = tokio::join!(
        order_service::checkout(&state, &first, first_req),
        order_service::checkout(&state, &second, second_req),
    );

    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1, "exactly one checkout may win the last unit");
    let loser = if a.is_err() { a.err() } else { b.err() };
    assert!(matches!(loser, Some(AppError::InvalidState(_))));
    assert_eq!(stock_of(&state, product).await?, 0);

    Ok(())
}

#[tokio::test]
async fn concurrent_checkouts_of_one_cart_place_one_order() -> anyhow::Result<()> {
    let Some((state, _gateway)) = setup().await? else {
        return Ok(());
    };
    let category = create_category(&state).await?;

    for _ in 0..10 {
        let user = create_user(&state, "user").await?;
        let address = create_address(&state, &user).await?;
        let product = create_product(&state, category, 40, 10).await?;
        add_to_cart(&state, &user, product, 1).await?;

        let (a, b) = tokio::join!(
            order_service::checkout(&state, &user, order_request(address)),
            order_service::checkout(&state, &user, order_request(address)),
        );

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1, "one cart must not become two orders");
        let loser = if a.is_err() { a.err() } else { b.err() };
        assert!(matches!(loser, Some(AppError::NotFound(_))));
        assert_eq!(stock_of(&state, product).await?, 9);

        let orders = Orders::find()
            .filter(storefront_api::entity::orders::Column::UserId.eq(user.user_id))
            .all(&state.orm)
            .await?;
        assert_eq!(orders.len(), 1);
    }

    Ok(())
}

#[tokio::test]
async fn gateway_failure_keeps_the_order_payable_later() -> anyhow::Result<()> {
    let Some((state, gateway)) = setup().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let category = create_category(&state).await?;
    let product = create_product(&state, category, 75, 4).await?;
    let address = create_address(&state, &user).await?;
    add_to_cart(&state, &user, product, 2).await?;

    gateway.fail_next_creates(true);
    let data = order_service::checkout(&state, &user, order_request(address))
        .await?
        .data
        .expect("checkout data");
    assert!(data.payment.is_none());
    assert_eq!(stock_of(&state, product).await?, 2);

    let err = payment_service::create_payment(
        &state,
        &user,
        storefront_api::dto::payments::CreatePaymentRequest {
            order_id: data.order.id,
        },
    )
    .await
    .expect_err("gateway still down");
    assert!(matches!(err, AppError::Upstream(_)));

    gateway.fail_next_creates(false);
    let intent = payment_service::create_payment(
        &state,
        &user,
        storefront_api::dto::payments::CreatePaymentRequest {
            order_id: data.order.id,
        },
    )
    .await?
    .data
    .expect("intent");
    assert_eq!(intent.order_id, data.order.id);
    assert!(intent.redirect_url.ends_with(&data.order.id.to_string()));

    Ok(())
}

#[tokio::test]
async fn cancel_restores_stock_once_and_checks_ownership() -> anyhow::Result<()> {
    let Some((state, _gateway)) = setup().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let stranger = create_user(&state, "user").await?;
    let category = create_category(&state).await?;
    let a = create_product(&state, category, 100, 5).await?;
    let b = create_product(&state, category, 50, 5).await?;
    let address = create_address(&state, &user).await?;
    add_to_cart(&state, &user, a, 1).await?;
    add_to_cart(&state, &user, b, 2).await?;

    let order = order_service::checkout(&state, &user, order_request(address))
        .await?
        .data
        .expect("checkout data")
        .order;
    assert_eq!(stock_of(&state, a).await?, 4);
    assert_eq!(stock_of(&state, b).await?, 3);

    let err = order_service::cancel_order(&state, &stranger, order.id)
        .await
        .expect_err("not the owner");
    assert!(matches!(err, AppError::Forbidden(_)));

    let cancelled = order_service::cancel_order(&state, &user, order.id)
        .await?
        .data
        .expect("cancelled order");
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&state, a).await?, 5);
    assert_eq!(stock_of(&state, b).await?, 5);

    let err = order_service::cancel_order(&state, &user, order.id)
        .await
        .expect_err("already cancelled");
    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(stock_of(&state, a).await?, 5);

    Ok(())
}

#[tokio::test]
async fn admin_status_updates_follow_the_transition_table() -> anyhow::Result<()> {
    let Some((state, _gateway)) = setup().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let admin = create_user(&state, "admin").await?;
    let category = create_category(&state).await?;
    let product = create_product(&state, category, 40, 3).await?;
    let address = create_address(&state, &user).await?;
    add_to_cart(&state, &user, product, 1).await?;
    let order = order_service::checkout(&state, &user, order_request(address))
        .await?
        .data
        .expect("checkout data")
        .order;

    let status = |s: &str| UpdateOrderStatusRequest { status: s.into() };

    let err = order_service::update_status(&state, &user, order.id, status("SHIPPED"))
        .await
        .expect_err("admin only");
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = order_service::update_status(&state, &admin, order.id, status("LOST"))
        .await
        .expect_err("unknown status");
    assert!(matches!(err, AppError::BadRequest(_)));

    let shipped = order_service::update_status(&state, &admin, order.id, status("shipped"))
        .await?
        .data
        .expect("shipped");
    assert_eq!(shipped.order.status, OrderStatus::Shipped);

    let err = order_service::update_status(&state, &admin, order.id, status("CANCELLED"))
        .await
        .expect_err("shipped orders cannot be cancelled");
    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(stock_of(&state, product).await?, 2);

    let err = order_service::cancel_order(&state, &user, order.id)
        .await
        .expect_err("only PROCESSING orders can be cancelled");
    assert!(matches!(err, AppError::InvalidState(_)));

    Ok(())
}

#[tokio::test]
async fn settlement_marks_paid_and_stale_reports_are_ignored() -> anyhow::Result<()> {
    let Some((state, gateway)) = setup().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let category = create_category(&state).await?;
    let product = create_product(&state, category, 100, 5).await?;
    let address = create_address(&state, &user).await?;
    add_to_cart(&state, &user, product, 2).await?;
    let order = order_service::checkout(&state, &user, order_request(address))
        .await?
        .data
        .expect("checkout data")
        .order;

    gateway.script(
        order.id,
        "settlement",
        None,
        Some("210.00"),
        Some(at("2025-03-01 10:05:00")),
    );
    let result = payment_service::check_status(&state, &user, order.id)
        .await?
        .data
        .expect("reconcile result");
    assert!(result.applied);
    assert_eq!(result.payment_status, PaymentStatus::Paid);
    assert_eq!(result.order_status, OrderStatus::Processing);

    let stored = Orders::find_by_id(order.id)
        .one(&state.orm)
        .await?
        .expect("order");
    assert!(stored.paid_at.is_some());
    assert!(!is_stale(stored.gateway_event_at, Some(at("2025-03-01 10:05:00"))));

    // An older "pending" delivered late must not touch the order.
    gateway.script(
        order.id,
        "pending",
        None,
        Some("210.00"),
        Some(at("2025-03-01 10:00:00")),
    );
    let result = payment_service::handle_notification(
        &state,
        Notification {
            order_id: order.id.to_string(),
            transaction_id: None,
            transaction_status: Some("pending".into()),
            fraud_status: None,
        },
    )
    .await?
    .data
    .expect("reconcile result");
    assert!(!result.applied);
    assert_eq!(result.payment_status, PaymentStatus::Paid);

    // Redelivery of the same settlement is a no-op.
    gateway.script(
        order.id,
        "settlement",
        None,
        Some("210.00"),
        Some(at("2025-03-01 10:05:00")),
    );
    let result = payment_service::check_status(&state, &user, order.id)
        .await?
        .data
        .expect("reconcile result");
    assert!(!result.applied);
    assert_eq!(stock_of(&state, product).await?, 3);

    let err = payment_service::create_payment(
        &state,
        &user,
        storefront_api::dto::payments::CreatePaymentRequest { order_id: order.id },
    )
    .await
    .expect_err("already paid");
    assert!(matches!(err, AppError::InvalidState(_)));

    Ok(())
}

#[tokio::test]
async fn expiry_cancels_pending_order_and_restocks() -> anyhow::Result<()> {
    let Some((state, gateway)) = setup().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let category = create_category(&state).await?;
    let product = create_product(&state, category, 100, 5).await?;
    let address = create_address(&state, &user).await?;
    add_to_cart(&state, &user, product, 3).await?;
    let order = order_service::checkout(&state, &user, order_request(address))
        .await?
        .data
        .expect("checkout data")
        .order;
    assert_eq!(stock_of(&state, product).await?, 2);

    gateway.script(order.id, "expire", None, None, Some(at("2025-03-02 09:00:00")));
    let result = payment_service::handle_notification(
        &state,
        Notification {
            order_id: order.id.to_string(),
            transaction_id: None,
            transaction_status: Some("expire".into()),
            fraud_status: None,
        },
    )
    .await?
    .data
    .expect("reconcile result");

    assert!(result.applied);
    assert_eq!(result.payment_status, PaymentStatus::Failed);
    assert_eq!(result.order_status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&state, product).await?, 5);

    // A later settlement cannot revive a failed payment or restock twice.
    gateway.script(order.id, "settlement", None, None, Some(at("2025-03-02 09:30:00")));
    let result = payment_service::check_status(&state, &user, order.id)
        .await?
        .data
        .expect("reconcile result");
    assert_eq!(result.payment_status, PaymentStatus::Failed);
    assert_eq!(result.order_status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&state, product).await?, 5);

    Ok(())
}

#[tokio::test]
async fn mismatched_gross_amount_is_rejected() -> anyhow::Result<()> {
    let Some((state, gateway)) = setup().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let category = create_category(&state).await?;
    let product = create_product(&state, category, 100, 5).await?;
    let address = create_address(&state, &user).await?;
    add_to_cart(&state, &user, product, 1).await?;
    let order = order_service::checkout(&state, &user, order_request(address))
        .await?
        .data
        .expect("checkout data")
        .order;

    gateway.script(order.id, "settlement", None, Some("1.00"), None);
    let err = payment_service::check_status(&state, &user, order.id)
        .await
        .expect_err("amount mismatch");
    assert!(matches!(err, AppError::BadRequest(_)));

    let stored = Orders::find_by_id(order.id)
        .one(&state.orm)
        .await?
        .expect("order");
    assert_eq!(stored.payment_status, PaymentStatus::Pending);

    let stranger = create_user(&state, "user").await?;
    let err = payment_service::check_status(&state, &stranger, order.id)
        .await
        .expect_err("not the owner");
    assert!(matches!(err, AppError::Forbidden(_)));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancels_over_shared_products_both_restock() -> anyhow::Result<()> {
    let Some((state, _gateway)) = setup().await? else {
        return Ok(());
    };
    let category = create_category(&state).await?;

    for _ in 0..10 {
        let x = create_product(&state, category, 30, 10).await?;
        let y = create_product(&state, category, 20, 10).await?;

        let first = create_user(&state, "user").await?;
        let first_address = create_address(&state, &first).await?;
        add_to_cart(&state, &first, x, 1).await?;
        add_to_cart(&state, &first, y, 2).await?;
        let first_order = order_service::checkout(&state, &first, order_request(first_address))
            .await?
            .data
            .expect("checkout data")
            .order
            .id;

        let second = create_user(&state, "user").await?;
        let second_address = create_address(&state, &second).await?;
        add_to_cart(&state, &second, y, 3).await?;
        add_to_cart(&state, &second, x, 4).await?;
        let second_order = order_service::checkout(&state, &second, order_request(second_address))
            .await?
            .data
            .expect("checkout data")
            .order
            .id;

        assert_eq!(stock_of(&state, x).await?, 5);
        assert_eq!(stock_of(&state, y).await?, 5);

        let (a, b) = {
            let (s1, s2) = (state.clone(), state.clone());
            let (u1, u2) = (first.clone(), second.clone());
            let a = tokio::spawn(async move {
                order_service::cancel_order(&s1, &u1, first_order).await.map(|_| ())
            });
            let b = tokio::spawn(async move {
                order_service::cancel_order(&s2, &u2, second_order).await.map(|_| ())
            });
            (a.await?, b.await?)
        };
        a?;
        b?;

        assert_eq!(stock_of(&state, x).await?, 10);
        assert_eq!(stock_of(&state, y).await?, 10);
    }

    Ok(())
}

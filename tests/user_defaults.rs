mod common;

use serde_json::json;
use storefront_api::{
    dto::users::PaymentMethodRequest,
    entity::enums::PaymentMethodType,
    error::AppError,
    services::user_service,
};

use common::{address_request, create_user, setup};

#[tokio::test]
async fn exactly_one_default_address_survives_every_write() -> anyhow::Result<()> {
    let Some((state, _gateway)) = setup().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;

    let first = user_service::create_address(&state, &user, address_request("Home", None))
        .await?
        .data
        .expect("address");
    assert!(first.is_default, "first address becomes the default");

    let second = user_service::create_address(&state, &user, address_request("Office", Some(true)))
        .await?
        .data
        .expect("address");
    let third = user_service::create_address(&state, &user, address_request("Parents", Some(false)))
        .await?
        .data
        .expect("address");

    let list = user_service::list_addresses(&state, &user)
        .await?
        .data
        .expect("addresses")
        .items;
    assert_eq!(list.len(), 3);
    assert_eq!(list.iter().filter(|a| a.is_default).count(), 1);
    assert_eq!(list[0].id, second.id, "default is listed first");

    user_service::update_address(&state, &user, third.id, address_request("Parents", Some(true)))
        .await?;
    let list = user_service::list_addresses(&state, &user)
        .await?
        .data
        .expect("addresses")
        .items;
    assert_eq!(list.iter().filter(|a| a.is_default).count(), 1);
    assert_eq!(list[0].id, third.id);

    user_service::delete_address(&state, &user, third.id).await?;
    let list = user_service::list_addresses(&state, &user)
        .await?
        .data
        .expect("addresses")
        .items;
    assert_eq!(list.len(), 2);
    assert_eq!(list.iter().filter(|a| a.is_default).count(), 1);

    let stranger = create_user(&state, "user").await?;
    let err = user_service::delete_address(&state, &stranger, first.id)
        .await
        .expect_err("foreign address");
    assert!(matches!(err, AppError::Forbidden(_)));

    Ok(())
}

#[tokio::test]
async fn payment_methods_share_the_single_default_rule() -> anyhow::Result<()> {
    let Some((state, _gateway)) = setup().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let request = |is_default: Option<bool>| PaymentMethodRequest {
        method_type: PaymentMethodType::EWallet,
        details: json!({ "provider": "gopay" }),
        is_default,
    };

    let first = user_service::create_payment_method(&state, &user, request(None))
        .await?
        .data
        .expect("method");
    assert!(first.is_default);

    let second = user_service::create_payment_method(&state, &user, request(Some(true)))
        .await?
        .data
        .expect("method");

    let list = user_service::list_payment_methods(&state, &user)
        .await?
        .data
        .expect("methods")
        .items;
    assert_eq!(list.iter().filter(|m| m.is_default).count(), 1);
    assert_eq!(list[0].id, second.id);

    user_service::delete_payment_method(&state, &user, second.id).await?;
    let list = user_service::list_payment_methods(&state, &user)
        .await?
        .data
        .expect("methods")
        .items;
    assert_eq!(list.len(), 1);
    assert!(list[0].is_default, "remaining method is promoted");

    Ok(())
}

#[tokio::test]
async fn concurrent_first_writes_leave_one_default() -> anyhow::Result<()> {
    let Some((state, _gateway)) = setup().await? else {
        return Ok(());
    };
    let method = |is_default: Option<bool>| PaymentMethodRequest {
        method_type: PaymentMethodType::CreditCard,
        details: json!({ "last4": "4242" }),
        is_default,
    };

    for _ in 0..10 {
        let user = create_user(&state, "user").await?;

        let (a, b) = tokio::join!(
            user_service::create_address(&state, &user, address_request("Home", None)),
            user_service::create_address(&state, &user, address_request("Office", None)),
        );
        a?;
        b?;
        let addresses = user_service::list_addresses(&state, &user)
            .await?
            .data
            .expect("addresses")
            .items;
        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses.iter().filter(|a| a.is_default).count(), 1);

        let (a, b) = tokio::join!(
            user_service::create_payment_method(&state, &user, method(None)),
            user_service::create_payment_method(&state, &user, method(Some(true))),
        );
        a?;
        b?;
        let methods = user_service::list_payment_methods(&state, &user)
            .await?
            .data
            .expect("methods")
            .items;
        assert_eq!(methods.len(), 2);
        assert_eq!(methods.iter().filter(|m| m.is_default).count(), 1);
    }

    Ok(())
}

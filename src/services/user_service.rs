//! Profile, address book and saved payment methods.
//!
//! Addresses and payment methods share the single-default rule: after any
//! write a user with at least one record has exactly one default.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, LockType},
};
use uuid::Uuid;

use crate::{
    audit,
    dto::users::{
        AddressList, AddressRequest, PaymentMethodList, PaymentMethodRequest, UpdateProfileRequest,
    },
    entity::{
        Addresses, PaymentMethods, Users,
        addresses::{self, Column as AddrCol},
        payment_methods::{self, Column as PmCol},
        users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Address, PaymentMethod, User},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn get_profile(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let model = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(ApiResponse::ok(model.into()))
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    payload.validate()?;
    let model = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let mut active: users::ActiveModel = model.into();
    if let Some(first_name) = payload.first_name {
        active.first_name = Set(first_name.trim().to_string());
    }
    if let Some(last_name) = payload.last_name {
        active.last_name = Set(last_name.trim().to_string());
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(Some(phone.trim().to_string()));
    }
    active.updated_at = Set(Utc::now().into());
    let model = active.update(&state.orm).await?;

    Ok(ApiResponse::success("Profile updated", model.into(), Some(Meta::empty())))
}

// Addresses

/// Lock the user's row for the rest of the transaction. Every write that can
/// change which address or payment method is the default takes this lock
/// first, so concurrent writes for one user run one after another.
async fn lock_user<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<()> {
    Users::find_by_id(user_id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(())
}

pub async fn list_addresses(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AddressList>> {
    let items = Addresses::find()
        .filter(AddrCol::UserId.eq(user.user_id))
        .order_by_desc(AddrCol::IsDefault)
        .order_by_desc(AddrCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Address::from)
        .collect();
    Ok(ApiResponse::ok(AddressList { items }))
}

async fn owned_address<C: ConnectionTrait>(
    conn: &C,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<addresses::Model> {
    let address = Addresses::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Address"))?;
    if address.user_id != user.user_id {
        return Err(AppError::Forbidden(
            "You do not have access to this address".into(),
        ));
    }
    Ok(address)
}

async fn clear_default_addresses<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<()> {
    Addresses::update_many()
        .col_expr(AddrCol::IsDefault, Expr::value(false))
        .filter(AddrCol::UserId.eq(user_id))
        .filter(AddrCol::IsDefault.eq(true))
        .exec(conn)
        .await?;
    Ok(())
}

/// Make the most recently created address other than `except` the default.
/// Returns false when there is no such address.
async fn promote_latest_address<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    except: Option<Uuid>,
) -> AppResult<bool> {
    let mut finder = Addresses::find().filter(AddrCol::UserId.eq(user_id));
    if let Some(id) = except {
        finder = finder.filter(AddrCol::Id.ne(id));
    }
    let Some(next) = finder.order_by_desc(AddrCol::CreatedAt).one(conn).await? else {
        return Ok(false);
    };
    clear_default_addresses(conn, user_id).await?;
    let mut active: addresses::ActiveModel = next.into();
    active.is_default = Set(true);
    active.update(conn).await?;
    Ok(true)
}

pub async fn create_address(
    state: &AppState,
    user: &AuthUser,
    payload: AddressRequest,
) -> AppResult<ApiResponse<Address>> {
    payload.validate()?;
    let txn = state.orm.begin().await?;
    lock_user(&txn, user.user_id).await?;

    let existing = Addresses::find()
        .filter(AddrCol::UserId.eq(user.user_id))
        .count(&txn)
        .await?;
    let is_default = payload.is_default.unwrap_or(false) || existing == 0;
    if is_default {
        clear_default_addresses(&txn, user.user_id).await?;
    }

    let address = addresses::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        name: Set(payload.name.trim().to_string()),
        address: Set(payload.address.trim().to_string()),
        city: Set(payload.city.trim().to_string()),
        zip_code: Set(payload.zip_code.trim().to_string()),
        is_default: Set(is_default),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "address_create",
        "addresses",
        serde_json::json!({ "address_id": address.id }),
    )
    .await;

    Ok(ApiResponse::success("Address added", address.into(), Some(Meta::empty())))
}

pub async fn update_address(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: AddressRequest,
) -> AppResult<ApiResponse<Address>> {
    payload.validate()?;
    let txn = state.orm.begin().await?;
    lock_user(&txn, user.user_id).await?;
    let existing = owned_address(&txn, user, id).await?;
    let was_default = existing.is_default;

    let is_default = match payload.is_default {
        Some(true) => {
            clear_default_addresses(&txn, user.user_id).await?;
            true
        }
        // Unsetting the default hands it to another address, if there is one.
        Some(false) if was_default => {
            !promote_latest_address(&txn, user.user_id, Some(id)).await?
        }
        _ => was_default,
    };

    let mut active: addresses::ActiveModel = existing.into();
    active.name = Set(payload.name.trim().to_string());
    active.address = Set(payload.address.trim().to_string());
    active.city = Set(payload.city.trim().to_string());
    active.zip_code = Set(payload.zip_code.trim().to_string());
    active.is_default = Set(is_default);
    active.updated_at = Set(Utc::now().into());
    let address = active.update(&txn).await?;
    txn.commit().await?;

    Ok(ApiResponse::success("Address updated", address.into(), Some(Meta::empty())))
}

pub async fn delete_address(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;
    lock_user(&txn, user.user_id).await?;
    let existing = owned_address(&txn, user, id).await?;
    Addresses::delete_by_id(existing.id).exec(&txn).await?;
    if existing.is_default {
        promote_latest_address(&txn, user.user_id, None).await?;
    }
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "address_delete",
        "addresses",
        serde_json::json!({ "address_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Address deleted",
        serde_json::json!({ "id": id }),
        Some(Meta::empty()),
    ))
}

// Payment methods

pub async fn list_payment_methods(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<PaymentMethodList>> {
    let items = PaymentMethods::find()
        .filter(PmCol::UserId.eq(user.user_id))
        .order_by_desc(PmCol::IsDefault)
        .order_by_desc(PmCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(PaymentMethod::from)
        .collect();
    Ok(ApiResponse::ok(PaymentMethodList { items }))
}

async fn clear_default_payment_methods<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<()> {
    PaymentMethods::update_many()
        .col_expr(PmCol::IsDefault, Expr::value(false))
        .filter(PmCol::UserId.eq(user_id))
        .filter(PmCol::IsDefault.eq(true))
        .exec(conn)
        .await?;
    Ok(())
}

pub async fn create_payment_method(
    state: &AppState,
    user: &AuthUser,
    payload: PaymentMethodRequest,
) -> AppResult<ApiResponse<PaymentMethod>> {
    payload.validate()?;
    let txn = state.orm.begin().await?;
    lock_user(&txn, user.user_id).await?;

    let existing = PaymentMethods::find()
        .filter(PmCol::UserId.eq(user.user_id))
        .count(&txn)
        .await?;
    let is_default = payload.is_default.unwrap_or(false) || existing == 0;
    if is_default {
        clear_default_payment_methods(&txn, user.user_id).await?;
    }

    let method = payment_methods::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        method_type: Set(payload.method_type),
        details: Set(payload.details),
        is_default: Set(is_default),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Payment method added",
        method.into(),
        Some(Meta::empty()),
    ))
}

pub async fn delete_payment_method(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;
    lock_user(&txn, user.user_id).await?;
    let existing = PaymentMethods::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Payment method"))?;
    if existing.user_id != user.user_id {
        return Err(AppError::Forbidden(
            "You do not have access to this payment method".into(),
        ));
    }

    PaymentMethods::delete_by_id(id).exec(&txn).await?;
    if existing.is_default {
        let next = PaymentMethods::find()
            .filter(PmCol::UserId.eq(user.user_id))
            .order_by_desc(PmCol::CreatedAt)
            .one(&txn)
            .await?;
        if let Some(next) = next {
            let mut active: payment_methods::ActiveModel = next.into();
            active.is_default = Set(true);
            active.update(&txn).await?;
        }
    }
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Payment method deleted",
        serde_json::json!({ "id": id }),
        Some(Meta::empty()),
    ))
}

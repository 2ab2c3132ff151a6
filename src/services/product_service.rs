use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set,
    sea_query::{Expr, extension::postgres::PgExpr},
};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::{
        Categories, OrderItems, Products,
        order_items::Column as OrderItemCol,
        products::{ActiveModel, Column, Entity},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{HighlightQuery, ProductQuery, ProductSortBy, SearchQuery, SortOrder},
    state::AppState,
};

/// Which curated product list to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    Featured,
    NewArrivals,
    BestSellers,
    /// Products carrying an old price.
    Deals,
}

fn search_condition(search: &str, include_brand: bool) -> Condition {
    let pattern = format!("%{}%", search.trim());
    let mut condition = Condition::any()
        .add(Expr::col(Column::Name).ilike(pattern.clone()))
        .add(Expr::col(Column::Description).ilike(pattern.clone()));
    if include_brand {
        condition = condition.add(Expr::col(Column::Brand).ilike(pattern));
    }
    condition
}

async fn paginate(
    state: &AppState,
    finder: Select<Entity>,
    page: i64,
    limit: i64,
    offset: i64,
) -> AppResult<ApiResponse<ProductList>> {
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.trim().is_empty()) {
        condition = condition.add(search_condition(search, false));
    }
    if let Some(category_id) = query.category {
        condition = condition.add(Column::CategoryId.eq(category_id));
    }
    if let Some(brand) = query.brand.as_ref().filter(|s| !s.trim().is_empty()) {
        condition = condition.add(Expr::col(Column::Brand).ilike(brand.trim().to_string()));
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_col = match query.sort_by.unwrap_or(ProductSortBy::CreatedAt) {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
        ProductSortBy::Stock => Column::Stock,
    };

    let finder = Products::find().filter(condition);
    let finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    paginate(state, finder, page, limit, offset).await
}

pub async fn search_products(
    state: &AppState,
    query: SearchQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let search = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Search query is required".into()))?;
    let (page, limit, offset) = query.pagination().normalize();

    let finder = Products::find()
        .filter(search_condition(search, true))
        .order_by_asc(Column::Name);
    paginate(state, finder, page, limit, offset).await
}

pub async fn highlighted_products(
    state: &AppState,
    highlight: Highlight,
    query: HighlightQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let finder = Products::find();
    let finder = match highlight {
        Highlight::Featured => finder.filter(Column::Featured.eq(true)),
        Highlight::NewArrivals => finder.filter(Column::IsNewArrival.eq(true)),
        Highlight::BestSellers => finder.filter(Column::IsBestSeller.eq(true)),
        Highlight::Deals => finder.filter(Column::OldPrice.is_not_null()),
    };

    let items = finder
        .order_by_desc(Column::CreatedAt)
        .limit(query.limit())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::ok(ProductList { items }))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    Ok(ApiResponse::success("Product", product.into(), None))
}

async fn ensure_category_exists(state: &AppState, category_id: Uuid) -> AppResult<()> {
    if Categories::find_by_id(category_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::BadRequest("Category not found".into()));
    }
    Ok(())
}

async fn ensure_name_free(state: &AppState, name: &str, except: Option<Uuid>) -> AppResult<()> {
    let mut finder = Products::find().filter(Column::Name.eq(name));
    if let Some(id) = except {
        finder = finder.filter(Column::Id.ne(id));
    }
    if finder.one(&state.orm).await?.is_some() {
        return Err(AppError::BadRequest("Product name already exists".into()));
    }
    Ok(())
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    payload.validate()?;
    let name = payload.name.trim().to_string();
    ensure_category_exists(state, payload.category_id).await?;
    ensure_name_free(state, &name, None).await?;

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(payload.description),
        price: Set(payload.price),
        old_price: Set(payload.old_price),
        image: Set(payload.image),
        images: Set(serde_json::json!(payload.images.unwrap_or_default())),
        brand: Set(payload.brand),
        category_id: Set(payload.category_id),
        stock: Set(payload.stock),
        featured: Set(payload.featured.unwrap_or(false)),
        is_new_arrival: Set(payload.is_new_arrival.unwrap_or(false)),
        is_best_seller: Set(payload.is_best_seller.unwrap_or(false)),
        specifications: Set(payload
            .specifications
            .unwrap_or_else(|| serde_json::json!({}))),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product.into(),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    payload.validate()?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    if let Some(category_id) = payload.category_id {
        ensure_category_exists(state, category_id).await?;
    }

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        ensure_name_free(state, &name, Some(id)).await?;
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(old_price) = payload.old_price {
        active.old_price = Set(old_price);
    }
    if let Some(image) = payload.image {
        active.image = Set(Some(image));
    }
    if let Some(images) = payload.images {
        active.images = Set(serde_json::json!(images));
    }
    if let Some(brand) = payload.brand {
        active.brand = Set(Some(brand));
    }
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(category_id);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(featured) = payload.featured {
        active.featured = Set(featured);
    }
    if let Some(is_new_arrival) = payload.is_new_arrival {
        active.is_new_arrival = Set(is_new_arrival);
    }
    if let Some(is_best_seller) = payload.is_best_seller {
        active.is_best_seller = Set(is_best_seller);
    }
    if let Some(specifications) = payload.specifications {
        active.specifications = Set(specifications);
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success("Updated", product.into(), Some(Meta::empty())))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    // Order lines reference products; history must stay intact.
    let ordered = OrderItems::find()
        .filter(OrderItemCol::ProductId.eq(id))
        .count(&state.orm)
        .await?;
    if ordered > 0 {
        return Err(AppError::InvalidState(
            "Cannot delete a product that appears in orders".into(),
        ));
    }

    Products::delete_by_id(id).exec(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({ "id": id }),
        Some(Meta::empty()),
    ))
}

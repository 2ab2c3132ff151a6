use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::categories::{
        CategoryDetail, CategoryList, CategoryNode, CategoryProducts, CreateCategoryRequest,
        UpdateCategoryRequest,
    },
    entity::{
        Categories, Products,
        categories::{self, Column as CatCol},
        products::Column as ProdCol,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Category, CategorySummary, Product},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

async fn subcategories<C: ConnectionTrait>(
    conn: &C,
    parent_id: Uuid,
) -> AppResult<Vec<categories::Model>> {
    Ok(Categories::find()
        .filter(CatCol::ParentId.eq(parent_id))
        .order_by_asc(CatCol::Name)
        .all(conn)
        .await?)
}

async fn find_by_slug<C: ConnectionTrait>(conn: &C, slug: &str) -> AppResult<categories::Model> {
    Categories::find()
        .filter(CatCol::Slug.eq(slug))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))
}

async fn ensure_slug_free<C: ConnectionTrait>(
    conn: &C,
    slug: &str,
    except: Option<Uuid>,
) -> AppResult<()> {
    let mut finder = Categories::find().filter(CatCol::Slug.eq(slug));
    if let Some(id) = except {
        finder = finder.filter(CatCol::Id.ne(id));
    }
    if finder.one(conn).await?.is_some() {
        return Err(AppError::BadRequest("Category slug already exists".into()));
    }
    Ok(())
}

/// Reject a parent that does not exist or whose ancestor chain reaches `id`.
async fn ensure_valid_parent<C: ConnectionTrait>(
    conn: &C,
    id: Option<Uuid>,
    parent_id: Uuid,
) -> AppResult<()> {
    if Some(parent_id) == id {
        return Err(AppError::BadRequest("Category cannot be its own parent".into()));
    }

    let mut seen = HashSet::new();
    let mut cursor = Some(parent_id);
    while let Some(current) = cursor {
        if !seen.insert(current) {
            break;
        }
        let node = Categories::find_by_id(current)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::BadRequest("Parent category not found".into()))?;
        if Some(node.id) == id {
            return Err(AppError::BadRequest(
                "Category parent would create a cycle".into(),
            ));
        }
        cursor = node.parent_id;
    }
    Ok(())
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let all = Categories::find()
        .order_by_asc(CatCol::Name)
        .all(&state.orm)
        .await?;

    let items = all
        .iter()
        .filter(|c| c.parent_id.is_none())
        .map(|top| CategoryNode {
            category: top.clone().into(),
            subcategories: all
                .iter()
                .filter(|c| c.parent_id == Some(top.id))
                .cloned()
                .map(CategorySummary::from)
                .collect(),
        })
        .collect();

    Ok(ApiResponse::ok(CategoryList { items }))
}

pub async fn get_category(state: &AppState, slug: &str) -> AppResult<ApiResponse<CategoryDetail>> {
    let category = find_by_slug(&state.orm, slug).await?;

    let parent = match category.parent_id {
        Some(parent_id) => Categories::find_by_id(parent_id)
            .one(&state.orm)
            .await?
            .map(CategorySummary::from),
        None => None,
    };
    let subcategories = subcategories(&state.orm, category.id)
        .await?
        .into_iter()
        .map(CategorySummary::from)
        .collect();

    Ok(ApiResponse::ok(CategoryDetail {
        category: category.into(),
        parent,
        subcategories,
    }))
}

/// Products of a category and of its direct subcategories.
pub async fn category_products(
    state: &AppState,
    slug: &str,
    pagination: Pagination,
) -> AppResult<ApiResponse<CategoryProducts>> {
    let (page, limit, offset) = pagination.normalize();
    let category = find_by_slug(&state.orm, slug).await?;

    let mut ids: Vec<Uuid> = subcategories(&state.orm, category.id)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    ids.push(category.id);

    let finder = Products::find()
        .filter(ProdCol::CategoryId.is_in(ids))
        .order_by_desc(ProdCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        CategoryProducts {
            category: category.into(),
            items,
        },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;
    payload.validate()?;
    ensure_slug_free(&state.orm, &payload.slug, None).await?;
    if let Some(parent_id) = payload.parent_id {
        ensure_valid_parent(&state.orm, None, parent_id).await?;
    }

    let category = categories::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        slug: Set(payload.slug),
        description: Set(payload.description),
        image: Set(payload.image),
        parent_id: Set(payload.parent_id),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "category_create",
        "categories",
        serde_json::json!({ "category_id": category.id }),
    )
    .await;

    Ok(ApiResponse::success("Category created", category.into(), Some(Meta::empty())))
}

pub async fn update_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;
    payload.validate()?;
    let existing = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;

    if let Some(slug) = payload.slug.as_deref() {
        ensure_slug_free(&state.orm, slug, Some(id)).await?;
    }
    if let Some(Some(parent_id)) = payload.parent_id {
        ensure_valid_parent(&state.orm, Some(id), parent_id).await?;
    }

    let mut active: categories::ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(slug) = payload.slug {
        active.slug = Set(slug);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(image) = payload.image {
        active.image = Set(Some(image));
    }
    if let Some(parent_id) = payload.parent_id {
        active.parent_id = Set(parent_id);
    }
    active.updated_at = Set(Utc::now().into());
    let category = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "category_update",
        "categories",
        serde_json::json!({ "category_id": category.id }),
    )
    .await;

    Ok(ApiResponse::success("Updated", category.into(), Some(Meta::empty())))
}

pub async fn delete_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;

    let children = Categories::find()
        .filter(CatCol::ParentId.eq(id))
        .count(&state.orm)
        .await?;
    if children > 0 {
        return Err(AppError::InvalidState(
            "Cannot delete category with subcategories".into(),
        ));
    }
    let products = Products::find()
        .filter(ProdCol::CategoryId.eq(id))
        .count(&state.orm)
        .await?;
    if products > 0 {
        return Err(AppError::InvalidState(
            "Cannot delete category with products".into(),
        ));
    }

    Categories::delete_by_id(id).exec(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "category_delete",
        "categories",
        serde_json::json!({ "category_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({ "id": id }),
        Some(Meta::empty()),
    ))
}

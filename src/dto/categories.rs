use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Category, CategorySummary, Product},
    validation,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub parent_id: Option<Uuid>,
}

impl CreateCategoryRequest {
    pub fn validate(&self) -> AppResult<()> {
        validation::length_between("Category name", &self.name, 2, 50)?;
        validation::slug(&self.slug)?;
        if let Some(description) = self.description.as_deref() {
            validation::length_between("Description", description, 0, 500)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    /// `null` detaches the category from its parent.
    #[serde(default, deserialize_with = "super::double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub parent_id: Option<Option<Uuid>>,
}

impl UpdateCategoryRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(name) = self.name.as_deref() {
            validation::length_between("Category name", name, 2, 50)?;
        }
        if let Some(slug) = self.slug.as_deref() {
            validation::slug(slug)?;
        }
        if let Some(description) = self.description.as_deref() {
            validation::length_between("Description", description, 0, 500)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub subcategories: Vec<CategorySummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: Category,
    pub parent: Option<CategorySummary>,
    pub subcategories: Vec<CategorySummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryList {
    pub items: Vec<CategoryNode>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryProducts {
    pub category: Category,
    pub items: Vec<Product>,
}

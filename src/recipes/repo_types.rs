use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::ingredients::repo_types::IngredientId;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct RecipeId(pub i64);

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Recipe {
    pub id: RecipeId,
    pub author_id: Uuid,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image_key: Option<String>,
    pub pub_date: OffsetDateTime,
}

/// One `recipe_ingredients` row joined with its catalog entry.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeIngredientRow {
    pub recipe_id: RecipeId,
    pub ingredient_id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct RecipeTagRow {
    pub recipe_id: RecipeId,
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

/// Validated write model shared by create and update.
#[derive(Debug, Clone)]
pub struct RecipeDraft {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub tag_ids: Vec<i64>,
    pub ingredients: Vec<(IngredientId, i32)>,
}

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{error::ShoppingListError, model::RecipeIngredientLink};
use crate::{
    ingredients::repo_types::{Ingredient, IngredientId},
    recipes::repo_types::RecipeId,
};

/// Batch lookup of `recipe_ingredients` rows.
#[async_trait]
pub trait RecipeIngredientStore: Send + Sync {
    async fn links_for_recipes(
        &self,
        recipe_ids: &[RecipeId],
    ) -> Result<Vec<RecipeIngredientLink>, ShoppingListError>;
}

/// Batch lookup of catalog entries. Ids with no entry are simply absent from the result.
#[async_trait]
pub trait IngredientCatalog: Send + Sync {
    async fn ingredients_by_ids(
        &self,
        ids: &[IngredientId],
    ) -> Result<Vec<Ingredient>, ShoppingListError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn recipe_ids_in_cart(&self, user_id: Uuid) -> Result<Vec<RecipeId>, ShoppingListError>;
}

/// Postgres-backed implementation of every shopping list capability.
#[derive(Clone)]
pub struct PgShoppingStore {
    db: PgPool,
}

impl PgShoppingStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecipeIngredientStore for PgShoppingStore {
    async fn links_for_recipes(
        &self,
        recipe_ids: &[RecipeId],
    ) -> Result<Vec<RecipeIngredientLink>, ShoppingListError> {
        let ids: Vec<i64> = recipe_ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query_as::<_, RecipeIngredientLink>(
            r#"
            SELECT recipe_id, ingredient_id, quantity
              FROM recipe_ingredients
             WHERE recipe_id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl IngredientCatalog for PgShoppingStore {
    async fn ingredients_by_ids(
        &self,
        ids: &[IngredientId],
    ) -> Result<Vec<Ingredient>, ShoppingListError> {
        let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query_as::<_, Ingredient>(
            r#"
            SELECT id, name, measurement_unit
              FROM ingredients
             WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl CartStore for PgShoppingStore {
    async fn recipe_ids_in_cart(&self, user_id: Uuid) -> Result<Vec<RecipeId>, ShoppingListError> {
        let rows = sqlx::query_scalar::<_, RecipeId>(
            r#"
            SELECT recipe_id
              FROM shopping_cart
             WHERE user_id = $1
             ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

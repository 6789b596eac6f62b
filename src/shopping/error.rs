use thiserror::Error;

use crate::ingredients::repo_types::IngredientId;

#[derive(Debug, Error)]
pub enum ShoppingListError {
    #[error("ingredient {0} not found")]
    IngredientNotFound(IngredientId),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to render shopping list: {0}")]
    RenderFailure(#[from] std::io::Error),

    #[error("shopping list lookup failed: {0}")]
    Store(#[from] sqlx::Error),
}

impl ShoppingListError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::IngredientNotFound(_))
    }
}

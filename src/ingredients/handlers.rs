use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument};

use super::{
    repo,
    repo_types::{Ingredient, IngredientId},
};
use crate::{auth::AuthUser, error::AppError, state::AppState};

const MAX_FIELD_LEN: usize = 200;

#[derive(Debug, Deserialize)]
pub struct IngredientQuery {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateIngredientRequest {
    pub name: String,
    pub measurement_unit: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list_ingredients).post(create_ingredient))
        .route("/ingredients/:id", get(get_ingredient))
}

#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(q): Query<IngredientQuery>,
) -> Result<Json<Vec<Ingredient>>, AppError> {
    let prefix = q.name.as_deref().map(str::trim).filter(|p| !p.is_empty());
    Ok(Json(repo::search(&state.db, prefix).await?))
}

#[instrument(skip(state))]
pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Ingredient>, AppError> {
    repo::get(&state.db, IngredientId(id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Ingredient not found"))
}

#[instrument(skip(state, body))]
pub async fn create_ingredient(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateIngredientRequest>,
) -> Result<(StatusCode, Json<Ingredient>), AppError> {
    let name = body.name.trim();
    let unit = body.measurement_unit.trim();
    for (field, value) in [("name", name), ("measurement_unit", unit)] {
        if value.is_empty() || value.chars().count() > MAX_FIELD_LEN {
            return Err(AppError::bad_request(format!("Invalid {field}")));
        }
    }

    let ingredient = repo::create(&state.db, name, unit)
        .await?
        .ok_or_else(|| AppError::Conflict("Ingredient already exists".into()))?;

    info!(%user_id, ingredient_id = %ingredient.id, "ingredient created");
    Ok((StatusCode::CREATED, Json(ingredient)))
}

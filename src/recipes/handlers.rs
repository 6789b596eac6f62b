use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{RecipeQuery, RecipeRequest, RecipeResponse, RecipeShort},
    repo::{self, Membership, RecipeFilter},
    repo_types::{Recipe, RecipeId},
    services,
};
use crate::{
    auth::{AuthUser, MaybeAuthUser},
    error::AppError,
    images,
    pagination::Page,
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes))
        .route("/recipes/:id", get(get_recipe))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", post(create_recipe))
        .route(
            "/recipes/:id",
            axum::routing::patch(update_recipe).delete(delete_recipe),
        )
        .route("/recipes/:id/favorite", post(add_favorite).delete(remove_favorite))
        // base64 images inflate the body
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
}

/// Loads a recipe or answers 404.
pub(crate) async fn find_recipe(st: &AppState, id: i64) -> Result<Recipe, AppError> {
    repo::get(&st.db, RecipeId(id))
        .await?
        .ok_or_else(|| AppError::not_found("Recipe not found"))
}

async fn find_own_recipe(st: &AppState, user_id: Uuid, id: i64) -> Result<Recipe, AppError> {
    let recipe = find_recipe(st, id).await?;
    if recipe.author_id != user_id {
        return Err(AppError::Forbidden("Only the author can change this recipe".into()));
    }
    Ok(recipe)
}

/// Deletes an image uploaded for a write that did not commit.
async fn discard_image_on_error<T>(
    st: &AppState,
    fresh_key: Option<&str>,
    written: Result<T, AppError>,
) -> Result<T, AppError> {
    if let (Err(e), Some(key)) = (&written, fresh_key) {
        warn!(error = %e, key, "recipe write failed; removing uploaded image");
        images::remove(st, key).await;
    }
    written
}

async fn respond_one(
    st: &AppState,
    viewer: Option<Uuid>,
    recipe: Recipe,
) -> Result<Json<RecipeResponse>, AppError> {
    let mut hydrated = services::hydrate(st, viewer, vec![recipe]).await?;
    hydrated
        .pop()
        .map(Json)
        .ok_or_else(|| AppError::not_found("Recipe not found"))
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(q): Query<RecipeQuery>,
) -> Result<Json<Page<RecipeResponse>>, AppError> {
    let (limit, offset) = q.pagination().bounds();
    let filter = RecipeFilter {
        author: q.author,
        tag_slugs: q.tag_slugs(),
        // membership filters mean nothing for anonymous viewers
        favorited_only: q.is_favorited && viewer.is_some(),
        in_cart_only: q.is_in_shopping_cart && viewer.is_some(),
        viewer,
    };
    let (recipes, count) = repo::list(&state.db, &filter, limit, offset).await?;
    let results = services::hydrate(&state, viewer, recipes).await?;
    Ok(Json(Page { count, results }))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<i64>,
) -> Result<Json<RecipeResponse>, AppError> {
    let recipe = find_recipe(&state, id).await?;
    respond_one(&state, viewer, recipe).await
}

#[instrument(skip(state, body))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<RecipeRequest>,
) -> Result<(StatusCode, Json<RecipeResponse>), AppError> {
    let (draft, image) = services::validate(body)?;
    services::ensure_references_exist(&state, &draft).await?;

    let image_key = match image {
        Some(img) => Some(images::upload_recipe_image(&state, user_id, img).await?),
        None => None,
    };

    let written = async {
        let mut tx = state.db.begin().await?;
        let id = repo::insert(&mut tx, user_id, &draft, image_key.as_deref()).await?;
        tx.commit().await?;
        Ok::<_, AppError>(id)
    }
    .await;
    let id = discard_image_on_error(&state, image_key.as_deref(), written).await?;

    info!(%user_id, recipe_id = %id, "recipe created");
    let recipe = find_recipe(&state, id.0).await?;
    let Json(body) = respond_one(&state, Some(user_id), recipe).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

#[instrument(skip(state, body))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<RecipeRequest>,
) -> Result<Json<RecipeResponse>, AppError> {
    let existing = find_own_recipe(&state, user_id, id).await?;
    let (draft, image) = services::validate(body)?;
    services::ensure_references_exist(&state, &draft).await?;

    let new_key = match image {
        Some(img) => Some(images::upload_recipe_image(&state, user_id, img).await?),
        None => None,
    };

    let written = async {
        let mut tx = state.db.begin().await?;
        repo::update(&mut tx, existing.id, &draft, new_key.as_deref()).await?;
        tx.commit().await?;
        Ok::<_, AppError>(())
    }
    .await;
    discard_image_on_error(&state, new_key.as_deref(), written).await?;

    if let (Some(_), Some(old)) = (&new_key, &existing.image_key) {
        images::remove(&state, old).await;
    }

    info!(%user_id, recipe_id = %existing.id, "recipe updated");
    let recipe = find_recipe(&state, id).await?;
    respond_one(&state, Some(user_id), recipe).await
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let recipe = find_own_recipe(&state, user_id, id).await?;
    repo::delete(&state.db, recipe.id).await?;
    if let Some(key) = &recipe.image_key {
        images::remove(&state, key).await;
    }
    info!(%user_id, recipe_id = %recipe.id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Shared body of the favorite and shopping cart POST endpoints.
pub(crate) async fn add_to(
    st: &AppState,
    kind: Membership,
    user_id: Uuid,
    id: i64,
) -> Result<(StatusCode, Json<RecipeShort>), AppError> {
    let recipe = find_recipe(st, id).await?;
    if !repo::add_membership(&st.db, kind, user_id, recipe.id).await? {
        return Err(AppError::bad_request(match kind {
            Membership::Favorite => "Recipe is already in favorites",
            Membership::ShoppingCart => "Recipe is already in the shopping cart",
        }));
    }
    info!(%user_id, recipe_id = %recipe.id, ?kind, "membership added");
    Ok((StatusCode::CREATED, Json(services::short(st, recipe).await?)))
}

/// Shared body of the favorite and shopping cart DELETE endpoints.
pub(crate) async fn remove_from(
    st: &AppState,
    kind: Membership,
    user_id: Uuid,
    id: i64,
) -> Result<StatusCode, AppError> {
    let recipe = find_recipe(st, id).await?;
    if !repo::remove_membership(&st.db, kind, user_id, recipe.id).await? {
        return Err(AppError::bad_request(match kind {
            Membership::Favorite => "Recipe is not in favorites",
            Membership::ShoppingCart => "Recipe is not in the shopping cart",
        }));
    }
    info!(%user_id, recipe_id = %recipe.id, ?kind, "membership removed");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn add_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<RecipeShort>), AppError> {
    add_to(&state, Membership::Favorite, user_id, id).await
}

#[instrument(skip(state))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    remove_from(&state, Membership::Favorite, user_id, id).await
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{Subscription, UserProfile},
    repo,
};
use crate::{
    auth::{AuthUser, MaybeAuthUser},
    error::AppError,
    pagination::{Page, Pagination},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/subscriptions", get(list_subscriptions))
        .route("/users/:id", get(get_user))
        .route("/users/:id/subscribe", post(subscribe).delete(unsubscribe))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Page<UserProfile>>, AppError> {
    let (limit, offset) = p.bounds();
    let (results, count) = repo::list_profiles(&state.db, viewer, limit, offset).await?;
    Ok(Json(Page { count, results }))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserProfile>, AppError> {
    repo::get_profile(&state.db, viewer, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("User not found"))
}

#[instrument(skip(state))]
pub async fn subscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    if user_id == id {
        return Err(AppError::bad_request("You can't follow yourself"));
    }
    if repo::get_profile(&state.db, None, id).await?.is_none() {
        return Err(AppError::not_found("User not found"));
    }
    if !repo::follow(&state.db, user_id, id).await? {
        return Err(AppError::bad_request("Already subscribed"));
    }

    info!(%user_id, following_id = %id, "subscribed");
    let profile = repo::get_profile(&state.db, Some(user_id), id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok((StatusCode::CREATED, Json(profile)))
}

#[instrument(skip(state))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !repo::unfollow(&state.db, user_id, id).await? {
        return Err(AppError::bad_request("Not subscribed"));
    }
    info!(%user_id, following_id = %id, "unsubscribed");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Page<Subscription>>, AppError> {
    let (limit, offset) = p.bounds();
    let (results, count) = repo::subscriptions(&state.db, user_id, limit, offset).await?;
    Ok(Json(Page { count, results }))
}

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracing::instrument;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tags", get(list_tags))
        .route("/tags/:id", get(get_tag))
}

pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Tag>> {
    sqlx::query_as::<_, Tag>(r#"SELECT id, name, color, slug FROM tags ORDER BY id"#)
        .fetch_all(db)
        .await
        .context("list tags")
}

/// Ids from `ids` that name no tag.
pub async fn missing_ids(db: &PgPool, ids: &[i64]) -> anyhow::Result<Vec<i64>> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT wanted.id
          FROM unnest($1::bigint[]) AS wanted(id)
         WHERE NOT EXISTS (SELECT 1 FROM tags t WHERE t.id = wanted.id)
        "#,
    )
    .bind(ids)
    .fetch_all(db)
    .await
    .context("check tag ids")
}

#[instrument(skip(state))]
async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, AppError> {
    Ok(Json(list(&state.db).await?))
}

#[instrument(skip(state))]
async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Tag>, AppError> {
    sqlx::query_as::<_, Tag>(r#"SELECT id, name, color, slug FROM tags WHERE id = $1"#)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Tag not found"))
}

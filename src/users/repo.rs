use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use super::dto::{Subscription, UserProfile};

/// `$1` is the viewer (nullable); `is_subscribed` is false for anonymous viewers.
const PROFILE_SELECT: &str = r#"
    SELECT u.id, u.email, u.username, u.first_name, u.last_name,
           EXISTS (
               SELECT 1 FROM follows f WHERE f.user_id = $1 AND f.following_id = u.id
           ) AS is_subscribed
      FROM users u
"#;

pub async fn list_profiles(
    db: &PgPool,
    viewer: Option<Uuid>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<UserProfile>, i64)> {
    let rows = sqlx::query_as::<_, UserProfile>(&format!(
        "{PROFILE_SELECT} ORDER BY u.username LIMIT $2 OFFSET $3"
    ))
    .bind(viewer)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list users")?;
    let count = sqlx::query_scalar::<_, i64>("SELECT count(*) FROM users")
        .fetch_one(db)
        .await
        .context("count users")?;
    Ok((rows, count))
}

pub async fn get_profile(
    db: &PgPool,
    viewer: Option<Uuid>,
    id: Uuid,
) -> anyhow::Result<Option<UserProfile>> {
    let row = sqlx::query_as::<_, UserProfile>(&format!("{PROFILE_SELECT} WHERE u.id = $2"))
        .bind(viewer)
        .bind(id)
        .fetch_optional(db)
        .await
        .context("get user profile")?;
    Ok(row)
}

pub async fn profiles_by_ids(
    db: &PgPool,
    viewer: Option<Uuid>,
    ids: &[Uuid],
) -> anyhow::Result<Vec<UserProfile>> {
    let rows = sqlx::query_as::<_, UserProfile>(&format!("{PROFILE_SELECT} WHERE u.id = ANY($2)"))
        .bind(viewer)
        .bind(ids)
        .fetch_all(db)
        .await
        .context("get user profiles")?;
    Ok(rows)
}

/// Returns false when the follow already existed.
pub async fn follow(db: &PgPool, user_id: Uuid, following_id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        INSERT INTO follows (user_id, following_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(following_id)
    .execute(db)
    .await
    .context("insert follow")?;
    Ok(res.rows_affected() == 1)
}

/// Returns false when there was nothing to remove.
pub async fn unfollow(db: &PgPool, user_id: Uuid, following_id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query(r#"DELETE FROM follows WHERE user_id = $1 AND following_id = $2"#)
        .bind(user_id)
        .bind(following_id)
        .execute(db)
        .await
        .context("delete follow")?;
    Ok(res.rows_affected() == 1)
}

pub async fn subscriptions(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<Subscription>, i64)> {
    let rows = sqlx::query_as::<_, Subscription>(
        r#"
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
               TRUE AS is_subscribed,
               (SELECT count(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count
          FROM follows f
          JOIN users u ON u.id = f.following_id
         WHERE f.user_id = $1
         ORDER BY f.created_at DESC
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list subscriptions")?;
    let count = sqlx::query_scalar::<_, i64>("SELECT count(*) FROM follows WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(db)
        .await
        .context("count subscriptions")?;
    Ok((rows, count))
}

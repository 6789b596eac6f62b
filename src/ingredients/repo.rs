use anyhow::Context;
use sqlx::PgPool;

use super::repo_types::{Ingredient, IngredientId};

/// Catalog entries whose name starts with `prefix` (case-insensitive), ordered by name.
pub async fn search(db: &PgPool, prefix: Option<&str>) -> anyhow::Result<Vec<Ingredient>> {
    let pattern = prefix.map(|p| format!("{}%", escape_like(&p.to_lowercase())));
    let rows = sqlx::query_as::<_, Ingredient>(
        r#"
        SELECT id, name, measurement_unit
          FROM ingredients
         WHERE $1::text IS NULL OR lower(name) LIKE $1
         ORDER BY lower(name), id
        "#,
    )
    .bind(pattern)
    .fetch_all(db)
    .await
    .context("search ingredients")?;
    Ok(rows)
}

pub async fn get(db: &PgPool, id: IngredientId) -> anyhow::Result<Option<Ingredient>> {
    let row = sqlx::query_as::<_, Ingredient>(
        r#"SELECT id, name, measurement_unit FROM ingredients WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
    .context("get ingredient")?;
    Ok(row)
}

/// Inserts a catalog entry; `None` when the (name, unit) pair already exists.
pub async fn create(
    db: &PgPool,
    name: &str,
    measurement_unit: &str,
) -> anyhow::Result<Option<Ingredient>> {
    let row = sqlx::query_as::<_, Ingredient>(
        r#"
        INSERT INTO ingredients (name, measurement_unit)
        VALUES ($1, $2)
        ON CONFLICT (name, measurement_unit) DO NOTHING
        RETURNING id, name, measurement_unit
        "#,
    )
    .bind(name)
    .bind(measurement_unit)
    .fetch_optional(db)
    .await
    .context("insert ingredient")?;
    Ok(row)
}

/// Ids from `ids` that have no catalog entry.
pub async fn missing_ids(db: &PgPool, ids: &[IngredientId]) -> anyhow::Result<Vec<IngredientId>> {
    let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
    let missing = sqlx::query_scalar::<_, IngredientId>(
        r#"
        SELECT wanted.id
          FROM unnest($1::bigint[]) AS wanted(id)
         WHERE NOT EXISTS (SELECT 1 FROM ingredients i WHERE i.id = wanted.id)
        "#,
    )
    .bind(raw)
    .fetch_all(db)
    .await
    .context("check ingredient ids")?;
    Ok(missing)
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

use std::collections::HashSet;

use anyhow::Context;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::repo_types::{Recipe, RecipeDraft, RecipeId, RecipeIngredientRow, RecipeTagRow};

const RECIPE_COLUMNS: &str = "r.id, r.author_id, r.name, r.text, r.cooking_time, r.image_key, r.pub_date";

/// Binds: $1 author, $2 tag slugs, $3 favorites only, $4 cart only, $5 viewer.
const LIST_FILTER: &str = r#"
     WHERE ($1::uuid IS NULL OR r.author_id = $1)
       AND (cardinality($2::text[]) = 0 OR EXISTS (
               SELECT 1
                 FROM recipe_tags rt
                 JOIN tags t ON t.id = rt.tag_id
                WHERE rt.recipe_id = r.id AND t.slug = ANY($2)))
       AND (NOT $3::bool OR EXISTS (
               SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = $5::uuid))
       AND (NOT $4::bool OR EXISTS (
               SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = $5::uuid))
"#;

#[derive(Debug, Default)]
pub struct RecipeFilter {
    pub author: Option<Uuid>,
    pub tag_slugs: Vec<String>,
    pub favorited_only: bool,
    pub in_cart_only: bool,
    pub viewer: Option<Uuid>,
}

/// Per-user recipe memberships: favorites and the shopping cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Favorite,
    ShoppingCart,
}

impl Membership {
    fn table(self) -> &'static str {
        match self {
            Membership::Favorite => "favorites",
            Membership::ShoppingCart => "shopping_cart",
        }
    }
}

pub async fn list(
    db: &PgPool,
    filter: &RecipeFilter,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<Recipe>, i64)> {
    let rows = sqlx::query_as::<_, Recipe>(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes r {LIST_FILTER} \
         ORDER BY r.pub_date DESC, r.id DESC LIMIT $6 OFFSET $7"
    ))
    .bind(filter.author)
    .bind(&filter.tag_slugs)
    .bind(filter.favorited_only)
    .bind(filter.in_cart_only)
    .bind(filter.viewer)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list recipes")?;

    let count = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT count(*) FROM recipes r {LIST_FILTER}"
    ))
    .bind(filter.author)
    .bind(&filter.tag_slugs)
    .bind(filter.favorited_only)
    .bind(filter.in_cart_only)
    .bind(filter.viewer)
    .fetch_one(db)
    .await
    .context("count recipes")?;

    Ok((rows, count))
}

pub async fn get(db: &PgPool, id: RecipeId) -> anyhow::Result<Option<Recipe>> {
    let row = sqlx::query_as::<_, Recipe>(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .context("get recipe")?;
    Ok(row)
}

pub async fn insert(
    conn: &mut PgConnection,
    author_id: Uuid,
    draft: &RecipeDraft,
    image_key: Option<&str>,
) -> anyhow::Result<RecipeId> {
    let id = sqlx::query_scalar::<_, RecipeId>(
        r#"
        INSERT INTO recipes (author_id, name, text, cooking_time, image_key)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(author_id)
    .bind(&draft.name)
    .bind(&draft.text)
    .bind(draft.cooking_time)
    .bind(image_key)
    .fetch_one(&mut *conn)
    .await
    .context("insert recipe")?;

    replace_links(conn, id, draft).await?;
    Ok(id)
}

/// Overwrites the recipe's fields and links. `image_key` of `None` keeps the old image.
pub async fn update(
    conn: &mut PgConnection,
    id: RecipeId,
    draft: &RecipeDraft,
    image_key: Option<&str>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE recipes
           SET name = $2,
               text = $3,
               cooking_time = $4,
               image_key = COALESCE($5, image_key)
         WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&draft.name)
    .bind(&draft.text)
    .bind(draft.cooking_time)
    .bind(image_key)
    .execute(&mut *conn)
    .await
    .context("update recipe")?;

    replace_links(conn, id, draft).await
}

async fn replace_links(
    conn: &mut PgConnection,
    id: RecipeId,
    draft: &RecipeDraft,
) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("clear recipe ingredients")?;
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("clear recipe tags")?;

    let (ingredient_ids, quantities): (Vec<i64>, Vec<i32>) =
        draft.ingredients.iter().map(|(i, q)| (i.0, *q)).unzip();
    sqlx::query(
        r#"
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, quantity)
        SELECT $1, link.ingredient_id, link.quantity
          FROM UNNEST($2::bigint[], $3::int[]) AS link(ingredient_id, quantity)
        "#,
    )
    .bind(id)
    .bind(ingredient_ids)
    .bind(quantities)
    .execute(&mut *conn)
    .await
    .context("insert recipe ingredients")?;

    sqlx::query(
        r#"
        INSERT INTO recipe_tags (recipe_id, tag_id)
        SELECT $1, tag.id FROM UNNEST($2::bigint[]) AS tag(id)
        "#,
    )
    .bind(id)
    .bind(&draft.tag_ids)
    .execute(&mut *conn)
    .await
    .context("insert recipe tags")?;
    Ok(())
}

pub async fn delete(db: &PgPool, id: RecipeId) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(db)
        .await
        .context("delete recipe")?;
    Ok(())
}

pub async fn tags_for(db: &PgPool, ids: &[RecipeId]) -> anyhow::Result<Vec<RecipeTagRow>> {
    let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
    let rows = sqlx::query_as::<_, RecipeTagRow>(
        r#"
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
          FROM recipe_tags rt
          JOIN tags t ON t.id = rt.tag_id
         WHERE rt.recipe_id = ANY($1)
         ORDER BY t.id
        "#,
    )
    .bind(raw)
    .fetch_all(db)
    .await
    .context("load recipe tags")?;
    Ok(rows)
}

pub async fn ingredients_for(
    db: &PgPool,
    ids: &[RecipeId],
) -> anyhow::Result<Vec<RecipeIngredientRow>> {
    let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
    let rows = sqlx::query_as::<_, RecipeIngredientRow>(
        r#"
        SELECT ri.recipe_id, ri.ingredient_id, i.name, i.measurement_unit, ri.quantity
          FROM recipe_ingredients ri
          JOIN ingredients i ON i.id = ri.ingredient_id
         WHERE ri.recipe_id = ANY($1)
         ORDER BY lower(i.name), i.id
        "#,
    )
    .bind(raw)
    .fetch_all(db)
    .await
    .context("load recipe ingredients")?;
    Ok(rows)
}

/// Returns false when the membership already existed.
pub async fn add_membership(
    db: &PgPool,
    kind: Membership,
    user_id: Uuid,
    recipe_id: RecipeId,
) -> anyhow::Result<bool> {
    let res = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        kind.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(db)
    .await
    .with_context(|| format!("insert into {}", kind.table()))?;
    Ok(res.rows_affected() == 1)
}

/// Returns false when there was nothing to remove.
pub async fn remove_membership(
    db: &PgPool,
    kind: Membership,
    user_id: Uuid,
    recipe_id: RecipeId,
) -> anyhow::Result<bool> {
    let res = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        kind.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(db)
    .await
    .with_context(|| format!("delete from {}", kind.table()))?;
    Ok(res.rows_affected() == 1)
}

/// Which of `ids` the user has in the given membership table.
pub async fn memberships_among(
    db: &PgPool,
    kind: Membership,
    user_id: Uuid,
    ids: &[RecipeId],
) -> anyhow::Result<HashSet<RecipeId>> {
    let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
    let rows = sqlx::query_scalar::<_, RecipeId>(&format!(
        "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = ANY($2)",
        kind.table()
    ))
    .bind(user_id)
    .bind(raw)
    .fetch_all(db)
    .await
    .with_context(|| format!("load {}", kind.table()))?;
    Ok(rows.into_iter().collect())
}

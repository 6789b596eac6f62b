use std::collections::{HashMap, HashSet};

use anyhow::Context;
use uuid::Uuid;

use super::{
    dto::{RecipeIngredientView, RecipeRequest, RecipeResponse, RecipeShort},
    repo::{self, Membership},
    repo_types::{Recipe, RecipeDraft, RecipeId},
};
use crate::{
    error::AppError,
    images::{self, ImageUpload},
    ingredients::{self, repo_types::IngredientId},
    state::AppState,
    tags::{self, Tag},
    users,
};

const MAX_NAME_LEN: usize = 200;

/// Checks the request shape. Existence of tags and ingredients is checked separately.
pub fn validate(req: RecipeRequest) -> Result<(RecipeDraft, Option<ImageUpload>), AppError> {
    let name = req.name.trim().to_string();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::bad_request("Invalid name"));
    }
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::bad_request("Invalid text"));
    }
    if req.cooking_time < 1 {
        return Err(AppError::bad_request("cooking_time must be at least 1"));
    }
    if req.ingredients.is_empty() {
        return Err(AppError::bad_request("At least one ingredient is required"));
    }

    let mut seen = HashSet::new();
    let mut ingredients = Vec::with_capacity(req.ingredients.len());
    for item in req.ingredients {
        if item.amount < 1 {
            return Err(AppError::bad_request(format!(
                "Amount of ingredient {} must be at least 1",
                item.id
            )));
        }
        if !seen.insert(item.id) {
            return Err(AppError::bad_request(format!(
                "Ingredient {} is listed twice",
                item.id
            )));
        }
        ingredients.push((item.id, item.amount));
    }

    let mut tag_ids = req.tags;
    tag_ids.sort_unstable();
    tag_ids.dedup();

    let image = req
        .image
        .filter(|s| !s.trim().is_empty())
        .map(|s| images::parse_data_url(&s))
        .transpose()
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    Ok((
        RecipeDraft {
            name,
            text,
            cooking_time: req.cooking_time,
            tag_ids,
            ingredients,
        },
        image,
    ))
}

/// Rejects drafts that reference tags or ingredients we do not have.
pub async fn ensure_references_exist(st: &AppState, draft: &RecipeDraft) -> Result<(), AppError> {
    let ingredient_ids: Vec<IngredientId> = draft.ingredients.iter().map(|(id, _)| *id).collect();
    let missing = ingredients::repo::missing_ids(&st.db, &ingredient_ids).await?;
    if !missing.is_empty() {
        return Err(AppError::bad_request(format!(
            "Unknown ingredients: {}",
            join_ids(&missing)
        )));
    }
    let missing = tags::missing_ids(&st.db, &draft.tag_ids).await?;
    if !missing.is_empty() {
        return Err(AppError::bad_request(format!("Unknown tags: {}", join_ids(&missing))));
    }
    Ok(())
}

fn join_ids<T: ToString>(ids: &[T]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

async fn image_url(st: &AppState, key: Option<&str>) -> anyhow::Result<Option<String>> {
    match key {
        Some(key) => Ok(Some(images::presign(st, key).await?)),
        None => Ok(None),
    }
}

pub async fn short(st: &AppState, recipe: Recipe) -> anyhow::Result<RecipeShort> {
    Ok(RecipeShort {
        id: recipe.id,
        image: image_url(st, recipe.image_key.as_deref()).await?,
        name: recipe.name,
        cooking_time: recipe.cooking_time,
    })
}

/// Expands recipe rows into full responses with a fixed number of queries per page.
pub async fn hydrate(
    st: &AppState,
    viewer: Option<Uuid>,
    recipes: Vec<Recipe>,
) -> anyhow::Result<Vec<RecipeResponse>> {
    if recipes.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<RecipeId> = recipes.iter().map(|r| r.id).collect();
    let author_ids: Vec<Uuid> = recipes
        .iter()
        .map(|r| r.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let (tag_rows, ingredient_rows, authors) = tokio::try_join!(
        repo::tags_for(&st.db, &ids),
        repo::ingredients_for(&st.db, &ids),
        users::repo::profiles_by_ids(&st.db, viewer, &author_ids),
    )?;
    let (favorited, in_cart) = match viewer {
        Some(user_id) => tokio::try_join!(
            repo::memberships_among(&st.db, Membership::Favorite, user_id, &ids),
            repo::memberships_among(&st.db, Membership::ShoppingCart, user_id, &ids),
        )?,
        None => (HashSet::new(), HashSet::new()),
    };

    let mut tags_by_recipe: HashMap<RecipeId, Vec<Tag>> = HashMap::new();
    for row in tag_rows {
        tags_by_recipe.entry(row.recipe_id).or_default().push(Tag {
            id: row.id,
            name: row.name,
            color: row.color,
            slug: row.slug,
        });
    }
    let mut ingredients_by_recipe: HashMap<RecipeId, Vec<RecipeIngredientView>> = HashMap::new();
    for row in ingredient_rows {
        ingredients_by_recipe
            .entry(row.recipe_id)
            .or_default()
            .push(RecipeIngredientView {
                id: row.ingredient_id,
                name: row.name,
                measurement_unit: row.measurement_unit,
                amount: row.quantity,
            });
    }
    let authors: HashMap<Uuid, _> = authors.into_iter().map(|a| (a.id, a)).collect();

    let mut out = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        let author = authors
            .get(&recipe.author_id)
            .cloned()
            .with_context(|| format!("author of recipe {} not found", recipe.id))?;
        out.push(RecipeResponse {
            id: recipe.id,
            tags: tags_by_recipe.remove(&recipe.id).unwrap_or_default(),
            author,
            ingredients: ingredients_by_recipe.remove(&recipe.id).unwrap_or_default(),
            is_favorited: favorited.contains(&recipe.id),
            is_in_shopping_cart: in_cart.contains(&recipe.id),
            image: image_url(st, recipe.image_key.as_deref()).await?,
            name: recipe.name,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
            pub_date: recipe.pub_date,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::dto::IngredientAmount;

    fn request() -> RecipeRequest {
        RecipeRequest {
            name: "  Pancakes ".into(),
            text: "Mix and fry.".into(),
            cooking_time: 20,
            tags: vec![3, 1, 3],
            ingredients: vec![
                IngredientAmount { id: IngredientId(1), amount: 200 },
                IngredientAmount { id: IngredientId(2), amount: 2 },
            ],
            image: None,
        }
    }

    #[test]
    fn valid_request_becomes_draft() {
        let (draft, image) = validate(request()).unwrap();
        assert_eq!(draft.name, "Pancakes");
        assert_eq!(draft.tag_ids, vec![1, 3]);
        assert_eq!(
            draft.ingredients,
            vec![(IngredientId(1), 200), (IngredientId(2), 2)]
        );
        assert!(image.is_none());
    }

    #[test]
    fn rejects_duplicate_and_non_positive_ingredients() {
        let mut req = request();
        req.ingredients.push(IngredientAmount { id: IngredientId(1), amount: 5 });
        assert!(matches!(validate(req), Err(AppError::BadRequest(m)) if m.contains("twice")));

        let mut req = request();
        req.ingredients[0].amount = 0;
        assert!(validate(req).is_err());

        let mut req = request();
        req.ingredients.clear();
        assert!(validate(req).is_err());
    }

    #[test]
    fn rejects_bad_scalars() {
        let mut req = request();
        req.cooking_time = 0;
        assert!(validate(req).is_err());

        let mut req = request();
        req.name = "x".repeat(201);
        assert!(validate(req).is_err());

        let mut req = request();
        req.text = "  ".into();
        assert!(validate(req).is_err());
    }

    #[test]
    fn image_must_be_a_data_url() {
        let mut req = request();
        req.image = Some("https://example.com/cake.png".into());
        assert!(validate(req).is_err());

        let mut req = request();
        req.image = Some("data:image/png;base64,aGVsbG8=".into());
        let (_, image) = validate(req).unwrap();
        assert_eq!(image.unwrap().content_type, "image/png");
    }

    #[tokio::test]
    async fn hydrating_nothing_needs_no_queries() {
        let state = AppState::fake();
        let out = hydrate(&state, None, Vec::new()).await.unwrap();
        assert!(out.is_empty());
    }
}

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::RecipeId;
use crate::{
    ingredients::repo_types::IngredientId, pagination::Pagination, tags::Tag,
    users::dto::UserProfile,
};

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientAmount {
    pub id: IngredientId,
    pub amount: i32,
}

/// Body of both create and update.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeRequest {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    #[serde(default)]
    pub tags: Vec<i64>,
    pub ingredients: Vec<IngredientAmount>,
    /// `data:image/<type>;base64,<payload>`
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipeQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub author: Option<Uuid>,
    /// Comma separated tag slugs.
    pub tags: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub is_favorited: bool,
    #[serde(default, deserialize_with = "flag")]
    pub is_in_shopping_cart: bool,
}

impl RecipeQuery {
    pub fn pagination(&self) -> Pagination {
        let default = Pagination::default();
        Pagination {
            limit: self.limit.unwrap_or(default.limit),
            offset: self.offset.unwrap_or(default.offset),
        }
    }

    pub fn tag_slugs(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Accepts `1`/`0` as well as `true`/`false`.
fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(d)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid flag `{other}`"))),
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeIngredientView {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub id: RecipeId,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipeIngredientView>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
}

/// Compact form returned by favorite and cart toggles.
#[derive(Debug, Serialize)]
pub struct RecipeShort {
    pub id: RecipeId,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parses_flags_and_tags() {
        let q: RecipeQuery = serde_json::from_value(serde_json::json!({
            "tags": "breakfast, dinner,,",
            "is_favorited": "1",
            "is_in_shopping_cart": "false",
        }))
        .unwrap();
        assert!(q.is_favorited);
        assert!(!q.is_in_shopping_cart);
        assert_eq!(q.tag_slugs(), vec!["breakfast", "dinner"]);
        assert_eq!(q.pagination().bounds(), (6, 0));
    }

    #[test]
    fn query_rejects_unknown_flag() {
        let res: Result<RecipeQuery, _> =
            serde_json::from_value(serde_json::json!({ "is_favorited": "yes" }));
        assert!(res.is_err());
    }
}

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, warn};

use super::{
    error::ShoppingListError,
    model::{AggregatedLine, MissingIngredientPolicy, RecipeIngredientLink},
    store::{IngredientCatalog, RecipeIngredientStore},
};
use crate::{
    ingredients::repo_types::{Ingredient, IngredientId},
    recipes::repo_types::RecipeId,
};

/// Sums link quantities per ingredient and resolves each ingredient through `catalog`.
///
/// Lines come back sorted by ingredient name (case-insensitive), then by id.
pub fn aggregate(
    links: &[RecipeIngredientLink],
    catalog: &HashMap<IngredientId, Ingredient>,
    policy: MissingIngredientPolicy,
) -> Result<Vec<AggregatedLine>, ShoppingListError> {
    let mut totals: BTreeMap<IngredientId, i64> = BTreeMap::new();
    for link in links {
        *totals.entry(link.ingredient_id).or_insert(0) += i64::from(link.quantity);
    }

    let mut lines = Vec::with_capacity(totals.len());
    for (ingredient_id, total_quantity) in totals {
        let Some(ingredient) = catalog.get(&ingredient_id) else {
            match policy {
                MissingIngredientPolicy::Skip => {
                    warn!(%ingredient_id, "ingredient missing from catalog; skipped");
                    continue;
                }
                MissingIngredientPolicy::Fail => {
                    return Err(ShoppingListError::IngredientNotFound(ingredient_id));
                }
            }
        };
        lines.push(AggregatedLine {
            ingredient_id,
            ingredient_name: ingredient.name.clone(),
            measurement_unit: ingredient.measurement_unit.clone(),
            total_quantity,
        });
    }

    lines.sort_by(|a, b| {
        a.ingredient_name
            .to_lowercase()
            .cmp(&b.ingredient_name.to_lowercase())
            .then(a.ingredient_id.cmp(&b.ingredient_id))
    });
    Ok(lines)
}

/// Builds the shopping list for a set of recipes with one batched lookup per store.
///
/// `recipe_ids` has set semantics: a recipe listed twice is counted once.
pub async fn build_shopping_list<L, C>(
    recipe_ids: &[RecipeId],
    links: &L,
    catalog: &C,
    policy: MissingIngredientPolicy,
) -> Result<Vec<AggregatedLine>, ShoppingListError>
where
    L: RecipeIngredientStore + ?Sized,
    C: IngredientCatalog + ?Sized,
{
    let unique: BTreeSet<RecipeId> = recipe_ids.iter().copied().collect();
    if unique.is_empty() {
        return Ok(Vec::new());
    }
    let unique: Vec<RecipeId> = unique.into_iter().collect();

    let links = links.links_for_recipes(&unique).await?;
    let ingredient_ids: Vec<IngredientId> = links
        .iter()
        .map(|l| l.ingredient_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if ingredient_ids.is_empty() {
        return Ok(Vec::new());
    }

    let catalog: HashMap<IngredientId, Ingredient> = catalog
        .ingredients_by_ids(&ingredient_ids)
        .await?
        .into_iter()
        .map(|i| (i.id, i))
        .collect();

    let lines = aggregate(&links, &catalog, policy)?;
    debug!(
        recipes = unique.len(),
        links = links.len(),
        lines = lines.len(),
        "shopping list aggregated"
    );
    Ok(lines)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    pub(crate) const FLOUR: IngredientId = IngredientId(1);
    pub(crate) const EGG: IngredientId = IngredientId(2);
    pub(crate) const MILK: IngredientId = IngredientId(3);
    pub(crate) const RECIPE_A: RecipeId = RecipeId(10);
    pub(crate) const RECIPE_B: RecipeId = RecipeId(20);
    pub(crate) const RECIPE_EMPTY: RecipeId = RecipeId(30);

    /// In-memory stand-in for both lookup capabilities. Counts calls to prove batching.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub(crate) links: Vec<RecipeIngredientLink>,
        pub(crate) ingredients: Vec<Ingredient>,
        pub(crate) link_calls: AtomicUsize,
        pub(crate) catalog_calls: AtomicUsize,
    }

    #[async_trait]
    impl RecipeIngredientStore for MemoryStore {
        async fn links_for_recipes(
            &self,
            recipe_ids: &[RecipeId],
        ) -> Result<Vec<RecipeIngredientLink>, ShoppingListError> {
            self.link_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .links
                .iter()
                .filter(|l| recipe_ids.contains(&l.recipe_id))
                .copied()
                .collect())
        }
    }

    #[async_trait]
    impl IngredientCatalog for MemoryStore {
        async fn ingredients_by_ids(
            &self,
            ids: &[IngredientId],
        ) -> Result<Vec<Ingredient>, ShoppingListError> {
            self.catalog_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .ingredients
                .iter()
                .filter(|i| ids.contains(&i.id))
                .cloned()
                .collect())
        }
    }

    pub(crate) fn ingredient(id: IngredientId, name: &str, unit: &str) -> Ingredient {
        Ingredient {
            id,
            name: name.into(),
            measurement_unit: unit.into(),
        }
    }

    pub(crate) fn link(recipe_id: RecipeId, ingredient_id: IngredientId, quantity: i32) -> RecipeIngredientLink {
        RecipeIngredientLink {
            recipe_id,
            ingredient_id,
            quantity,
        }
    }

    pub(crate) fn kitchen() -> MemoryStore {
        MemoryStore {
            links: vec![
                link(RECIPE_A, FLOUR, 200),
                link(RECIPE_A, EGG, 2),
                link(RECIPE_B, FLOUR, 100),
                link(RECIPE_B, MILK, 1),
            ],
            ingredients: vec![
                ingredient(FLOUR, "flour", "g"),
                ingredient(EGG, "egg", "pcs"),
                ingredient(MILK, "milk", "cup"),
            ],
            ..Default::default()
        }
    }

    fn triples(lines: &[AggregatedLine]) -> Vec<(String, String, i64)> {
        lines
            .iter()
            .map(|l| {
                (
                    l.ingredient_name.clone(),
                    l.measurement_unit.clone(),
                    l.total_quantity,
                )
            })
            .collect()
    }

    /// Sums two shopping lists by ingredient, keeping the aggregate ordering.
    pub(crate) fn merge(a: Vec<AggregatedLine>, b: Vec<AggregatedLine>) -> Vec<AggregatedLine> {
        let mut by_id: BTreeMap<IngredientId, AggregatedLine> = BTreeMap::new();
        for line in a.into_iter().chain(b) {
            by_id
                .entry(line.ingredient_id)
                .and_modify(|l| l.total_quantity += line.total_quantity)
                .or_insert(line);
        }
        let mut merged: Vec<_> = by_id.into_values().collect();
        merged.sort_by(|a, b| {
            a.ingredient_name
                .to_lowercase()
                .cmp(&b.ingredient_name.to_lowercase())
                .then(a.ingredient_id.cmp(&b.ingredient_id))
        });
        merged
    }

    #[tokio::test]
    async fn sums_shared_ingredients_across_recipes() {
        let store = kitchen();
        let lines = build_shopping_list(
            &[RECIPE_A, RECIPE_B],
            &store,
            &store,
            MissingIngredientPolicy::Skip,
        )
        .await
        .unwrap();

        assert_eq!(
            triples(&lines),
            vec![
                ("egg".to_string(), "pcs".to_string(), 2),
                ("flour".to_string(), "g".to_string(), 300),
                ("milk".to_string(), "cup".to_string(), 1),
            ]
        );
    }

    #[tokio::test]
    async fn empty_input_yields_empty_list_without_lookups() {
        let store = kitchen();
        let lines = build_shopping_list(&[], &store, &store, MissingIngredientPolicy::Fail)
            .await
            .unwrap();
        assert!(lines.is_empty());
        assert_eq!(store.link_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.catalog_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn recipe_without_links_contributes_nothing() {
        let store = kitchen();
        let only_empty =
            build_shopping_list(&[RECIPE_EMPTY], &store, &store, MissingIngredientPolicy::Fail)
                .await
                .unwrap();
        assert!(only_empty.is_empty());

        let with_a = build_shopping_list(
            &[RECIPE_A, RECIPE_EMPTY],
            &store,
            &store,
            MissingIngredientPolicy::Fail,
        )
        .await
        .unwrap();
        let just_a = build_shopping_list(&[RECIPE_A], &store, &store, MissingIngredientPolicy::Fail)
            .await
            .unwrap();
        assert_eq!(with_a, just_a);
    }

    #[tokio::test]
    async fn duplicate_recipe_ids_are_counted_once() {
        let store = kitchen();
        let lines = build_shopping_list(
            &[RECIPE_A, RECIPE_A, RECIPE_A],
            &store,
            &store,
            MissingIngredientPolicy::Skip,
        )
        .await
        .unwrap();
        let flour = lines.iter().find(|l| l.ingredient_id == FLOUR).unwrap();
        assert_eq!(flour.total_quantity, 200);
    }

    #[tokio::test]
    async fn union_of_disjoint_carts_equals_merged_lists() {
        let store = kitchen();
        let policy = MissingIngredientPolicy::Fail;
        let both = build_shopping_list(&[RECIPE_B, RECIPE_A], &store, &store, policy)
            .await
            .unwrap();
        let a = build_shopping_list(&[RECIPE_A], &store, &store, policy)
            .await
            .unwrap();
        let b = build_shopping_list(&[RECIPE_B], &store, &store, policy)
            .await
            .unwrap();
        assert_eq!(both, merge(a, b));
    }

    #[tokio::test]
    async fn input_order_does_not_change_result() {
        let store = kitchen();
        let policy = MissingIngredientPolicy::Skip;
        let ab = build_shopping_list(&[RECIPE_A, RECIPE_B], &store, &store, policy)
            .await
            .unwrap();
        let ba = build_shopping_list(&[RECIPE_B, RECIPE_A], &store, &store, policy)
            .await
            .unwrap();
        assert_eq!(ab, ba);
    }

    #[tokio::test]
    async fn lookups_are_batched() {
        let store = kitchen();
        build_shopping_list(
            &[RECIPE_A, RECIPE_B, RECIPE_EMPTY],
            &store,
            &store,
            MissingIngredientPolicy::Skip,
        )
        .await
        .unwrap();
        assert_eq!(store.link_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.catalog_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_calls_do_not_leak_quantities() {
        let store = kitchen();
        for _ in 0..3 {
            let lines =
                build_shopping_list(&[RECIPE_A], &store, &store, MissingIngredientPolicy::Skip)
                    .await
                    .unwrap();
            let flour = lines.iter().find(|l| l.ingredient_id == FLOUR).unwrap();
            assert_eq!(flour.total_quantity, 200);
        }
    }

    #[tokio::test]
    async fn deleted_ingredient_is_skipped_under_skip_policy() {
        let mut store = kitchen();
        store.ingredients.retain(|i| i.id != MILK);
        let lines = build_shopping_list(
            &[RECIPE_A, RECIPE_B],
            &store,
            &store,
            MissingIngredientPolicy::Skip,
        )
        .await
        .unwrap();
        assert_eq!(
            triples(&lines),
            vec![
                ("egg".to_string(), "pcs".to_string(), 2),
                ("flour".to_string(), "g".to_string(), 300),
            ]
        );
    }

    #[tokio::test]
    async fn deleted_ingredient_fails_under_fail_policy() {
        let mut store = kitchen();
        store.ingredients.retain(|i| i.id != MILK);
        let err = build_shopping_list(
            &[RECIPE_A, RECIPE_B],
            &store,
            &store,
            MissingIngredientPolicy::Fail,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ShoppingListError::IngredientNotFound(id) if id == MILK));
        assert!(err.is_not_found());
    }

    #[test]
    fn sorts_by_name_ignoring_case_then_id() {
        let catalog: HashMap<_, _> = [
            ingredient(IngredientId(7), "sugar", "g"),
            ingredient(IngredientId(5), "Apples", "pcs"),
            ingredient(IngredientId(4), "sugar", "tbsp"),
        ]
        .into_iter()
        .map(|i| (i.id, i))
        .collect();
        let links = [
            link(RECIPE_A, IngredientId(7), 1),
            link(RECIPE_A, IngredientId(5), 3),
            link(RECIPE_B, IngredientId(4), 2),
        ];
        let lines = aggregate(&links, &catalog, MissingIngredientPolicy::Fail).unwrap();
        let ids: Vec<_> = lines.iter().map(|l| l.ingredient_id).collect();
        assert_eq!(ids, vec![IngredientId(5), IngredientId(4), IngredientId(7)]);
    }
}

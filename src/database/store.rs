use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::actions::{recipes, relations, shopping_list, tags};
use crate::composition::CompositionInput;
use crate::error::Error;
use crate::schema::{
    CartIngredientRow, Ingredient, IngredientAmount, Recipe, RecipeFilter, RelationKind, Tag,
    User, Uuid, Viewer,
};

// Replaces and reads back the tag/ingredient sets of one recipe.
#[async_trait]
pub trait CompositionStore: Send + Sync {
    /// On failure no partial mutation is observable.
    async fn replace_composition(
        &self,
        recipe_id: Uuid,
        input: &CompositionInput,
    ) -> Result<(), Error>;

    async fn composition(&self, recipe_id: Uuid) -> Result<CompositionInput, Error>;
}

// The uniqueness constraint of the backing storage is the authority for
// duplicates, not a prior read.
#[async_trait]
pub trait RelationStore: Send + Sync {
    async fn add_relation(
        &self,
        kind: RelationKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> Result<(), Error>;

    async fn remove_relation(
        &self,
        kind: RelationKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> Result<(), Error>;
}

// Source rows for the shopping-list aggregator.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// An empty cart yields an empty list.
    async fn cart_ingredients(&self, user_id: Uuid) -> Result<Vec<CartIngredientRow>, Error>;
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    ingredients: HashMap<Uuid, Ingredient>,
    tags: HashMap<Uuid, Tag>,
    recipes: HashMap<Uuid, Recipe>,
    recipe_tags: HashMap<Uuid, Vec<Uuid>>,
    recipe_ingredients: HashMap<Uuid, Vec<IngredientAmount>>,
    relations: HashSet<(RelationKind, Uuid, Uuid)>,
}

// In-memory store with the same contracts as the Postgres actions. The
// one mutex stands in for the transaction boundary.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        let mut state = self.state.lock().unwrap();
        state.users.insert(user.id, user);
    }

    pub fn insert_ingredient(&self, ingredient: Ingredient) {
        let mut state = self.state.lock().unwrap();
        state.ingredients.insert(ingredient.id, ingredient);
    }

    pub fn insert_tag(&self, tag: Tag) {
        let mut state = self.state.lock().unwrap();
        state.tags.insert(tag.id, tag);
    }

    pub fn insert_recipe(&self, recipe: Recipe) {
        let mut state = self.state.lock().unwrap();
        state.recipes.insert(recipe.id, recipe);
    }

    // Cascades like the Postgres path; returns the stored image reference.
    pub fn delete_recipe(&self, recipe_id: Uuid) -> Result<String, Error> {
        let mut state = self.state.lock().unwrap();
        let recipe = state
            .recipes
            .remove(&recipe_id)
            .ok_or_else(|| Error::not_found("no recipe with this id"))?;

        state.recipe_tags.remove(&recipe_id);
        state.recipe_ingredients.remove(&recipe_id);
        state.relations.retain(|(kind, _, target)| {
            *kind == RelationKind::Subscription || *target != recipe_id
        });

        Ok(recipe.image)
    }

    // Matches the SQL path: tag slugs OR-ed, viewer-bound filters are
    // no-ops for anonymous viewers. Ordered by recipe id for stability.
    pub fn filter_recipes(&self, filter: &RecipeFilter, viewer: Viewer) -> Vec<Uuid> {
        let state = self.state.lock().unwrap();

        let mut ids: Vec<Uuid> = state
            .recipes
            .values()
            .filter(|recipe| {
                if let Some(prefix) = &filter.name_prefix {
                    if !recipe
                        .name
                        .to_lowercase()
                        .starts_with(&prefix.to_lowercase())
                    {
                        return false;
                    }
                }

                if let Some(author) = filter.author {
                    if recipe.author_id != author {
                        return false;
                    }
                }

                if !filter.tag_slugs.is_empty() {
                    let carries_any = state
                        .recipe_tags
                        .get(&recipe.id)
                        .map(|tag_ids| {
                            tag_ids.iter().any(|tag_id| {
                                state
                                    .tags
                                    .get(tag_id)
                                    .is_some_and(|tag| filter.tag_slugs.contains(&tag.slug))
                            })
                        })
                        .unwrap_or(false);
                    if !carries_any {
                        return false;
                    }
                }

                if filter.is_favorited {
                    if let Some(user_id) = viewer.user_id() {
                        if !state
                            .relations
                            .contains(&(RelationKind::Favorite, user_id, recipe.id))
                        {
                            return false;
                        }
                    }
                }

                if filter.is_in_shopping_cart {
                    if let Some(user_id) = viewer.user_id() {
                        if !state.relations.contains(&(
                            RelationKind::ShoppingCart,
                            user_id,
                            recipe.id,
                        )) {
                            return false;
                        }
                    }
                }

                true
            })
            .map(|recipe| recipe.id)
            .collect();

        ids.sort_unstable();
        ids
    }

    pub fn has_relation(&self, kind: RelationKind, user_id: Uuid, target_id: Uuid) -> bool {
        let state = self.state.lock().unwrap();
        state.relations.contains(&(kind, user_id, target_id))
    }
}

#[async_trait]
impl CompositionStore for MemoryStore {
    async fn replace_composition(
        &self,
        recipe_id: Uuid,
        input: &CompositionInput,
    ) -> Result<(), Error> {
        input.validate()?;

        let mut state = self.state.lock().unwrap();
        if !state.recipes.contains_key(&recipe_id) {
            return Err(Error::not_found("no recipe with this id"));
        }
        if input.tags.iter().any(|id| !state.tags.contains_key(id)) {
            return Err(Error::not_found("unknown tag id"));
        }
        if input
            .ingredients
            .iter()
            .any(|pair| !state.ingredients.contains_key(&pair.ingredient_id))
        {
            return Err(Error::not_found("unknown ingredient id"));
        }

        state.recipe_tags.insert(recipe_id, input.tags.clone());
        state
            .recipe_ingredients
            .insert(recipe_id, input.ingredients.clone());
        Ok(())
    }

    async fn composition(&self, recipe_id: Uuid) -> Result<CompositionInput, Error> {
        let state = self.state.lock().unwrap();
        if !state.recipes.contains_key(&recipe_id) {
            return Err(Error::not_found("no recipe with this id"));
        }

        Ok(CompositionInput::new(
            state.recipe_tags.get(&recipe_id).cloned().unwrap_or_default(),
            state
                .recipe_ingredients
                .get(&recipe_id)
                .cloned()
                .unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl RelationStore for MemoryStore {
    async fn add_relation(
        &self,
        kind: RelationKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> Result<(), Error> {
        if kind == RelationKind::Subscription && user_id == target_id {
            return Err(Error::SelfFollow);
        }

        let mut state = self.state.lock().unwrap();
        let target_exists = match kind {
            RelationKind::Subscription => state.users.contains_key(&target_id),
            _ => state.recipes.contains_key(&target_id),
        };
        if !target_exists {
            return Err(Error::not_found("relation target does not exist"));
        }

        if !state.relations.insert((kind, user_id, target_id)) {
            return Err(Error::conflict("relation already exists"));
        }
        Ok(())
    }

    async fn remove_relation(
        &self,
        kind: RelationKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if !state.relations.remove(&(kind, user_id, target_id)) {
            return Err(Error::not_found("relation does not exist"));
        }
        Ok(())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn cart_ingredients(&self, user_id: Uuid) -> Result<Vec<CartIngredientRow>, Error> {
        let state = self.state.lock().unwrap();

        let mut rows = vec![];
        for (kind, user, recipe_id) in state.relations.iter() {
            if *kind != RelationKind::ShoppingCart || *user != user_id {
                continue;
            }
            for pair in state.recipe_ingredients.get(recipe_id).into_iter().flatten() {
                let ingredient = state
                    .ingredients
                    .get(&pair.ingredient_id)
                    .ok_or_else(|| Error::not_found("unknown ingredient id"))?;
                rows.push(CartIngredientRow {
                    name: ingredient.name.clone(),
                    measurement_unit: ingredient.measurement_unit.clone(),
                    amount: pair.amount,
                });
            }
        }

        Ok(rows)
    }
}

// Production store backed by the Postgres action layer.
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl CompositionStore for PgStore {
    async fn replace_composition(
        &self,
        recipe_id: Uuid,
        input: &CompositionInput,
    ) -> Result<(), Error> {
        recipes::replace_composition(recipe_id, input, &self.pool).await
    }

    async fn composition(&self, recipe_id: Uuid) -> Result<CompositionInput, Error> {
        if recipes::get_recipe(recipe_id, &self.pool).await?.is_none() {
            return Err(Error::not_found("no recipe with this id"));
        }

        let tags = tags::list_recipe_tags(recipe_id, &self.pool).await?;
        let ingredients = recipes::list_recipe_ingredients(recipe_id, &self.pool).await?;

        Ok(CompositionInput::new(
            tags.into_iter().map(|tag| tag.id).collect(),
            ingredients
                .into_iter()
                .map(|row| IngredientAmount {
                    ingredient_id: row.ingredient_id,
                    amount: row.amount,
                })
                .collect(),
        ))
    }
}

#[async_trait]
impl RelationStore for PgStore {
    async fn add_relation(
        &self,
        kind: RelationKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> Result<(), Error> {
        relations::add_relation(kind, user_id, target_id, &self.pool).await
    }

    async fn remove_relation(
        &self,
        kind: RelationKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> Result<(), Error> {
        relations::remove_relation(kind, user_id, target_id, &self.pool).await
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn cart_ingredients(&self, user_id: Uuid) -> Result<Vec<CartIngredientRow>, Error> {
        shopping_list::cart_ingredients(user_id, &self.pool).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    pub(crate) fn user(id: Uuid, username: &str) -> User {
        User {
            id,
            username: username.to_string(),
            email: format!("{username}@example.com"),
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    pub(crate) fn ingredient(id: Uuid, name: &str, unit: &str) -> Ingredient {
        Ingredient {
            id,
            name: name.to_string(),
            measurement_unit: unit.to_string(),
        }
    }

    pub(crate) fn tag(id: Uuid, slug: &str) -> Tag {
        Tag {
            id,
            name: slug.to_string(),
            color: String::from("#49B64E"),
            slug: slug.to_string(),
        }
    }

    pub(crate) fn recipe(id: Uuid, author_id: Uuid, name: &str) -> Recipe {
        Recipe {
            id,
            author_id,
            name: name.to_string(),
            image: format!("recipes/{id}.png"),
            text: String::from("Cook it."),
            cooking_time: 30,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_user(user(1, "alice"));
        store.insert_user(user(2, "bob"));
        store.insert_ingredient(ingredient(10, "Flour", "g"));
        store.insert_ingredient(ingredient(11, "Sugar", "g"));
        store.insert_ingredient(ingredient(12, "Egg", "pcs"));
        store.insert_tag(tag(1, "breakfast"));
        store.insert_tag(tag(2, "vegan"));
        store.insert_tag(tag(3, "dinner"));
        store.insert_recipe(recipe(100, 1, "Pancakes"));
        store.insert_recipe(recipe(101, 2, "Bread"));
        store
    }

    fn pairs(raw: &[(Uuid, i32)]) -> Vec<IngredientAmount> {
        raw.iter()
            .map(|(ingredient_id, amount)| IngredientAmount {
                ingredient_id: *ingredient_id,
                amount: *amount,
            })
            .collect()
    }

    #[tokio::test]
    async fn replace_composition_round_trips_exactly() {
        let store = seeded_store();
        let input = CompositionInput::new(vec![1, 2], pairs(&[(10, 200), (11, 50)]));
        store.replace_composition(100, &input).await.unwrap();

        let read = store.composition(100).await.unwrap();
        assert_eq!(read.tags, vec![1, 2]);
        assert_eq!(read.ingredients, pairs(&[(10, 200), (11, 50)]));
    }

    #[tokio::test]
    async fn failed_replace_leaves_the_prior_composition() {
        let store = seeded_store();
        let prior = CompositionInput::new(vec![1], pairs(&[(10, 200)]));
        store.replace_composition(100, &prior).await.unwrap();

        let duplicate_tags = CompositionInput::new(vec![2, 2], pairs(&[(11, 50)]));
        let err = store
            .replace_composition(100, &duplicate_tags)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "tags", .. }));

        let read = store.composition(100).await.unwrap();
        assert_eq!(read.tags, vec![1]);
        assert_eq!(read.ingredients, pairs(&[(10, 200)]));
    }

    #[tokio::test]
    async fn replace_composition_on_missing_recipe_is_not_found() {
        let store = seeded_store();
        let input = CompositionInput::new(vec![1], pairs(&[(10, 200)]));
        let err = store.replace_composition(999, &input).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_relation_is_a_conflict() {
        let store = seeded_store();
        store
            .add_relation(RelationKind::Favorite, 1, 100)
            .await
            .unwrap();
        let err = store
            .add_relation(RelationKind::Favorite, 1, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        store
            .remove_relation(RelationKind::Favorite, 1, 100)
            .await
            .unwrap();
        let err = store
            .remove_relation(RelationKind::Favorite, 1, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn relation_add_on_missing_target_is_not_found() {
        let store = seeded_store();
        let err = store
            .add_relation(RelationKind::ShoppingCart, 1, 999)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn self_subscription_is_rejected() {
        let store = seeded_store();
        let err = store
            .add_relation(RelationKind::Subscription, 1, 1)
            .await
            .unwrap_err();
        assert_eq!(err, Error::SelfFollow);

        store
            .add_relation(RelationKind::Subscription, 1, 2)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn tag_filter_unions_across_slugs() {
        let store = seeded_store();
        store.insert_recipe(recipe(102, 1, "Salad"));
        store
            .replace_composition(100, &CompositionInput::new(vec![1], pairs(&[(10, 1)])))
            .await
            .unwrap();
        store
            .replace_composition(101, &CompositionInput::new(vec![2], pairs(&[(11, 1)])))
            .await
            .unwrap();
        store
            .replace_composition(102, &CompositionInput::new(vec![3], pairs(&[(12, 1)])))
            .await
            .unwrap();

        let filter = RecipeFilter {
            tag_slugs: vec![String::from("breakfast"), String::from("vegan")],
            ..RecipeFilter::default()
        };
        let ids = store.filter_recipes(&filter, Viewer::Anonymous);
        assert_eq!(ids, vec![100, 101]);
    }

    #[tokio::test]
    async fn viewer_bound_filters_are_noops_for_anonymous() {
        let store = seeded_store();
        store
            .add_relation(RelationKind::Favorite, 1, 100)
            .await
            .unwrap();

        let filter = RecipeFilter {
            is_favorited: true,
            ..RecipeFilter::default()
        };
        assert_eq!(
            store.filter_recipes(&filter, Viewer::Anonymous),
            vec![100, 101]
        );
        assert_eq!(store.filter_recipes(&filter, Viewer::User(1)), vec![100]);
        assert!(store.filter_recipes(&filter, Viewer::User(2)).is_empty());
    }

    #[tokio::test]
    async fn name_prefix_and_author_narrow_the_listing() {
        let store = seeded_store();
        let filter = RecipeFilter {
            name_prefix: Some(String::from("pan")),
            ..RecipeFilter::default()
        };
        assert_eq!(store.filter_recipes(&filter, Viewer::Anonymous), vec![100]);

        let filter = RecipeFilter {
            author: Some(2),
            ..RecipeFilter::default()
        };
        assert_eq!(store.filter_recipes(&filter, Viewer::Anonymous), vec![101]);
    }

    #[tokio::test]
    async fn deleting_a_recipe_cascades() {
        let store = seeded_store();
        store
            .replace_composition(100, &CompositionInput::new(vec![1], pairs(&[(10, 200)])))
            .await
            .unwrap();
        store
            .add_relation(RelationKind::Favorite, 2, 100)
            .await
            .unwrap();
        store
            .add_relation(RelationKind::ShoppingCart, 2, 100)
            .await
            .unwrap();

        let image = store.delete_recipe(100).unwrap();
        assert_eq!(image, "recipes/100.png");

        assert!(!store.has_relation(RelationKind::Favorite, 2, 100));
        assert!(!store.has_relation(RelationKind::ShoppingCart, 2, 100));
        let err = store.composition(100).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = store.delete_recipe(100).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_a_recipe_keeps_subscriptions() {
        let store = seeded_store();
        store
            .add_relation(RelationKind::Subscription, 2, 1)
            .await
            .unwrap();
        store.delete_recipe(100).unwrap();
        assert!(store.has_relation(RelationKind::Subscription, 2, 1));
    }
}

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::constants::MIN_UNIT;
use crate::error::Error;
use crate::schema::{IngredientAmount, Uuid};

/// The full tag set and ingredient-amount set a recipe should end up
/// with. Replacement is all-or-nothing, so a recipe is never observable
/// with an empty tag or ingredient set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionInput {
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<IngredientAmount>,
}

impl CompositionInput {
    pub fn new(tags: Vec<Uuid>, ingredients: Vec<IngredientAmount>) -> Self {
        Self { tags, ingredients }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.tags.is_empty() {
            return Err(Error::validation("tags", "a recipe needs at least one tag"));
        }

        let distinct_tags: HashSet<Uuid> = self.tags.iter().copied().collect();
        if distinct_tags.len() != self.tags.len() {
            return Err(Error::validation("tags", "duplicate tags are not allowed"));
        }

        if self.ingredients.is_empty() {
            return Err(Error::validation(
                "ingredients",
                "a recipe needs at least one ingredient",
            ));
        }

        let distinct_ingredients: HashSet<Uuid> = self
            .ingredients
            .iter()
            .map(|pair| pair.ingredient_id)
            .collect();
        if distinct_ingredients.len() != self.ingredients.len() {
            return Err(Error::validation(
                "ingredients",
                "duplicate ingredients are not allowed",
            ));
        }

        if self.ingredients.iter().any(|pair| pair.amount < MIN_UNIT) {
            return Err(Error::validation(
                "amount",
                "ingredient amounts must be positive",
            ));
        }

        Ok(())
    }
}

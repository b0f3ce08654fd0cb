use std::collections::HashMap;

use serde_json::Value;

use crate::constants::{MAX_NAME_LENGTH, MINUTES_IN_DAY, MIN_UNIT};
use crate::error::Error;
use crate::schema::{IngredientAmount, Uuid};

pub type FormData = HashMap<String, Value>;

pub struct Form {
    inner: HashMap<String, Value>,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_str(&self, key: &'static str) -> Result<String, Error> {
        match self.inner.get(key).and_then(|value| value.as_str()) {
            Some(v) => Ok(v.to_string()),
            None => Err(Error::validation(key, "expected a string value")),
        }
    }

    pub fn get_i32(&self, key: &'static str) -> Result<i32, Error> {
        match self.inner.get(key).and_then(|value| value.as_i64()) {
            Some(v) => i32::try_from(v).map_err(|_| Error::validation(key, "value out of range")),
            None => Err(Error::validation(key, "expected an integer value")),
        }
    }

    pub fn get_id_list(&self, key: &'static str) -> Result<Vec<Uuid>, Error> {
        let values = match self.inner.get(key).and_then(|value| value.as_array()) {
            Some(v) => v,
            None => return Err(Error::validation(key, "expected a list of ids")),
        };

        values
            .iter()
            .map(|value| match value.as_i64() {
                Some(id) => {
                    i32::try_from(id).map_err(|_| Error::validation(key, "id out of range"))
                }
                None => Err(Error::validation(key, "expected a list of ids")),
            })
            .collect()
    }

    pub fn get_ingredient_list(&self, key: &'static str) -> Result<Vec<IngredientAmount>, Error> {
        let values = match self.inner.get(key).and_then(|value| value.as_array()) {
            Some(v) => v,
            None => {
                return Err(Error::validation(
                    key,
                    "expected a list of {id, amount} pairs",
                ))
            }
        };

        values
            .iter()
            .map(|value| {
                serde_json::from_value::<IngredientAmount>(value.clone())
                    .map_err(|_| Error::validation(key, "expected a list of {id, amount} pairs"))
            })
            .collect()
    }
}

// The scalar half of a recipe payload. Tags and ingredients are decoded
// separately into a `CompositionInput`.
#[derive(Debug, Clone)]
pub struct RecipeForm {
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
}

impl RecipeForm {
    pub fn from_form(form: &Form) -> Result<Self, Error> {
        let name = form.get_str("name")?;
        if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
            return Err(Error::validation("name", "name length out of bounds"));
        }

        let cooking_time = form.get_i32("cooking_time")?;
        if !(MIN_UNIT..=MINUTES_IN_DAY).contains(&cooking_time) {
            return Err(Error::validation(
                "cooking_time",
                "cooking time must be between 1 and 1440 minutes",
            ));
        }

        Ok(Self {
            name,
            text: form.get_str("text")?,
            image: form.get_str("image")?,
            cooking_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recipe_data(cooking_time: i64) -> FormData {
        let mut data = FormData::new();
        data.insert("name".to_string(), json!("Pancakes"));
        data.insert("text".to_string(), json!("Mix and fry."));
        data.insert("image".to_string(), json!("data:image/png;base64,aGk="));
        data.insert("cooking_time".to_string(), json!(cooking_time));
        data.insert("tags".to_string(), json!([1, 2]));
        data.insert(
            "ingredients".to_string(),
            json!([{"id": 10, "amount": 200}, {"id": 11, "amount": 50}]),
        );
        data
    }

    #[test]
    fn decodes_a_full_recipe_payload() {
        let form = Form::from_data(recipe_data(30));
        let recipe = RecipeForm::from_form(&form).unwrap();
        assert_eq!(recipe.name, "Pancakes");
        assert_eq!(recipe.cooking_time, 30);

        assert_eq!(form.get_id_list("tags").unwrap(), vec![1, 2]);
        let ingredients = form.get_ingredient_list("ingredients").unwrap();
        assert_eq!(ingredients.len(), 2);
        assert_eq!(ingredients[0].ingredient_id, 10);
        assert_eq!(ingredients[0].amount, 200);
    }

    #[test]
    fn rejects_out_of_range_cooking_time() {
        for bad in [0, 1441] {
            let form = Form::from_data(recipe_data(bad));
            let err = RecipeForm::from_form(&form).unwrap_err();
            assert!(matches!(
                err,
                Error::Validation {
                    field: "cooking_time",
                    ..
                }
            ));
        }
    }

    #[test]
    fn name_length_counts_characters_not_bytes() {
        // 200 Cyrillic characters take 400 bytes and must still pass.
        let mut data = recipe_data(30);
        data.insert("name".to_string(), json!("Щи".repeat(100)));
        let form = Form::from_data(data);
        assert!(RecipeForm::from_form(&form).is_ok());

        let mut data = recipe_data(30);
        data.insert("name".to_string(), json!("Щ".repeat(201)));
        let form = Form::from_data(data);
        let err = RecipeForm::from_form(&form).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "name", .. }));
    }

    #[test]
    fn missing_field_names_the_key() {
        let mut data = recipe_data(30);
        data.remove("ingredients");
        let form = Form::from_data(data);
        let err = form.get_ingredient_list("ingredients").unwrap_err();
        assert!(matches!(
            err,
            Error::Validation {
                field: "ingredients",
                ..
            }
        ));
    }
}

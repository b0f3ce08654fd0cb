use std::collections::BTreeMap;

use sqlx::{Pool, Postgres};

use crate::constants::SHOPPING_LIST_HEADER;
use crate::error::Error;
use crate::schema::{CartIngredientRow, ShoppingListEntry, Uuid};
use crate::store::CartStore;

pub async fn build_shopping_list<S: CartStore + ?Sized>(
    user_id: Uuid,
    store: &S,
) -> Result<Vec<ShoppingListEntry>, Error> {
    let rows = store.cart_ingredients(user_id).await?;
    Ok(aggregate(rows))
}

/// Sums amounts per (name, unit) display identity, not ingredient id.
/// Output is ordered by name, then unit.
pub fn aggregate(rows: Vec<CartIngredientRow>) -> Vec<ShoppingListEntry> {
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();

    for row in rows {
        let key = (capitalize(&row.name), row.measurement_unit);
        *totals.entry(key).or_insert(0) += i64::from(row.amount);
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), total)| ShoppingListEntry {
            name,
            measurement_unit,
            total,
        })
        .collect()
}

pub fn render_shopping_list(entries: &[ShoppingListEntry]) -> String {
    let lines = entries
        .iter()
        .map(|entry| {
            format!(
                "{} ({}) - {}",
                entry.name, entry.measurement_unit, entry.total
            )
        })
        .collect::<Vec<String>>()
        .join(",\n");

    format!("{SHOPPING_LIST_HEADER}\n{lines}")
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

pub async fn cart_ingredients(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<CartIngredientRow>, Error> {
    let rows: Vec<CartIngredientRow> = sqlx::query_as(
        "
        SELECT i.name, i.measurement_unit, ri.amount
        FROM shopping_carts c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::CompositionInput;
    use crate::schema::{IngredientAmount, RelationKind};
    use crate::store::tests::seeded_store;
    use crate::store::{CompositionStore, RelationStore};

    fn pair(ingredient_id: i32, amount: i32) -> IngredientAmount {
        IngredientAmount {
            ingredient_id,
            amount,
        }
    }

    fn entry(name: &str, unit: &str, total: i64) -> ShoppingListEntry {
        ShoppingListEntry {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            total,
        }
    }

    #[tokio::test]
    async fn sums_amounts_across_cart_recipes() {
        let store = seeded_store();
        // Recipe A: Flour 200 g, Sugar 50 g. Recipe B: Flour 100 g, Egg 2 pcs.
        store
            .replace_composition(
                100,
                &CompositionInput::new(vec![1], vec![pair(10, 200), pair(11, 50)]),
            )
            .await
            .unwrap();
        store
            .replace_composition(
                101,
                &CompositionInput::new(vec![2], vec![pair(10, 100), pair(12, 2)]),
            )
            .await
            .unwrap();
        store
            .add_relation(RelationKind::ShoppingCart, 1, 100)
            .await
            .unwrap();
        store
            .add_relation(RelationKind::ShoppingCart, 1, 101)
            .await
            .unwrap();

        let list = build_shopping_list(1, &store).await.unwrap();
        assert_eq!(
            list,
            vec![
                entry("Egg", "pcs", 2),
                entry("Flour", "g", 300),
                entry("Sugar", "g", 50),
            ]
        );
    }

    #[tokio::test]
    async fn empty_cart_yields_an_empty_list() {
        let store = seeded_store();
        let list = build_shopping_list(1, &store).await.unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn same_name_with_different_units_stays_separate() {
        let rows = vec![
            CartIngredientRow {
                name: String::from("Milk"),
                measurement_unit: String::from("ml"),
                amount: 200,
            },
            CartIngredientRow {
                name: String::from("milk"),
                measurement_unit: String::from("g"),
                amount: 30,
            },
        ];
        let list = aggregate(rows);
        assert_eq!(list, vec![entry("Milk", "g", 30), entry("Milk", "ml", 200)]);
    }

    #[test]
    fn renders_the_report_format() {
        let entries = vec![entry("Flour", "g", 300), entry("Sugar", "g", 50)];
        assert_eq!(
            render_shopping_list(&entries),
            "Shopping list:\nFlour (g) - 300,\nSugar (g) - 50"
        );
    }
}

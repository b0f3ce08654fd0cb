use sqlx::{Pool, Postgres};

use crate::constants::INGREDIENT_COUNT_PER_PAGE;
use crate::error::Error;
use crate::schema::{Ingredient, Uuid};

pub async fn list_ingredients(
    search: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = match search {
        Some(prefix) => {
            sqlx::query_as("SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name LIMIT $2")
                .bind(format!("{prefix}%"))
                .bind(INGREDIENT_COUNT_PER_PAGE)
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM ingredients ORDER BY name LIMIT $1")
                .bind(INGREDIENT_COUNT_PER_PAGE)
                .fetch_all(pool)
                .await?
        }
    };

    Ok(rows)
}

pub async fn get_ingredient(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn find_ingredient(name: &str, pool: &Pool<Postgres>) -> Result<Option<Uuid>, Error> {
    let row: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM ingredients WHERE LOWER(name) = LOWER($1)")
            .bind(name)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(|r| r.0))
}

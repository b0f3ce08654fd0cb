use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::composition::CompositionInput;
use crate::constants::RECIPE_COUNT_PER_PAGE;
use crate::error::Error;
use crate::form::RecipeForm;
use crate::pagination::PageContext;
use crate::schema::{
    Recipe, RecipeFilter, RecipeIngredientRow, RecipeRow, RecipeSummary, Uuid, Viewer,
};

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Viewer,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRow>, Error> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(prefix) = &filter.name_prefix {
        query.push(" AND r.name ILIKE ");
        query.push_bind(format!("{prefix}%"));
    }

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ");
        query.push_bind(author);
    }

    if !filter.tag_slugs.is_empty() {
        query.push(
            " AND EXISTS (
                SELECT 1 FROM recipe_tags rt
                INNER JOIN tags t ON t.id = rt.tag_id
                WHERE rt.recipe_id = r.id AND t.slug = ANY(",
        );
        query.push_bind(filter.tag_slugs.clone());
        query.push("))");
    }

    if filter.is_favorited {
        if let Some(user_id) = viewer.user_id() {
            query.push(
                " AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ",
            );
            query.push_bind(user_id);
            query.push(")");
        }
    }

    if filter.is_in_shopping_cart {
        if let Some(user_id) = viewer.user_id() {
            query.push(
                " AND EXISTS (SELECT 1 FROM shopping_carts c WHERE c.recipe_id = r.id AND c.user_id = ",
            );
            query.push_bind(user_id);
            query.push(")");
        }
    }

    query.push(" ORDER BY r.created_at DESC LIMIT ");
    query.push_bind(RECIPE_COUNT_PER_PAGE);
    query.push(" OFFSET ");
    query.push_bind(offset);

    let rows: Vec<RecipeRow> = query.build_query_as().fetch_all(pool).await?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, RECIPE_COUNT_PER_PAGE, offset);
    Ok(page)
}

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_recipe_summary(
    id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeSummary>, Error> {
    let row: Option<RecipeSummary> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(row)
}

pub async fn find_recipe(name: &str, pool: &Pool<Postgres>) -> Result<Option<Uuid>, Error> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM recipes WHERE LOWER(name) = LOWER($1)")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.0))
}

// `form.image` is the already-stored reference, not the raw payload.
pub async fn create_recipe(
    author_id: Uuid,
    form: &RecipeForm,
    composition: &CompositionInput,
    pool: &Pool<Postgres>,
) -> Result<Uuid, Error> {
    composition.validate()?;

    let mut tx = pool.begin().await?;

    let id: (Uuid,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time, created_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&form.name)
    .bind(&form.image)
    .bind(&form.text)
    .bind(form.cooking_time)
    .fetch_one(&mut *tx)
    .await?;

    write_composition(&mut tx, id.0, composition).await?;

    tx.commit().await?;

    log::info!("created recipe {} by user {author_id}", id.0);
    Ok(id.0)
}

pub async fn update_recipe(
    id: Uuid,
    form: &RecipeForm,
    composition: &CompositionInput,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    composition.validate()?;

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE recipes SET name = $1, image = $2, text = $3, cooking_time = $4 WHERE id = $5",
    )
    .bind(&form.name)
    .bind(&form.image)
    .bind(&form.text)
    .bind(form.cooking_time)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::not_found("no recipe with this id"));
    }

    write_composition(&mut tx, id, composition).await?;

    tx.commit().await?;
    Ok(())
}

pub async fn replace_composition(
    id: Uuid,
    composition: &CompositionInput,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    composition.validate()?;

    if get_recipe(id, pool).await?.is_none() {
        return Err(Error::not_found("no recipe with this id"));
    }

    let mut tx = pool.begin().await?;
    write_composition(&mut tx, id, composition).await?;
    tx.commit().await?;
    Ok(())
}

// Delete-then-recreate inside the caller's transaction. Inputs are
// already validated.
async fn write_composition(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    composition: &CompositionInput,
) -> Result<(), Error> {
    let tag_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tags WHERE id = ANY($1)")
        .bind(&composition.tags)
        .fetch_one(&mut **tx)
        .await?;
    if tag_count.0 != composition.tags.len() as i64 {
        return Err(Error::not_found("unknown tag id"));
    }

    let ingredient_ids: Vec<Uuid> = composition
        .ingredients
        .iter()
        .map(|pair| pair.ingredient_id)
        .collect();
    let ingredient_count: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM ingredients WHERE id = ANY($1)")
            .bind(&ingredient_ids)
            .fetch_one(&mut **tx)
            .await?;
    if ingredient_count.0 != ingredient_ids.len() as i64 {
        return Err(Error::not_found("unknown ingredient id"));
    }

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await?;

    let mut tag_insert: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    tag_insert.push_values(composition.tags.iter(), |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(tag_id);
    });
    tag_insert.build().execute(&mut **tx).await?;

    let mut ingredient_insert: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    ingredient_insert.push_values(composition.ingredients.iter(), |mut b, pair| {
        b.push_bind(recipe_id)
            .push_bind(pair.ingredient_id)
            .push_bind(pair.amount);
    });
    ingredient_insert.build().execute(&mut **tx).await?;

    Ok(())
}

pub async fn list_recipe_ingredients(
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeIngredientRow>, Error> {
    let rows: Vec<RecipeIngredientRow> = sqlx::query_as(
        "
        SELECT ri.recipe_id, ri.ingredient_id, ri.amount, i.name, i.measurement_unit
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY i.name
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Cascades to the join rows, favorites and cart entries. Returns the
/// stored image reference so the caller can delete the file.
pub async fn delete_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<String, Error> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| Error::not_found("no recipe with this id"))?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM favorites WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM shopping_carts WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    log::info!("deleted recipe {id}");
    Ok(recipe.image)
}

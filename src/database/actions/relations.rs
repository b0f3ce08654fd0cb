use sqlx::{Pool, Postgres};

use crate::error::Error;
use crate::schema::{RelationKind, Uuid};

use super::recipes::get_recipe;
use super::users::get_user_by_id;

// The uniqueness constraint rejects the duplicate; the `rows_affected`
// check translates the losing insert into a `Conflict`.
pub async fn add_relation(
    kind: RelationKind,
    user_id: Uuid,
    target_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    if kind == RelationKind::Subscription && user_id == target_id {
        return Err(Error::SelfFollow);
    }

    ensure_target_exists(kind, target_id, pool).await?;

    let result = match kind {
        RelationKind::Favorite => {
            sqlx::query(
                "INSERT INTO favorites (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(target_id)
            .execute(pool)
            .await?
        }
        RelationKind::ShoppingCart => {
            sqlx::query(
                "INSERT INTO shopping_carts (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(target_id)
            .execute(pool)
            .await?
        }
        RelationKind::Subscription => {
            sqlx::query(
                "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(target_id)
            .execute(pool)
            .await?
        }
    };

    if result.rows_affected() == 0 {
        return Err(Error::conflict(match kind {
            RelationKind::Favorite => "recipe is already in favorites",
            RelationKind::ShoppingCart => "recipe is already in the shopping cart",
            RelationKind::Subscription => "already subscribed to this author",
        }));
    }

    Ok(())
}

pub async fn remove_relation(
    kind: RelationKind,
    user_id: Uuid,
    target_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let result = match kind {
        RelationKind::Favorite => {
            sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND recipe_id = $2")
                .bind(user_id)
                .bind(target_id)
                .execute(pool)
                .await?
        }
        RelationKind::ShoppingCart => {
            sqlx::query("DELETE FROM shopping_carts WHERE user_id = $1 AND recipe_id = $2")
                .bind(user_id)
                .bind(target_id)
                .execute(pool)
                .await?
        }
        RelationKind::Subscription => {
            sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
                .bind(user_id)
                .bind(target_id)
                .execute(pool)
                .await?
        }
    };

    if result.rows_affected() == 0 {
        return Err(Error::not_found(match kind {
            RelationKind::Favorite => "recipe is not in favorites",
            RelationKind::ShoppingCart => "recipe is not in the shopping cart",
            RelationKind::Subscription => "not subscribed to this author",
        }));
    }

    Ok(())
}

pub async fn has_relation(
    kind: RelationKind,
    user_id: Uuid,
    target_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let row: Option<(Uuid,)> = match kind {
        RelationKind::Favorite => {
            sqlx::query_as("SELECT recipe_id FROM favorites WHERE user_id = $1 AND recipe_id = $2")
                .bind(user_id)
                .bind(target_id)
                .fetch_optional(pool)
                .await?
        }
        RelationKind::ShoppingCart => {
            sqlx::query_as(
                "SELECT recipe_id FROM shopping_carts WHERE user_id = $1 AND recipe_id = $2",
            )
            .bind(user_id)
            .bind(target_id)
            .fetch_optional(pool)
            .await?
        }
        RelationKind::Subscription => {
            sqlx::query_as(
                "SELECT author_id FROM subscriptions WHERE user_id = $1 AND author_id = $2",
            )
            .bind(user_id)
            .bind(target_id)
            .fetch_optional(pool)
            .await?
        }
    };

    Ok(row.is_some())
}

async fn ensure_target_exists(
    kind: RelationKind,
    target_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let exists = match kind {
        RelationKind::Subscription => get_user_by_id(target_id, pool).await?.is_some(),
        _ => get_recipe(target_id, pool).await?.is_some(),
    };

    if !exists {
        return Err(Error::not_found(match kind {
            RelationKind::Subscription => "no user with this id",
            _ => "no recipe with this id",
        }));
    }

    Ok(())
}

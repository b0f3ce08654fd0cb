use sqlx::{Pool, Postgres};

use crate::error::Error;
use crate::schema::{SubscribedAuthor, User, Uuid};

pub async fn get_user(username: &str, pool: &Pool<Postgres>) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_by_id(user_id: Uuid, pool: &Pool<Postgres>) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn list_subscriptions(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<SubscribedAuthor>, Error> {
    let rows: Vec<SubscribedAuthor> = sqlx::query_as(
        "
        SELECT u.id, u.username, COUNT(r.id) AS recipe_count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        LEFT JOIN recipes r ON r.author_id = u.id
        WHERE s.user_id = $1
        GROUP BY u.id, u.username
        ORDER BY u.username
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

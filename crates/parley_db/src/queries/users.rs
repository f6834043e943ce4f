//! User preference queries.

use chrono::NaiveDateTime;
use sqlx::{FromRow, SqlitePool};

use crate::error::DbResult;

/// A row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserRow {
    pub id: String,
    pub model: Option<String>,
    /// The user's system prompt
    pub system: Option<String>,
    pub updated_at: NaiveDateTime,
}

/// Get a user's stored preferences.
pub async fn get_user(pool: &SqlitePool, id: &str) -> DbResult<Option<UserRow>> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, model, system, updated_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Insert or update a user. `None` arguments keep the stored value.
pub async fn upsert_user(
    pool: &SqlitePool,
    id: &str,
    model: Option<&str>,
    system: Option<&str>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, model, system, updated_at)
        VALUES (?1, ?2, ?3, datetime('now'))
        ON CONFLICT(id) DO UPDATE SET
            model = COALESCE(excluded.model, users.model),
            system = COALESCE(excluded.system, users.system),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(id)
    .bind(model)
    .bind(system)
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete a user. Returns whether a row was removed.
pub async fn delete_user(pool: &SqlitePool, id: &str) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// List all users, most recently updated first.
pub async fn list_users(pool: &SqlitePool) -> DbResult<Vec<UserRow>> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, model, system, updated_at FROM users ORDER BY updated_at DESC, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

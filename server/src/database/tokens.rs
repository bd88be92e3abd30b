use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Result, Row};

use super::utils::get_timestamp;

/// An API token row. The secret itself is never stored, only its digest.
#[derive(Debug, Clone)]
pub struct ApiToken {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub expires_at: Option<i64>,
    pub last_used_at: Option<i64>,
    pub created_at: i64,
}

impl ApiToken {
    /// `true` when the token carries an expiry that lies before `now`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|exp| exp < now)
    }
}

/// Data required to INSERT a new token row.
#[derive(Debug, Clone)]
pub struct NewApiToken {
    pub user_id: i64,
    pub name: String,
    pub token_hash: String,
    pub expires_at: Option<i64>,
}

fn token_from_row(row: &SqliteRow) -> Result<ApiToken> {
    Ok(ApiToken {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        expires_at: row.try_get("expires_at")?,
        last_used_at: row.try_get("last_used_at")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Find a token by the digest of its secret
pub async fn find_by_hash(pool: &SqlitePool, token_hash: &str) -> Result<Option<ApiToken>> {
    let row = sqlx::query(
        "SELECT id, user_id, name, expires_at, last_used_at, created_at
         FROM api_tokens WHERE token_hash = ?1",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(token_from_row).transpose()
}

pub async fn get_token(pool: &SqlitePool, token_id: i64) -> Result<Option<ApiToken>> {
    let row = sqlx::query(
        "SELECT id, user_id, name, expires_at, last_used_at, created_at
         FROM api_tokens WHERE id = ?1",
    )
    .bind(token_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(token_from_row).transpose()
}

/// Record a successful use of a token
pub async fn touch_last_used(pool: &SqlitePool, token_id: i64, now: i64) -> Result<()> {
    sqlx::query("UPDATE api_tokens SET last_used_at = ?1 WHERE id = ?2")
        .bind(now)
        .bind(token_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Create a new token and return its id
pub async fn create_token(pool: &SqlitePool, new_token: NewApiToken) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO api_tokens (user_id, name, token_hash, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(new_token.user_id)
    .bind(new_token.name)
    .bind(new_token.token_hash)
    .bind(new_token.expires_at)
    .bind(get_timestamp())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

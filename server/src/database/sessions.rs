use sqlx::sqlite::SqlitePool;
use sqlx::{Result, Row};

/// A persisted session row. `payload` is the JSON-encoded slot map.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub principal_id: Option<i64>,
    pub remember: bool,
    pub payload: String,
    pub last_activity: i64,
    pub expires_at: i64,
}

/// Load a session row that has not yet expired
pub async fn load_session(pool: &SqlitePool, id: &str, now: i64) -> Result<Option<SessionRecord>> {
    let row = sqlx::query(
        "SELECT id, principal_id, remember, payload, last_activity, expires_at
         FROM sessions WHERE id = ?1 AND expires_at > ?2",
    )
    .bind(id)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(SessionRecord {
            id: row.try_get("id")?,
            principal_id: row.try_get("principal_id")?,
            remember: row.try_get("remember")?,
            payload: row.try_get("payload")?,
            last_activity: row.try_get("last_activity")?,
            expires_at: row.try_get("expires_at")?,
        })),
        None => Ok(None),
    }
}

/// Insert or replace a session row (last write wins)
pub async fn upsert_session(pool: &SqlitePool, record: &SessionRecord) -> Result<()> {
    sqlx::query(
        "INSERT INTO sessions (id, principal_id, remember, payload, last_activity, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            principal_id  = excluded.principal_id,
            remember      = excluded.remember,
            payload       = excluded.payload,
            last_activity = excluded.last_activity,
            expires_at    = excluded.expires_at",
    )
    .bind(&record.id)
    .bind(record.principal_id)
    .bind(record.remember)
    .bind(&record.payload)
    .bind(record.last_activity)
    .bind(record.expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete a session (logout / id rotation)
pub async fn delete_session(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Clean up expired sessions
pub async fn cleanup_expired_sessions(pool: &SqlitePool, now: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Whether a session id is currently stored (expired or not)
pub async fn session_exists(pool: &SqlitePool, id: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE id = ?1")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

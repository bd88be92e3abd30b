use shared::types::ImpersonationAudit;
use sqlx::Result;
use sqlx::sqlite::SqlitePool;

use super::utils::get_timestamp;

/// Append one impersonation audit row
pub async fn insert_impersonation_audit(
    pool: &SqlitePool,
    entry: &ImpersonationAudit,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO impersonation_audit
            (event, admin_id, admin_email, target_id, target_email, target_client_id,
             ip_address, user_agent, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(entry.event.as_str())
    .bind(entry.admin_id)
    .bind(&entry.admin_email)
    .bind(entry.target_id)
    .bind(&entry.target_email)
    .bind(entry.target_client_id)
    .bind(&entry.ip_address)
    .bind(&entry.user_agent)
    .bind(get_timestamp())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Count audit rows for an administrator and event kind
pub async fn count_impersonation_audit(
    pool: &SqlitePool,
    admin_id: i64,
    event: &str,
) -> Result<i64> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM impersonation_audit WHERE admin_id = ?1 AND event = ?2",
    )
    .bind(admin_id)
    .bind(event)
    .fetch_one(pool)
    .await
}

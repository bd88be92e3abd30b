use shared::types::{Client, Principal, Role};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Result, Row};

use super::utils::get_timestamp;

/// Auth record used by the login handler: the principal plus its hash.
#[derive(Debug, Clone)]
pub struct UserAuth {
    pub principal: Principal,
    pub password_hash: String,
}

/// Data required to INSERT a new user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub client_id: Option<i64>,
}

const PRINCIPAL_COLUMNS: &str = "id, email, name, role, client_id, is_active";

fn principal_from_row(row: &SqliteRow) -> Result<Principal> {
    let role: String = row.try_get("role")?;
    let role = role.parse::<Role>().map_err(|e| sqlx::Error::ColumnDecode {
        index: "role".to_string(),
        source: e.into(),
    })?;

    Ok(Principal {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        role,
        client_id: row.try_get("client_id")?,
        is_active: row.try_get("is_active")?,
    })
}

/// Look up a principal by id. `None` when the user no longer exists.
pub async fn get_principal(pool: &SqlitePool, user_id: i64) -> Result<Option<Principal>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE id = ?1",
        PRINCIPAL_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(principal_from_row).transpose()
}

/// Get user authentication data by email (case-insensitive)
pub async fn get_user_auth(pool: &SqlitePool, email: &str) -> Result<Option<UserAuth>> {
    let row = sqlx::query(&format!(
        "SELECT {}, password_hash FROM users WHERE email = ?1 COLLATE NOCASE",
        PRINCIPAL_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(UserAuth {
            principal: principal_from_row(&row)?,
            password_hash: row.try_get("password_hash")?,
        })),
        None => Ok(None),
    }
}

/// Create a new user and return its id
pub async fn create_user(pool: &SqlitePool, new_user: NewUser) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO users (email, name, password_hash, role, client_id, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
    )
    .bind(new_user.email)
    .bind(new_user.name)
    .bind(new_user.password_hash)
    .bind(new_user.role.as_str())
    .bind(new_user.client_id)
    .bind(get_timestamp())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Activate or deactivate an account
pub async fn set_user_active(pool: &SqlitePool, user_id: i64, active: bool) -> Result<()> {
    sqlx::query("UPDATE users SET is_active = ?1 WHERE id = ?2")
        .bind(active)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a user (cascades to their API tokens)
pub async fn delete_user(pool: &SqlitePool, user_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM users WHERE id = ?1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// All client-role users, for the admin impersonation picker
pub async fn list_client_users(pool: &SqlitePool) -> Result<Vec<Principal>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM users WHERE role = 'client' ORDER BY email",
        PRINCIPAL_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(principal_from_row).collect()
}

// ---------------------------------------------------------------------------
// Clients (tenants)
// ---------------------------------------------------------------------------

fn client_from_row(row: &SqliteRow) -> Result<Client> {
    Ok(Client {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn create_client(pool: &SqlitePool, name: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO clients (name, created_at) VALUES (?1, ?2)")
        .bind(name)
        .bind(get_timestamp())
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_client(pool: &SqlitePool, client_id: i64) -> Result<Option<Client>> {
    let row = sqlx::query("SELECT id, name, created_at FROM clients WHERE id = ?1")
        .bind(client_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(client_from_row).transpose()
}

pub async fn list_clients(pool: &SqlitePool) -> Result<Vec<Client>> {
    let rows = sqlx::query("SELECT id, name, created_at FROM clients ORDER BY name")
        .fetch_all(pool)
        .await?;

    rows.iter().map(client_from_row).collect()
}

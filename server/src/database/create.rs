use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Executor, Result};
use tracing::info;

/// Current schema version. Bump this whenever the schema changes and add a
/// corresponding migration arm in `run_migrations`.
const SCHEMA_VERSION: i64 = 1;

/// Initialize the database schema and run any pending migrations.
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_schema(pool).await?;
    run_migrations(pool).await?;
    Ok(())
}

/// Create all tables for a brand-new database.
async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Tenants whose leads are reported on the client surface
    pool.execute(
        "CREATE TABLE IF NOT EXISTS clients (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            name       TEXT    NOT NULL,
            created_at INTEGER NOT NULL
        )",
    )
    .await?;

    // Users table. Role is 'admin' or 'client'; client users carry client_id
    pool.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            email         TEXT    NOT NULL UNIQUE,
            name          TEXT    NOT NULL,
            password_hash TEXT    NOT NULL,
            role          TEXT    NOT NULL DEFAULT 'client',
            client_id     INTEGER,
            is_active     INTEGER NOT NULL DEFAULT 1,
            created_at    INTEGER NOT NULL,
            FOREIGN KEY (client_id) REFERENCES clients(id) ON DELETE SET NULL
        )",
    )
    .await?;

    // API tokens: only the SHA-256 digest of the secret is stored
    pool.execute(
        "CREATE TABLE IF NOT EXISTS api_tokens (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id      INTEGER NOT NULL,
            name         TEXT    NOT NULL,
            token_hash   TEXT    NOT NULL UNIQUE,
            expires_at   INTEGER,
            last_used_at INTEGER,
            created_at   INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
    )
    .await?;

    // Browser sessions: payload is the JSON slot map
    pool.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            id            TEXT    PRIMARY KEY,
            principal_id  INTEGER,
            remember      INTEGER NOT NULL DEFAULT 0,
            payload       TEXT    NOT NULL DEFAULT '{}',
            last_activity INTEGER NOT NULL,
            expires_at    INTEGER NOT NULL
        )",
    )
    .await?;

    // Impersonation audit trail. No foreign keys: rows must outlive the users.
    pool.execute(
        "CREATE TABLE IF NOT EXISTS impersonation_audit (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            event            TEXT    NOT NULL,
            admin_id         INTEGER NOT NULL,
            admin_email      TEXT    NOT NULL,
            target_id        INTEGER NOT NULL,
            target_email     TEXT    NOT NULL,
            target_client_id INTEGER,
            ip_address       TEXT,
            user_agent       TEXT,
            created_at       INTEGER NOT NULL
        )",
    )
    .await?;

    pool.execute(
        "CREATE TABLE IF NOT EXISTS leads (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id  INTEGER,
            email      TEXT    NOT NULL,
            name       TEXT,
            subject    TEXT,
            status     TEXT    NOT NULL DEFAULT 'new',
            source     TEXT    NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (client_id) REFERENCES clients(id) ON DELETE SET NULL
        )",
    )
    .await?;

    // --- Indexes --------------------------------------------------------
    pool.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_client_id     ON users(client_id);
         CREATE INDEX IF NOT EXISTS idx_api_tokens_user_id  ON api_tokens(user_id);
         CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
         CREATE INDEX IF NOT EXISTS idx_audit_admin_id      ON impersonation_audit(admin_id);
         CREATE INDEX IF NOT EXISTS idx_leads_client_id     ON leads(client_id);
         CREATE INDEX IF NOT EXISTS idx_leads_status        ON leads(status);",
    )
    .await?;

    Ok(())
}

/// Apply any schema migrations required to reach `SCHEMA_VERSION`.
///
/// Uses `PRAGMA user_version` as the migration counter.
async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    info!(
        "Database schema at version {}; target version {}. Running migrations…",
        current_version, SCHEMA_VERSION
    );

    // Add future migration arms here:
    // if current_version < 2 { ... }

    pool.execute(format!("PRAGMA user_version = {}", SCHEMA_VERSION).as_str())
        .await?;

    info!("Schema version set to {}.", SCHEMA_VERSION);

    Ok(())
}

/// Open or create the database and ensure the schema is up to date.
///
/// `:memory:` opens a private in-memory database on a single pooled
/// connection, so every query sees the same data.
pub async fn open_database(path: &str) -> Result<SqlitePool> {
    let pool = if path == ":memory:" {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?
    };

    create_tables(&pool).await?;
    Ok(pool)
}

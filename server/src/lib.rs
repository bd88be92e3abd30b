pub mod auth;
pub mod cli;
pub mod database;
pub mod handlers;
pub mod impersonation;
pub mod jobs;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

use anyhow::{Context, Result};
use shared::config::LiveConfig;
use shared::types::server_config::AppConfig;
use sqlx::sqlite::SqlitePool;

use crate::session::SessionStore;

/// Everything a request handler needs. Cheap to clone: the pool, the config
/// handle and the session store are all reference-counted.
#[derive(Clone, Debug)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: LiveConfig,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(db: SqlitePool, config: LiveConfig) -> Self {
        let sessions = SessionStore::new(db.clone(), config.clone());
        Self {
            db,
            config,
            sessions,
        }
    }

    /// Open the configured database and build the state around it.
    pub async fn open(config: AppConfig) -> Result<Self> {
        let db = database::open_database(&config.database.path)
            .await
            .with_context(|| format!("Failed to open database {}", config.database.path))?;
        Ok(Self::new(db, LiveConfig::new(config)))
    }
}

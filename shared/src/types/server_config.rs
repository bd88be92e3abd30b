use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Upper bound for both session lifetimes.
pub const MAX_SESSION_DAYS: u64 = 3650;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request bodies above this size are rejected before routing.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:` for a throwaway database.
    #[serde(default = "default_database_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Lifetime of an ordinary browser session, counted from its last save.
    #[serde(default = "default_lifetime_minutes")]
    pub lifetime_minutes: u64,
    /// Lifetime of a "remembered" session (login with remember-me, and
    /// every impersonation switch).
    #[serde(default = "default_remember_days")]
    pub remember_days: u64,
    #[serde(default)]
    pub secure_cookie: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SurfacesConfig {
    #[serde(default = "default_admin_path")]
    pub admin_path: String,
    #[serde(default = "default_client_path")]
    pub client_path: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JobsConfig {
    /// Directory scanned for `.eml` files. Ingestion is disabled when unset.
    pub email_inbox: Option<String>,
    #[serde(default = "default_email_interval")]
    pub email_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub surfaces: SurfacesConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl ServerConfig {
    /// Full bind address, e.g. `"127.0.0.1:8080"`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl SessionConfig {
    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime_minutes.saturating_mul(60)
    }

    pub fn remember_secs(&self) -> u64 {
        self.remember_days.saturating_mul(SECS_PER_DAY)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            lifetime_minutes: default_lifetime_minutes(),
            remember_days: default_remember_days(),
            secure_cookie: false,
        }
    }
}

impl Default for SurfacesConfig {
    fn default() -> Self {
        Self {
            admin_path: default_admin_path(),
            client_path: default_client_path(),
            login_path: default_login_path(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            email_inbox: None,
            email_interval_secs: default_email_interval(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            session: SessionConfig::default(),
            surfaces: SurfacesConfig::default(),
            jobs: JobsConfig::default(),
        }
    }
}

pub fn default_bind() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    8080
}

pub fn default_max_body_bytes() -> usize {
    64 * 1024
}

pub fn default_database_path() -> String {
    "crm.sqlite3".to_string()
}

pub fn default_cookie_name() -> String {
    "crm_session".to_string()
}

pub fn default_lifetime_minutes() -> u64 {
    120
}

pub fn default_remember_days() -> u64 {
    30
}

pub fn default_admin_path() -> String {
    "/admin".to_string()
}

pub fn default_client_path() -> String {
    "/client".to_string()
}

pub fn default_login_path() -> String {
    "/login".to_string()
}

pub fn default_email_interval() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.server.addr(), "127.0.0.1:8080");
        assert_eq!(cfg.session.cookie_name, "crm_session");
        assert_eq!(cfg.surfaces.client_path, "/client");
        assert!(cfg.jobs.email_inbox.is_none());
    }

    #[test]
    fn session_durations_convert_to_seconds() {
        let s = SessionConfig {
            lifetime_minutes: 2,
            remember_days: 1,
            ..SessionConfig::default()
        };
        assert_eq!(s.lifetime_secs(), 120);
        assert_eq!(s.remember_secs(), 86_400);
    }

    #[test]
    fn oversized_durations_saturate_instead_of_overflowing() {
        let s = SessionConfig {
            lifetime_minutes: u64::MAX,
            remember_days: 300_000_000_000_000,
            ..SessionConfig::default()
        };
        assert_eq!(s.lifetime_secs(), u64::MAX);
        assert_eq!(s.remember_secs(), u64::MAX);
    }
}

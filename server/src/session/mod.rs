//! Server-side browser sessions.
//!
//! A [`Session`] is a plain value: the id carried by the cookie, the
//! authenticated principal (if any), the "remembered" flag and a map of
//! named slots. Handlers receive it explicitly, mutate it, and persist it
//! through [`SessionStore`]. Nothing here is global.
//!
//! Concurrent requests on the same session id are not serialised: the last
//! `save` wins.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde_json::Value;
use shared::config::LiveConfig;
use sqlx::sqlite::SqlitePool;
use tracing::{debug, warn};

use crate::database::sessions::{self as db_sessions, SessionRecord};
use crate::database::utils::{generate_uuid_token, get_timestamp};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: String,
    principal_id: Option<i64>,
    remember: bool,
    slots: BTreeMap<String, Value>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh, empty, unauthenticated session with a new id.
    pub fn new() -> Self {
        Self {
            id: generate_uuid_token(),
            principal_id: None,
            remember: false,
            slots: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn principal_id(&self) -> Option<i64> {
        self.principal_id
    }

    pub fn is_remembered(&self) -> bool {
        self.remember
    }

    /// Set (or clear) the authenticated principal.
    pub fn set_principal(&mut self, principal_id: Option<i64>, remember: bool) {
        self.principal_id = principal_id;
        self.remember = principal_id.is_some() && remember;
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.slots.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Loose truthiness: `true`, non-zero numbers and non-empty strings other
    /// than `"0"`/`"false"` count as set.
    pub fn get_bool(&self, key: &str) -> bool {
        match self.slots.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            Some(Value::Null) | None => false,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.slots.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn put(&mut self, key: &str, value: impl Into<Value>) {
        self.slots.insert(key.to_string(), value.into());
    }

    pub fn forget(&mut self, key: &str) {
        self.slots.remove(key);
    }

    /// Remove every slot. The principal and id are left alone.
    pub fn flush(&mut self) {
        self.slots.clear();
    }

    /// Switch to a brand-new id and return the old one, which the caller is
    /// expected to destroy in the store.
    pub fn invalidate_id(&mut self) -> String {
        std::mem::replace(&mut self.id, generate_uuid_token())
    }

    pub fn slots(&self) -> &BTreeMap<String, Value> {
        &self.slots
    }

    fn from_record(record: SessionRecord) -> Self {
        let slots = serde_json::from_str::<BTreeMap<String, Value>>(&record.payload)
            .unwrap_or_else(|e| {
                warn!("Discarding unreadable session payload for {}: {}", record.id, e);
                BTreeMap::new()
            });

        Self {
            id: record.id,
            principal_id: record.principal_id,
            remember: record.remember,
            slots,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// SQLite-backed session persistence.
#[derive(Clone, Debug)]
pub struct SessionStore {
    pool: SqlitePool,
    config: LiveConfig,
}

impl SessionStore {
    pub fn new(pool: SqlitePool, config: LiveConfig) -> Self {
        Self { pool, config }
    }

    /// Load the session named by the cookie, or start a fresh one when the
    /// id is absent, unknown or expired.
    pub async fn load(&self, id: Option<&str>) -> Result<Session> {
        let Some(id) = id.filter(|id| !id.is_empty()) else {
            return Ok(Session::new());
        };

        let record = db_sessions::load_session(&self.pool, id, get_timestamp())
            .await
            .context("Failed to load session")?;

        match record {
            Some(record) => {
                debug!("Session loaded: {}", record.id);
                Ok(Session::from_record(record))
            }
            None => {
                debug!("Unknown or expired session id, starting a new session");
                Ok(Session::new())
            }
        }
    }

    /// Persist the session. Remembered sessions get the long lifetime.
    pub async fn save(&self, session: &Session) -> Result<()> {
        let ttl = {
            let cfg = self.config.read().await;
            if session.remember {
                cfg.session.remember_secs()
            } else {
                cfg.session.lifetime_secs()
            }
        };

        let ttl = i64::try_from(ttl).context("Session lifetime out of range")?;
        let now = get_timestamp();
        let record = SessionRecord {
            id: session.id.clone(),
            principal_id: session.principal_id,
            remember: session.remember,
            payload: serde_json::to_string(&session.slots)
                .context("Failed to serialize session slots")?,
            last_activity: now,
            expires_at: now.saturating_add(ttl),
        };

        db_sessions::upsert_session(&self.pool, &record)
            .await
            .context("Failed to save session")
    }

    /// Delete a stored session; its id can no longer be loaded.
    pub async fn destroy(&self, id: &str) -> Result<()> {
        db_sessions::delete_session(&self.pool, id)
            .await
            .context("Failed to destroy session")
    }

    /// Issue a new id for `session` and destroy the row stored under the old
    /// one (session-fixation defense).
    pub async fn regenerate(&self, session: &mut Session) -> Result<()> {
        let old_id = session.invalidate_id();
        debug!("Session id rotated");
        self.destroy(&old_id).await
    }

    /// Remove every expired row. Returns the number purged.
    pub async fn prune_expired(&self) -> Result<u64> {
        db_sessions::cleanup_expired_sessions(&self.pool, get_timestamp())
            .await
            .context("Failed to prune expired sessions")
    }

    pub async fn exists(&self, id: &str) -> Result<bool> {
        db_sessions::session_exists(&self.pool, id)
            .await
            .context("Failed to check session")
    }
}

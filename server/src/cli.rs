//! Command-line interface and the out-of-band provisioning commands.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use shared::types::Role;
use sqlx::sqlite::SqlitePool;
use tracing::info;

use crate::database::tokens::{self as db_tokens, NewApiToken};
use crate::database::users::{self as db_users, NewUser};
use crate::database::utils::{
    calculate_expiry, generate_api_token, hash_api_token, hash_password, is_valid_email,
};

#[derive(Parser, Debug)]
#[command(name = "crm-server")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Create a client (tenant)
    CreateClient {
        #[arg(long)]
        name: String,
    },

    /// Create a user account
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
        /// `admin` or `client`
        #[arg(long, default_value = "client")]
        role: Role,
        #[arg(long)]
        client_id: Option<i64>,
    },

    /// Issue an API token; the plaintext is printed once
    IssueToken {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        name: String,
        /// Lifetime in days; omit for a token that never expires
        #[arg(long)]
        days: Option<i64>,
    },
}

/// A freshly issued token. `secret` exists only here.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub id: i64,
    pub secret: String,
    pub expires_at: Option<i64>,
}

pub async fn create_client(pool: &SqlitePool, name: &str) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Client name must not be empty");
    }

    let id = db_users::create_client(pool, name)
        .await
        .context("Failed to create client")?;
    info!("Created client {} ({})", id, name);
    Ok(id)
}

pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    name: &str,
    password: &str,
    role: Role,
    client_id: Option<i64>,
) -> Result<i64> {
    let email = email.trim().to_ascii_lowercase();
    if !is_valid_email(&email) {
        bail!("Invalid email address: {}", email);
    }
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    if role == Role::Admin && client_id.is_some() {
        bail!("Administrators cannot belong to a client");
    }
    if let Some(id) = client_id {
        if db_users::get_client(pool, id).await?.is_none() {
            bail!("Client {} does not exist", id);
        }
    }

    let id = db_users::create_user(
        pool,
        NewUser {
            email: email.clone(),
            name: name.trim().to_string(),
            password_hash: hash_password(password)?,
            role,
            client_id,
        },
    )
    .await
    .with_context(|| format!("Failed to create user {}", email))?;

    info!("Created {} user {} ({})", role, id, email);
    Ok(id)
}

pub async fn issue_token(
    pool: &SqlitePool,
    user_id: i64,
    name: &str,
    days: Option<i64>,
) -> Result<IssuedToken> {
    if db_users::get_principal(pool, user_id).await?.is_none() {
        bail!("User {} does not exist", user_id);
    }
    if days.is_some_and(|d| d <= 0) {
        bail!("--days must be positive");
    }

    let secret = generate_api_token();
    let expires_at = days.map(|d| calculate_expiry(d * 24 * 60 * 60));

    let id = db_tokens::create_token(
        pool,
        NewApiToken {
            user_id,
            name: name.to_string(),
            token_hash: hash_api_token(&secret),
            expires_at,
        },
    )
    .await
    .context("Failed to store API token")?;

    info!("Issued API token {} for user {}", id, user_id);
    Ok(IssuedToken {
        id,
        secret,
        expires_at,
    })
}

use std::fs;
use tracing::{debug, error, info};

use crate::types::server_config::{AppConfig, ConfigError, MAX_SESSION_DAYS};

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    info!("Loading configuration from: {}", path);

    let contents = fs::read_to_string(path)?;
    debug!("Processing file: {}", path);

    if contents.trim().is_empty() {
        error!("Configuration file is empty");
        return Err(ConfigError::InvalidConfig("empty file".into()));
    }

    let config = parse_config(&contents)?;

    info!("Configuration loaded successfully");
    debug!("Config: {:?}", config);

    Ok(config)
}

/// Parse and validate a TOML document.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.database.path.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "database.path cannot be empty".into(),
        ));
    }

    if config.session.cookie_name.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "session.cookie_name cannot be empty".into(),
        ));
    }

    if config.session.lifetime_minutes == 0 {
        return Err(ConfigError::InvalidConfig(
            "session.lifetime_minutes must be greater than 0".into(),
        ));
    }

    if config.session.remember_days == 0 {
        return Err(ConfigError::InvalidConfig(
            "session.remember_days must be greater than 0".into(),
        ));
    }

    let max_minutes = MAX_SESSION_DAYS
        .checked_mul(24 * 60)
        .ok_or_else(|| ConfigError::InvalidConfig("session bound overflows".into()))?;

    if config.session.lifetime_minutes > max_minutes {
        return Err(ConfigError::InvalidConfig(format!(
            "session.lifetime_minutes must not exceed {}",
            max_minutes
        )));
    }

    if config.session.remember_days > MAX_SESSION_DAYS {
        return Err(ConfigError::InvalidConfig(format!(
            "session.remember_days must not exceed {}",
            MAX_SESSION_DAYS
        )));
    }

    if config.jobs.email_interval_secs == 0 {
        return Err(ConfigError::InvalidConfig(
            "jobs.email_interval_secs must be greater than 0".into(),
        ));
    }

    if config.server.max_body_bytes == 0 {
        return Err(ConfigError::InvalidConfig(
            "server.max_body_bytes must be greater than 0".into(),
        ));
    }

    for (name, path) in [
        ("surfaces.admin_path", &config.surfaces.admin_path),
        ("surfaces.client_path", &config.surfaces.client_path),
        ("surfaces.login_path", &config.surfaces.login_path),
    ] {
        if !path.starts_with('/') {
            return Err(ConfigError::InvalidConfig(format!(
                "{} must start with '/'",
                name
            )));
        }
    }

    Ok(())
}

use shared::types::server_config::AppConfig;
use shared::types::{Principal, Role};

use crate::AppState;
use crate::database::users::{self as db_users, NewUser};
use crate::database::utils::hash_password;

pub const PASSWORD: &str = "correct horse battery";

pub async fn test_state() -> AppState {
    let mut config = AppConfig::default();
    config.database.path = ":memory:".to_string();
    AppState::open(config).await.unwrap()
}

async fn seed(state: &AppState, email: &str, role: Role, client_id: Option<i64>) -> Principal {
    let id = db_users::create_user(
        &state.db,
        NewUser {
            email: email.to_string(),
            name: email.split('@').next().unwrap_or(email).to_string(),
            password_hash: hash_password(PASSWORD).unwrap(),
            role,
            client_id,
        },
    )
    .await
    .unwrap();

    db_users::get_principal(&state.db, id).await.unwrap().unwrap()
}

pub async fn seed_admin(state: &AppState) -> Principal {
    seed(state, "admin@example.com", Role::Admin, None).await
}

/// A client user. When `client_id` is given the tenant row is created with
/// that id first.
pub async fn seed_client_user(state: &AppState, client_id: Option<i64>) -> Principal {
    if let Some(id) = client_id {
        sqlx::query("INSERT OR IGNORE INTO clients (id, name, created_at) VALUES (?1, ?2, 0)")
            .bind(id)
            .bind(format!("Client {}", id))
            .execute(&state.db)
            .await
            .unwrap();
    }
    seed(state, "client@example.com", Role::Client, client_id).await
}

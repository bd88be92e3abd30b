use std::collections::HashMap;

use anyhow::{Context, Result};
use hyper::{StatusCode, header};
use shared::types::{LoginData, LoginError, LoginResponse, Principal, Role};
use tracing::{error, info, warn};

use crate::AppState;
use crate::auth;
use crate::database::users as db_users;
use crate::database::utils::verify_password;
use crate::handlers::http::utils::*;

/// Main login handler.
///
/// Accepts a form post or a JSON body. Browsers are redirected to the
/// surface matching their role; JSON callers get a `LoginResponse`.
pub async fn handle_login(req: HttpRequest, state: AppState) -> Result<HttpResponse> {
    info!("Processing login request");

    let wants_json = is_json_request(&req);

    let login_data = match parse_login(&req) {
        Ok(data) => data,
        Err(login_error) => {
            warn!("Login parsing failed: {}", login_error.to_code());
            return deliver_serialized_json(&login_error.to_response(), StatusCode::BAD_REQUEST);
        }
    };

    if let Err(login_error) = validate_login(&login_data) {
        warn!("Login validation failed: {}", login_error.to_code());
        return deliver_serialized_json(&login_error.to_response(), StatusCode::BAD_REQUEST);
    }

    let principal = match attempt_login(&login_data, &state).await {
        Ok(principal) => principal,
        Err(login_error) => {
            warn!("Login failed: {}", login_error.to_code());
            let status = match login_error {
                LoginError::DatabaseError | LoginError::InternalError => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                _ => StatusCode::UNAUTHORIZED,
            };
            return deliver_serialized_json(&login_error.to_response(), status);
        }
    };

    // Fresh id on every login so a pre-login cookie cannot be fixed.
    let mut session = request_session(&req, &state).await?;
    auth::logout(&mut session);
    state.sessions.regenerate(&mut session).await?;
    auth::login(&mut session, &principal, login_data.remember_me);
    state
        .sessions
        .save(&session)
        .await
        .context("Failed to save login session")?;

    let cookie = session_cookie(&req, &state, &session).await?;
    let redirect = {
        let cfg = state.config.read().await;
        match principal.role {
            Role::Admin => cfg.surfaces.admin_path.clone(),
            Role::Client => cfg.surfaces.client_path.clone(),
        }
    };

    info!(
        "User logged in successfully: {} (ID: {})",
        principal.email, principal.id
    );

    if !wants_json {
        return deliver_redirect_with_cookie(&redirect, Some(cookie));
    }

    let mut response = deliver_serialized_json(
        &LoginResponse::Success {
            user_id: principal.id,
            email: principal.email,
            message: "Login successful".to_string(),
            redirect,
        },
        StatusCode::OK,
    )?;
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

fn is_json_request(req: &HttpRequest) -> bool {
    get_header_value(req.headers(), "content-type")
        .is_some_and(|ct| ct.starts_with("application/json"))
        || accepts_content_type(req, "application/json")
}

/// Parse a JSON or urlencoded login body
fn parse_login(req: &HttpRequest) -> std::result::Result<LoginData, LoginError> {
    let is_json = get_header_value(req.headers(), "content-type")
        .is_some_and(|ct| ct.starts_with("application/json"));

    if is_json {
        return serde_json::from_slice::<LoginData>(req.body()).map_err(|e| {
            warn!("Malformed JSON login body: {}", e);
            LoginError::MissingField("email".to_string())
        });
    }

    let params = form_urlencoded::parse(req.body().as_ref())
        .into_owned()
        .collect::<HashMap<String, String>>();

    let email = params
        .get("email")
        .or_else(|| params.get("username"))
        .ok_or(LoginError::MissingField("email".to_string()))?
        .trim()
        .to_string();

    let password = params
        .get("password")
        .ok_or(LoginError::MissingField("password".to_string()))?
        .to_string();

    let remember_me = params
        .get("remember_me")
        .map(|v| v == "on" || v == "true" || v == "1")
        .unwrap_or(false);

    Ok(LoginData {
        email,
        password,
        remember_me,
    })
}

fn validate_login(data: &LoginData) -> std::result::Result<(), LoginError> {
    if data.email.trim().is_empty() {
        return Err(LoginError::MissingField("email".to_string()));
    }

    if data.password.is_empty() {
        return Err(LoginError::MissingField("password".to_string()));
    }

    Ok(())
}

async fn attempt_login(
    data: &LoginData,
    state: &AppState,
) -> std::result::Result<Principal, LoginError> {
    let email = data.email.trim();
    info!("Attempting login for user: {}", email);

    let user_auth = db_users::get_user_auth(&state.db, email)
        .await
        .map_err(|e| {
            error!("Database error getting user auth: {}", e);
            LoginError::DatabaseError
        })?
        .ok_or_else(|| {
            warn!("User not found: {}", email);
            LoginError::InvalidCredentials
        })?;

    let password_valid = verify_password(&user_auth.password_hash, &data.password).map_err(|e| {
        error!("Password verification error: {}", e);
        LoginError::InternalError
    })?;

    if !password_valid {
        warn!("Invalid password for user: {}", email);
        return Err(LoginError::InvalidCredentials);
    }

    if !user_auth.principal.is_active {
        warn!("Inactive user attempted login: {}", email);
        return Err(LoginError::AccountInactive);
    }

    Ok(user_auth.principal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::test_support::{PASSWORD, seed_admin, seed_client_user, test_state};

    fn form(body: &str) -> HttpRequest {
        hyper::Request::builder()
            .method("POST")
            .uri("/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Bytes::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn form_accepts_username_alias() {
        let data = parse_login(&form("username=a%40b.c&password=pw&remember_me=on")).unwrap();
        assert_eq!(data.email, "a@b.c");
        assert!(data.remember_me);
    }

    #[test]
    fn missing_password_is_reported() {
        let err = parse_login(&form("email=a%40b.c")).unwrap_err();
        assert_eq!(err.to_code(), "MISSING_FIELD");
    }

    #[tokio::test]
    async fn admin_form_login_redirects_to_admin_surface() {
        let state = test_state().await;
        seed_admin(&state).await;

        let body = format!("email=admin%40example.com&password={}", PASSWORD.replace(' ', "+"));
        let res = handle_login(form(&body), state).await.unwrap();

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[header::LOCATION], "/admin");
        assert!(res.headers().contains_key(header::SET_COOKIE));
    }

    #[tokio::test]
    async fn client_json_login_returns_redirect_hint() {
        let state = test_state().await;
        seed_client_user(&state, None).await;

        let req = hyper::Request::builder()
            .method("POST")
            .uri("/login")
            .header("content-type", "application/json")
            .body(Bytes::from(
                serde_json::json!({"email": "client@example.com", "password": PASSWORD})
                    .to_string(),
            ))
            .unwrap();
        let res = handle_login(req, state).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key(header::SET_COOKIE));
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let state = test_state().await;
        seed_admin(&state).await;

        let res = handle_login(form("email=admin%40example.com&password=nope"), state)
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}

use std::time::Duration;

use anyhow::{Context, Result};
use http::HeaderValue;
use hyper::Request;

use super::headers::{
    create_persistent_cookie, create_session_cookie, delete_cookie, get_cookie, is_https,
};
use crate::AppState;
use crate::session::Session;

/// Build the `Set-Cookie` value carrying `session`'s id.
///
/// Remembered sessions get a persistent cookie; everything else lives until
/// the browser closes.
pub async fn session_cookie<B>(
    req: &Request<B>,
    state: &AppState,
    session: &Session,
) -> Result<HeaderValue> {
    let (name, secure, remember_secs) = {
        let cfg = state.config.read().await;
        (
            cfg.session.cookie_name.clone(),
            cfg.session.secure_cookie || is_https(req),
            cfg.session.remember_secs(),
        )
    };

    if session.is_remembered() {
        create_persistent_cookie(
            &name,
            session.id(),
            Duration::from_secs(remember_secs),
            secure,
        )
    } else {
        create_session_cookie(&name, session.id(), secure)
    }
}

/// Expire the session cookie in the browser
pub async fn clear_session_cookie(state: &AppState) -> Result<HeaderValue> {
    let name = state.config.read().await.session.cookie_name.clone();
    delete_cookie(&name)
}

/// Load the session named by the request's cookie, or a fresh one.
pub async fn request_session<B>(req: &Request<B>, state: &AppState) -> Result<Session> {
    let name = state.config.read().await.session.cookie_name.clone();
    let id = get_cookie(req.headers(), &name);
    state
        .sessions
        .load(id.as_deref())
        .await
        .context("Failed to load request session")
}

use anyhow::{Context, Result};
use tracing::info;

use crate::AppState;
use crate::auth;
use crate::handlers::http::utils::*;
use crate::session::Session;

/// Full logout: the stored session is destroyed and the cookie expired.
pub async fn handle_logout(
    _req: HttpRequest,
    state: AppState,
    mut session: Session,
) -> Result<HttpResponse> {
    info!("User {:?} logged out", session.principal_id());

    auth::logout(&mut session);
    state
        .sessions
        .destroy(session.id())
        .await
        .context("Failed to destroy session on logout")?;

    let login_path = state.config.read().await.surfaces.login_path.clone();
    let cookie = clear_session_cookie(&state).await?;
    deliver_redirect_with_cookie(&login_path, Some(cookie))
}

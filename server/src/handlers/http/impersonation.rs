use anyhow::{Context, Result};
use hyper::StatusCode;
use shared::types::Principal;
use tracing::info;

use crate::AppState;
use crate::handlers::http::utils::*;
use crate::impersonation::controller::{self, ImpersonationError, LandingParams, RequestMeta};
use crate::impersonation::StopOutcome;
use crate::session::Session;

fn request_meta(req: &HttpRequest) -> RequestMeta {
    RequestMeta {
        ip: get_client_ip(req),
        user_agent: get_user_agent(req),
    }
}

fn deliver_impersonation_error(err: ImpersonationError) -> Result<HttpResponse> {
    match err {
        ImpersonationError::Store(e) => Err(e.context("Impersonation store failure")),
        err => deliver_error_json(err.code(), &err.to_string(), err.status()),
    }
}

/// POST /impersonate/:id
pub async fn handle_start(
    req: HttpRequest,
    state: AppState,
    mut session: Session,
    actor: Principal,
    target_id: i64,
) -> Result<HttpResponse> {
    let meta = request_meta(&req);

    if let Err(err) = controller::start(&state, &mut session, &actor, target_id, &meta).await {
        return deliver_impersonation_error(err);
    }

    let client_path = state.config.read().await.surfaces.client_path.clone();
    let cookie = session_cookie(&req, &state, &session).await?;
    deliver_redirect_with_cookie(&client_path, Some(cookie))
}

/// GET /impersonate-form/:id
///
/// A transitional page whose form posts straight to the start operation.
pub async fn handle_show_form(
    _req: HttpRequest,
    state: AppState,
    actor: Principal,
    target_id: i64,
) -> Result<HttpResponse> {
    let target = match controller::authorize(&state, &actor, target_id).await {
        Ok(target) => target,
        Err(err) => return deliver_impersonation_error(err),
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Impersonating {name}</title></head>
<body onload="document.forms[0].submit()">
  <p>Switching to {name} &lt;{email}&gt;&hellip;</p>
  <form method="post" action="/impersonate/{id}">
    <noscript><button type="submit">Continue</button></noscript>
  </form>
</body>
</html>"#,
        name = escape_html(&target.name),
        email = escape_html(&target.email),
        id = target.id,
    );

    deliver_html(html, StatusCode::OK)
}

/// GET /impersonate-landing
pub async fn handle_landing(
    req: HttpRequest,
    state: AppState,
    mut session: Session,
) -> Result<HttpResponse> {
    let params = LandingParams {
        impersonating: get_query_param(&req, "impersonating"),
        token: get_query_param(&req, "token"),
    };

    let landed = controller::landing(&state, &mut session, &params)
        .await
        .context("Landing failed")?;

    let surfaces = state.config.read().await.surfaces.clone();
    if landed {
        let cookie = session_cookie(&req, &state, &session).await?;
        deliver_redirect_with_cookie(&surfaces.client_path, Some(cookie))
    } else {
        deliver_redirect(&surfaces.admin_path)
    }
}

/// POST /stop-impersonating
pub async fn handle_stop(
    req: HttpRequest,
    state: AppState,
    mut session: Session,
) -> Result<HttpResponse> {
    let meta = request_meta(&req);
    let outcome = controller::stop(&state, &mut session, &meta).await?;
    let surfaces = state.config.read().await.surfaces.clone();

    match outcome {
        StopOutcome::NotImpersonating => deliver_redirect(&surfaces.admin_path),
        StopOutcome::Restored(admin) => {
            info!("Redirecting admin {} back to {}", admin.id, surfaces.admin_path);
            let cookie = session_cookie(&req, &state, &session).await?;
            deliver_redirect_with_cookie(&surfaces.admin_path, Some(cookie))
        }
        StopOutcome::LoggedOut => {
            let cookie = clear_session_cookie(&state).await?;
            deliver_redirect_with_cookie(&surfaces.login_path, Some(cookie))
        }
    }
}

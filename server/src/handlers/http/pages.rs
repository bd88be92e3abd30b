//! Minimal server-rendered pages for the two surfaces and the login form.

use anyhow::{Context, Result};
use hyper::StatusCode;
use shared::types::Principal;

use crate::AppState;
use crate::database::leads::{self as db_leads, LeadScope};
use crate::database::users as db_users;
use crate::handlers::http::utils::*;
use crate::impersonation::is_impersonating;
use crate::session::Session;

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
{body}
</body>
</html>"#,
        title = escape_html(title),
        body = body,
    )
}

/// GET /login
pub async fn handle_login_page(_req: HttpRequest, state: AppState) -> Result<HttpResponse> {
    let login_path = state.config.read().await.surfaces.login_path.clone();
    let body = format!(
        r#"<h1>Sign in</h1>
<form method="post" action="{action}">
  <label>Email <input type="email" name="email" required></label>
  <label>Password <input type="password" name="password" required></label>
  <label><input type="checkbox" name="remember_me"> Remember me</label>
  <button type="submit">Sign in</button>
</form>"#,
        action = escape_html(&login_path),
    );
    deliver_html(layout("Sign in", &body), StatusCode::OK)
}

/// GET /admin: the administrator landing page with the impersonation picker.
pub async fn handle_admin_home(
    _req: HttpRequest,
    state: AppState,
    _session: Session,
    principal: Principal,
) -> Result<HttpResponse> {
    if !principal.is_admin() {
        return deliver_error_json(
            "FORBIDDEN",
            "Insufficient privileges",
            StatusCode::FORBIDDEN,
        );
    }

    let clients = db_users::list_client_users(&state.db)
        .await
        .context("Failed to list client users")?;

    let rows: String = clients
        .iter()
        .map(|c| {
            format!(
                r#"  <li>{name} &lt;{email}&gt;{inactive} <a href="/impersonate-form/{id}">Impersonate</a></li>
"#,
                name = escape_html(&c.name),
                email = escape_html(&c.email),
                inactive = if c.is_active { "" } else { " (inactive)" },
                id = c.id,
            )
        })
        .collect();

    let body = format!(
        r#"<h1>Admin</h1>
<p>Signed in as {email}</p>
<h2>Client users</h2>
<ul>
{rows}</ul>
<form method="post" action="/logout"><button type="submit">Sign out</button></form>"#,
        email = escape_html(&principal.email),
        rows = rows,
    );
    deliver_html(layout("Admin", &body), StatusCode::OK)
}

/// GET /client: the client landing page. Shows a banner with a way back
/// while an administrator is impersonating.
pub async fn handle_client_home(
    _req: HttpRequest,
    state: AppState,
    session: Session,
    principal: Principal,
) -> Result<HttpResponse> {
    let impersonating = is_impersonating(&session);

    if principal.is_admin() && !impersonating {
        let admin_path = state.config.read().await.surfaces.admin_path.clone();
        return deliver_redirect(&admin_path);
    }

    let stats = db_leads::lead_stats(&state.db, LeadScope::Client(principal.client_id))
        .await
        .context("Failed to compute client lead stats")?;

    let banner = if impersonating {
        r#"<div class="impersonation-banner">
  <p>You are impersonating this user.</p>
  <form method="post" action="/stop-impersonating"><button type="submit">Stop impersonating</button></form>
</div>
"#
    } else {
        ""
    };

    let body = format!(
        r#"{banner}<h1>Welcome, {name}</h1>
<p>Leads: {total} total, {new} new, {qualified} qualified, {converted} converted</p>
<form method="post" action="/logout"><button type="submit">Sign out</button></form>"#,
        banner = banner,
        name = escape_html(&principal.name),
        total = stats.total,
        new = stats.new,
        qualified = stats.qualified,
        converted = stats.converted,
    );
    deliver_html(layout("Client", &body), StatusCode::OK)
}

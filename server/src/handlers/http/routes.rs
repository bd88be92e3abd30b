use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use hyper::{Method, StatusCode};
use serde_json::json;
use shared::types::Principal;
use tracing::{debug, warn};

use crate::AppState;
use crate::auth::{GateOutcome, TokenAuthError, authenticate_request};
use crate::handlers::http::utils::*;
use crate::handlers::http::{api, auth, impersonation, pages};
use crate::impersonation::{SurfaceDecision, authenticate_or_bypass, client_surface_guard};
use crate::session::Session;

// ---------------------------------------------------------------------------
// Handler type aliases
// ---------------------------------------------------------------------------
//
// Four security tiers:
//
//   RouteHandler:    no auth.  Receives (req, state).
//                     Use for: /health, /login.
//
//   SessionHandler:  cookie session through the impersonation-aware gate.
//                     Receives (req, state, session, principal).
//                     Use for: logout, impersonation, the admin surface.
//
//   Client tier:     SessionHandler behind the client-surface guard, which
//                     runs before the session gate.
//
//   TokenHandler:    API token.  Receives (req, state, principal).
//                     Use for: everything under /api.

type HandlerFuture = Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send>>;

type RouteHandler = Box<dyn Fn(HttpRequest, AppState) -> HandlerFuture + Send + Sync>;

type SessionHandler =
    Box<dyn Fn(HttpRequest, AppState, Session, Principal) -> HandlerFuture + Send + Sync>;

type TokenHandler = Box<dyn Fn(HttpRequest, AppState, Principal) -> HandlerFuture + Send + Sync>;

// ---------------------------------------------------------------------------
// RouteKind
// ---------------------------------------------------------------------------

enum RouteKind {
    /// No authentication check.
    Open(RouteHandler),

    /// Session auth: the standard gate, bypassed while impersonating.
    Session(SessionHandler),

    /// Client surface: client-surface guard, then session auth.
    Client(SessionHandler),

    /// API token auth.
    Token(TokenHandler),
}

struct Route {
    method: Method,
    path: String,
    kind: RouteKind,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes_count", &self.routes.len())
            .finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    fn push(mut self, method: Method, path: &str, kind: RouteKind) -> Self {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            kind,
        });
        self
    }

    // ── Open (no auth) ────────────────────────────────────────────────────────

    pub fn get<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(HttpRequest, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.push(
            Method::GET,
            path,
            RouteKind::Open(Box::new(move |req, state| Box::pin(handler(req, state)))),
        )
    }

    pub fn post<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(HttpRequest, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.push(
            Method::POST,
            path,
            RouteKind::Open(Box::new(move |req, state| Box::pin(handler(req, state)))),
        )
    }

    // ── Session auth ──────────────────────────────────────────────────────────
    //
    // The router loads the cookie session and runs the gate before the
    // handler is called. Handlers own the session from then on and must
    // save it themselves if they change it.

    pub fn get_session<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(HttpRequest, AppState, Session, Principal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.push(
            Method::GET,
            path,
            RouteKind::Session(Box::new(move |req, state, session, principal| {
                Box::pin(handler(req, state, session, principal))
            })),
        )
    }

    pub fn post_session<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(HttpRequest, AppState, Session, Principal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.push(
            Method::POST,
            path,
            RouteKind::Session(Box::new(move |req, state, session, principal| {
                Box::pin(handler(req, state, session, principal))
            })),
        )
    }

    // ── Client surface ────────────────────────────────────────────────────────

    pub fn get_client<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(HttpRequest, AppState, Session, Principal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.push(
            Method::GET,
            path,
            RouteKind::Client(Box::new(move |req, state, session, principal| {
                Box::pin(handler(req, state, session, principal))
            })),
        )
    }

    // ── Token auth ────────────────────────────────────────────────────────────

    pub fn get_token<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(HttpRequest, AppState, Principal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.push(
            Method::GET,
            path,
            RouteKind::Token(Box::new(move |req, state, principal| {
                Box::pin(handler(req, state, principal))
            })),
        )
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    pub async fn route(&self, req: HttpRequest, state: AppState) -> Result<HttpResponse> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        for route in &self.routes {
            if route.method != method || !Self::path_matches(&route.path, &path) {
                continue;
            }

            return match &route.kind {
                RouteKind::Open(h) => h(req, state).await,

                RouteKind::Session(h) => {
                    let session = request_session(&req, &state).await?;
                    match authenticate_or_bypass(&state, &session).await? {
                        GateOutcome::Allow(principal) => h(req, state, session, principal).await,
                        GateOutcome::Redirect(to) => {
                            debug!("Session auth redirected {} {} to {}", method, path, to);
                            deliver_redirect(&to)
                        }
                    }
                }

                RouteKind::Client(h) => {
                    let session = request_session(&req, &state).await?;
                    if let SurfaceDecision::Redirect(to) =
                        client_surface_guard(&state, &session).await?
                    {
                        return deliver_redirect(&to);
                    }
                    match authenticate_or_bypass(&state, &session).await? {
                        GateOutcome::Allow(principal) => h(req, state, session, principal).await,
                        GateOutcome::Redirect(to) => deliver_redirect(&to),
                    }
                }

                RouteKind::Token(h) => match authenticate_request(&state, &req).await {
                    Ok(principal) => h(req, state, principal).await,
                    Err(TokenAuthError::Store(e)) => {
                        Err(e).context(format!("Token lookup failed for {} {}", method, path))
                    }
                    Err(reason) => {
                        warn!("Token auth rejected {} {}: {}", method, path, reason);
                        deliver_api_error(&reason.to_string(), reason.status())
                    }
                },
            };
        }

        deliver_error_json("NOT_FOUND", "Endpoint not found", StatusCode::NOT_FOUND)
            .context("Failed to deliver 404 response")
    }

    // ── Path matching ─────────────────────────────────────────────────────────

    pub fn path_matches(route_path: &str, request_path: &str) -> bool {
        let clean = request_path.split('?').next().unwrap_or(request_path);

        if route_path == clean {
            return true;
        }

        // Segment-by-segment matching for `:param` wildcards.
        // e.g.  "/impersonate/:id"  matches  "/impersonate/42"
        let route_segs: Vec<&str> = route_path.split('/').collect();
        let path_segs: Vec<&str> = clean.split('/').collect();

        if route_segs.len() != path_segs.len() {
            return false;
        }

        route_segs
            .iter()
            .zip(path_segs.iter())
            .all(|(r, p)| (r.starts_with(':') && !p.is_empty()) || r == p)
    }
}

/// The numeric id in segment `index` of the request path
/// (`/impersonate/42` → index 2).
pub fn path_id(req: &HttpRequest, index: usize) -> Option<i64> {
    req.uri()
        .path()
        .split('/')
        .nth(index)
        .and_then(|s| s.parse::<i64>().ok())
}

fn bad_id() -> Result<HttpResponse> {
    deliver_error_json("BAD_REQUEST", "Invalid user id", StatusCode::BAD_REQUEST)
        .context("Bad request")
}

// ---------------------------------------------------------------------------
// The application router
//
// Auth tier is enforced here at the routing level; handlers MUST NOT repeat
// the gate. Surface paths come from config at startup; a reload that moves
// them takes effect on restart.
// ---------------------------------------------------------------------------

pub fn build_router(admin_path: &str, client_path: &str, login_path: &str) -> Router {
    Router::new()
        // ── Open ─────────────────────────────────────────────────────────────
        .get("/health", |_req, _state| async move {
            deliver_serialized_json(&json!({"status": "success", "health": "ok"}), StatusCode::OK)
        })
        .get(login_path, |req, state| async move {
            pages::handle_login_page(req, state)
                .await
                .context("Login page failed")
        })
        .post(login_path, |req, state| async move {
            auth::handle_login(req, state).await.context("Login failed")
        })
        // ── Session ──────────────────────────────────────────────────────────
        .post_session("/logout", |req, state, session, _principal| async move {
            auth::handle_logout(req, state, session)
                .await
                .context("Logout failed")
        })
        .get_session(admin_path, |req, state, session, principal| async move {
            pages::handle_admin_home(req, state, session, principal)
                .await
                .context("Admin home failed")
        })
        .get_session(
            "/impersonate-landing",
            |req, state, session, _principal| async move {
                impersonation::handle_landing(req, state, session)
                    .await
                    .context("Impersonation landing failed")
            },
        )
        .post_session(
            "/stop-impersonating",
            |req, state, session, _principal| async move {
                impersonation::handle_stop(req, state, session)
                    .await
                    .context("Stop impersonation failed")
            },
        )
        .get_session(
            "/impersonate-form/:id",
            |req, state, _session, principal| async move {
                match path_id(&req, 2) {
                    Some(id) => impersonation::handle_show_form(req, state, principal, id)
                        .await
                        .context("Impersonation form failed"),
                    None => bad_id(),
                }
            },
        )
        .post_session(
            "/impersonate/:id",
            |req, state, session, principal| async move {
                match path_id(&req, 2) {
                    Some(id) => impersonation::handle_start(req, state, session, principal, id)
                        .await
                        .context("Start impersonation failed"),
                    None => bad_id(),
                }
            },
        )
        // ── Client surface ───────────────────────────────────────────────────
        .get_client(client_path, |req, state, session, principal| async move {
            pages::handle_client_home(req, state, session, principal)
                .await
                .context("Client home failed")
        })
        // ── Token API ────────────────────────────────────────────────────────
        .get_token("/api/user", |req, state, principal| async move {
            api::handle_current_user(req, state, principal)
                .await
                .context("API user failed")
        })
        .get_token("/api/leads", |req, state, principal| async move {
            api::handle_list_leads(req, state, principal)
                .await
                .context("API leads failed")
        })
        .get_token("/api/leads/stats", |req, state, principal| async move {
            api::handle_lead_stats(req, state, principal)
                .await
                .context("API lead stats failed")
        })
        .get_token("/api/leads/:id", |req, state, principal| async move {
            match path_id(&req, 3) {
                Some(id) => api::handle_get_lead(req, state, principal, id)
                    .await
                    .context("API lead failed"),
                None => deliver_api_error("Lead not found", StatusCode::NOT_FOUND),
            }
        })
        .get_token("/api/clients", |req, state, principal| async move {
            api::handle_list_clients(req, state, principal)
                .await
                .context("API clients failed")
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn ok_handler(
        _req: HttpRequest,
        _state: AppState,
    ) -> impl Future<Output = Result<HttpResponse>> + Send {
        async move { deliver_html("ok", StatusCode::OK) }
    }

    #[test]
    fn exact_path_matches() {
        assert!(Router::path_matches("/api/leads", "/api/leads"));
    }

    #[test]
    fn different_paths_do_not_match() {
        assert!(!Router::path_matches("/api/leads", "/api/clients"));
    }

    #[test]
    fn trailing_slash_does_not_match_without_slash() {
        assert!(!Router::path_matches("/admin", "/admin/"));
    }

    #[test]
    fn wildcard_segment_matches_numeric_id() {
        assert!(Router::path_matches("/impersonate/:id", "/impersonate/42"));
    }

    #[test]
    fn wildcard_does_not_match_empty_segment() {
        assert!(!Router::path_matches("/impersonate/:id", "/impersonate/"));
    }

    #[test]
    fn wildcard_does_not_match_extra_segments() {
        assert!(!Router::path_matches("/api/leads/:id", "/api/leads/9/notes"));
    }

    #[test]
    fn query_string_stripped_before_match() {
        assert!(Router::path_matches("/api/leads", "/api/leads?limit=50"));
    }

    #[test]
    fn stats_route_also_matches_id_pattern() {
        // Registration order decides: /api/leads/stats is registered first.
        assert!(Router::path_matches("/api/leads/:id", "/api/leads/stats"));
        assert!(Router::path_matches("/api/leads/stats", "/api/leads/stats"));
    }

    #[test]
    fn path_id_parses_segment() {
        let req = hyper::Request::builder()
            .uri("/impersonate/17")
            .body(Bytes::new())
            .unwrap();
        assert_eq!(path_id(&req, 2), Some(17));

        let req = hyper::Request::builder()
            .uri("/impersonate/abc")
            .body(Bytes::new())
            .unwrap();
        assert_eq!(path_id(&req, 2), None);
    }

    #[test]
    fn builders_record_tiers() {
        let r = Router::new()
            .get("/a", ok_handler)
            .get_session("/b", |_req, _state, _session, _p| async move {
                deliver_html("ok", StatusCode::OK)
            })
            .get_client("/c", |_req, _state, _session, _p| async move {
                deliver_html("ok", StatusCode::OK)
            })
            .get_token("/d", |_req, _state, _p| async move {
                deliver_html("ok", StatusCode::OK)
            });

        assert_eq!(r.routes.len(), 4);
        assert!(matches!(r.routes[0].kind, RouteKind::Open(_)));
        assert!(matches!(r.routes[1].kind, RouteKind::Session(_)));
        assert!(matches!(r.routes[2].kind, RouteKind::Client(_)));
        assert!(matches!(r.routes[3].kind, RouteKind::Token(_)));
    }

    proptest::proptest! {
        #[test]
        fn any_path_matches_itself(path in "(/[a-z0-9_-]{1,8}){0,5}") {
            let path = if path.is_empty() { "/".to_string() } else { path };
            proptest::prop_assert!(Router::path_matches(&path, &path));
        }

        #[test]
        fn id_route_matches_any_number(id in 0i64..i64::MAX) {
            let path = format!("/impersonate/{}", id);
            proptest::prop_assert!(Router::path_matches("/impersonate/:id", &path));
        }
    }
}

//! Request gates that read the impersonation slots. Neither writes to the
//! session.

use anyhow::Result;
use tracing::{debug, warn};

use super::state::is_impersonating;
use crate::AppState;
use crate::auth::{self, GateOutcome, require_authenticated};
use crate::session::Session;

/// Outcome of the client-surface gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceDecision {
    Continue,
    Redirect(String),
}

/// Scope the client surface while impersonating.
///
/// An impersonating session must still resolve to a principal; a flag left
/// behind without one is treated as stale and sent to the admin surface.
/// Sessions that are not impersonating pass through untouched.
pub async fn client_surface_guard(state: &AppState, session: &Session) -> Result<SurfaceDecision> {
    if !is_impersonating(session) {
        return Ok(SurfaceDecision::Continue);
    }

    if auth::current_principal(state, session).await?.is_some() {
        Ok(SurfaceDecision::Continue)
    } else {
        warn!("Impersonation flag set without an authenticated principal");
        let admin_path = state.config.read().await.surfaces.admin_path.clone();
        Ok(SurfaceDecision::Redirect(admin_path))
    }
}

/// The standard authentication gate, skipped for impersonated sessions.
///
/// The impersonated principal is trusted as-is: the active-account check of
/// the standard gate is not applied to it.
pub async fn authenticate_or_bypass(state: &AppState, session: &Session) -> Result<GateOutcome> {
    if is_impersonating(session) {
        if let Some(principal) = auth::current_principal(state, session).await? {
            debug!("Impersonated session for user {} bypasses auth gate", principal.id);
            return Ok(GateOutcome::Allow(principal));
        }
    }

    require_authenticated(state, session).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::users as db_users;
    use crate::impersonation::state::{IMPERSONATOR_ID, IS_IMPERSONATING};
    use crate::test_support::{seed_admin, seed_client_user, test_state};

    #[tokio::test]
    async fn guard_a_passes_normal_sessions() {
        let state = test_state().await;
        let session = Session::new();
        assert_eq!(
            client_surface_guard(&state, &session).await.unwrap(),
            SurfaceDecision::Continue
        );
    }

    #[tokio::test]
    async fn guard_a_redirects_stale_flag_to_admin() {
        let state = test_state().await;
        let mut session = Session::new();
        session.put(IS_IMPERSONATING, true);
        session.put(IMPERSONATOR_ID, 1);

        assert_eq!(
            client_surface_guard(&state, &session).await.unwrap(),
            SurfaceDecision::Redirect("/admin".to_string())
        );
    }

    #[tokio::test]
    async fn guard_a_allows_impersonated_principal() {
        let state = test_state().await;
        let client = seed_client_user(&state, Some(42)).await;
        let mut session = Session::new();
        auth::login(&mut session, &client, true);
        session.put(IS_IMPERSONATING, true);
        session.put(IMPERSONATOR_ID, 1);

        assert_eq!(
            client_surface_guard(&state, &session).await.unwrap(),
            SurfaceDecision::Continue
        );
    }

    #[tokio::test]
    async fn guard_b_bypasses_inactive_check_while_impersonating() {
        let state = test_state().await;
        let admin = seed_admin(&state).await;
        let client = seed_client_user(&state, Some(42)).await;
        db_users::set_user_active(&state.db, client.id, false)
            .await
            .unwrap();

        let mut session = Session::new();
        auth::login(&mut session, &client, true);

        // Not impersonating: the standard gate rejects the inactive account.
        assert_eq!(
            authenticate_or_bypass(&state, &session).await.unwrap(),
            GateOutcome::Redirect("/login".to_string())
        );

        session.put(IS_IMPERSONATING, true);
        session.put(IMPERSONATOR_ID, admin.id);
        match authenticate_or_bypass(&state, &session).await.unwrap() {
            GateOutcome::Allow(p) => assert_eq!(p.id, client.id),
            other => panic!("expected bypass, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn guard_b_delegates_when_unauthenticated() {
        let state = test_state().await;
        let mut session = Session::new();
        session.put(IS_IMPERSONATING, true);

        assert_eq!(
            authenticate_or_bypass(&state, &session).await.unwrap(),
            GateOutcome::Redirect("/login".to_string())
        );
    }
}

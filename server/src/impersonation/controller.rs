//! Start, land, show and stop: the only operations that move a session
//! between `Normal` and `Impersonating`.

use anyhow::Context;
use hyper::StatusCode;
use shared::types::{ImpersonationAudit, ImpersonationEvent, Principal};
use thiserror::Error;
use tracing::{info, warn};

use super::state::{self as transition, ImpersonationState};
use crate::AppState;
use crate::auth;
use crate::database::audit as db_audit;
use crate::database::users as db_users;
use crate::session::Session;

#[derive(Debug, Error)]
pub enum ImpersonationError {
    #[error("Only administrators can impersonate users")]
    Forbidden,

    #[error("Only client users can be impersonated")]
    InvalidTarget,

    #[error("User not found")]
    TargetNotFound,

    #[error("Impersonation store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl ImpersonationError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InvalidTarget => StatusCode::BAD_REQUEST,
            Self::TargetNotFound => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidTarget => "INVALID_TARGET",
            Self::TargetNotFound => "NOT_FOUND",
            Self::Store(_) => "INTERNAL_ERROR",
        }
    }
}

/// Caller details recorded in the audit trail.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Query parameters accepted by the landing hook. Only their presence is
/// checked; the values are never verified.
#[derive(Debug, Clone, Default)]
pub struct LandingParams {
    pub impersonating: Option<String>,
    pub token: Option<String>,
}

/// What `stop` did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The session was not impersonating; nothing changed.
    NotImpersonating,
    /// The administrator is the current principal again.
    Restored(Principal),
    /// The recorded administrator is gone; the session was logged out.
    LoggedOut,
}

/// Check that `actor` may impersonate `target_id` and resolve the target.
///
/// Used by both the confirmation page and `start`; never touches the session.
pub async fn authorize(
    state: &AppState,
    actor: &Principal,
    target_id: i64,
) -> Result<Principal, ImpersonationError> {
    if !actor.is_admin() {
        warn!(
            "User {} ({}) attempted to impersonate user {}",
            actor.id, actor.role, target_id
        );
        return Err(ImpersonationError::Forbidden);
    }

    let target = db_users::get_principal(&state.db, target_id)
        .await
        .context("Failed to load impersonation target")?
        .ok_or(ImpersonationError::TargetNotFound)?;

    if !target.is_client() {
        warn!(
            "Admin {} attempted to impersonate non-client user {}",
            actor.id, target.id
        );
        return Err(ImpersonationError::InvalidTarget);
    }

    Ok(target)
}

/// `Normal → Impersonating`. The session is persisted before returning.
pub async fn start(
    state: &AppState,
    session: &mut Session,
    actor: &Principal,
    target_id: i64,
    meta: &RequestMeta,
) -> Result<Principal, ImpersonationError> {
    let target = authorize(state, actor, target_id).await?;

    record_audit(state, ImpersonationEvent::Start, actor, &target, meta).await;

    let old_id = transition::begin(session, actor.id, &target);
    state
        .sessions
        .destroy(&old_id)
        .await
        .context("Failed to destroy pre-impersonation session")?;
    state
        .sessions
        .save(session)
        .await
        .context("Failed to persist impersonation session")?;

    info!("Admin {} is now impersonating user {}", actor.id, target.id);
    Ok(target)
}

/// Re-assert the impersonation flag when arriving from an external link.
///
/// Returns `true` when the session is (still) impersonating and the caller
/// should continue to the client surface.
pub async fn landing(
    state: &AppState,
    session: &mut Session,
    params: &LandingParams,
) -> anyhow::Result<bool> {
    if params.impersonating.is_none() || params.token.is_none() {
        return Ok(false);
    }

    if !transition::resume(session) {
        warn!("Impersonation landing without a recorded administrator");
        return Ok(false);
    }

    state
        .sessions
        .save(session)
        .await
        .context("Failed to persist landing session")?;
    Ok(true)
}

/// `Impersonating → Normal`, or a forced logout when the administrator who
/// started the impersonation no longer exists.
pub async fn stop(
    state: &AppState,
    session: &mut Session,
    meta: &RequestMeta,
) -> anyhow::Result<StopOutcome> {
    let impersonator_id = match ImpersonationState::of(session) {
        ImpersonationState::Normal => return Ok(StopOutcome::NotImpersonating),
        ImpersonationState::Impersonating { impersonator_id } => impersonator_id,
    };

    let admin = match impersonator_id {
        Some(id) => db_users::get_principal(&state.db, id)
            .await
            .context("Failed to load impersonating administrator")?,
        None => None,
    };

    let Some(admin) = admin else {
        warn!(
            "Stale impersonation state (impersonator_id={:?}); forcing logout",
            impersonator_id
        );
        auth::logout(session);
        state.sessions.regenerate(session).await?;
        state.sessions.save(session).await?;
        return Ok(StopOutcome::LoggedOut);
    };

    match auth::current_principal(state, session).await? {
        Some(target) => {
            record_audit(state, ImpersonationEvent::Stop, &admin, &target, meta).await
        }
        None => warn!(
            "Impersonated user {:?} is gone; stop by admin {} not audited",
            session.principal_id(),
            admin.id
        ),
    }

    transition::end(session, &admin);
    state
        .sessions
        .save(session)
        .await
        .context("Failed to persist restored admin session")?;

    info!("Admin {} stopped impersonating", admin.id);
    Ok(StopOutcome::Restored(admin))
}

/// Write an audit row. Failures are logged and never block the transition.
async fn record_audit(
    state: &AppState,
    event: ImpersonationEvent,
    admin: &Principal,
    target: &Principal,
    meta: &RequestMeta,
) {
    let entry = ImpersonationAudit {
        event,
        admin_id: admin.id,
        admin_email: admin.email.clone(),
        target_id: target.id,
        target_email: target.email.clone(),
        target_client_id: target.client_id,
        ip_address: meta.ip.clone(),
        user_agent: meta.user_agent.clone(),
    };

    info!(target: "audit", "Impersonation {}", entry);

    if let Err(e) = db_audit::insert_impersonation_audit(&state.db, &entry).await {
        warn!("Failed to write impersonation audit ({}): {}", event, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::users::NewUser;
    use crate::test_support::{seed_admin, seed_client_user, test_state};
    use shared::types::Role;

    use super::super::state::{IMPERSONATOR_ID, IS_IMPERSONATING, invariant_holds};

    fn meta() -> RequestMeta {
        RequestMeta {
            ip: Some("127.0.0.1".to_string()),
            user_agent: Some("tests".to_string()),
        }
    }

    async fn logged_in(state: &AppState, principal: &Principal) -> Session {
        let mut session = Session::new();
        auth::login(&mut session, principal, false);
        session.put("csrf", "abc");
        state.sessions.save(&session).await.unwrap();
        session
    }

    #[tokio::test]
    async fn start_switches_to_target_and_rotates_session() {
        let state = test_state().await;
        let admin = seed_admin(&state).await;
        let client = seed_client_user(&state, Some(42)).await;
        let mut session = logged_in(&state, &admin).await;
        let old_id = session.id().to_string();

        let target = start(&state, &mut session, &admin, client.id, &meta())
            .await
            .unwrap();

        assert_eq!(target.id, client.id);
        assert_eq!(session.principal_id(), Some(client.id));
        assert_eq!(session.get_i64(IMPERSONATOR_ID), Some(admin.id));
        assert!(session.get_bool(IS_IMPERSONATING));
        assert!(session.is_remembered());
        assert!(!session.has("csrf"));
        assert!(invariant_holds(&session));
        assert!(!state.sessions.exists(&old_id).await.unwrap());

        let persisted = state.sessions.load(Some(session.id())).await.unwrap();
        assert_eq!(persisted, session);

        let audits = db_audit::count_impersonation_audit(&state.db, admin.id, "start")
            .await
            .unwrap();
        assert_eq!(audits, 1);
    }

    #[tokio::test]
    async fn non_admin_is_forbidden_and_session_untouched() {
        let state = test_state().await;
        let actor = seed_client_user(&state, Some(42)).await;
        let other = db_users::create_user(
            &state.db,
            NewUser {
                email: "other@example.com".to_string(),
                name: "Other".to_string(),
                password_hash: "x".to_string(),
                role: Role::Client,
                client_id: None,
            },
        )
        .await
        .unwrap();
        let mut session = logged_in(&state, &actor).await;
        let before = session.clone();

        let err = start(&state, &mut session, &actor, other, &meta())
            .await
            .unwrap_err();

        assert!(matches!(err, ImpersonationError::Forbidden));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(session, before);
    }

    #[tokio::test]
    async fn admin_target_is_invalid_and_session_untouched() {
        let state = test_state().await;
        let admin = seed_admin(&state).await;
        let mut session = logged_in(&state, &admin).await;
        let before = session.clone();

        let err = start(&state, &mut session, &admin, admin.id, &meta())
            .await
            .unwrap_err();

        assert!(matches!(err, ImpersonationError::InvalidTarget));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(session, before);
    }

    #[tokio::test]
    async fn missing_target_is_not_found() {
        let state = test_state().await;
        let admin = seed_admin(&state).await;
        let mut session = logged_in(&state, &admin).await;

        let err = start(&state, &mut session, &admin, 999, &meta())
            .await
            .unwrap_err();

        assert!(matches!(err, ImpersonationError::TargetNotFound));
        assert_eq!(session.principal_id(), Some(admin.id));
    }

    #[tokio::test]
    async fn stop_restores_admin() {
        let state = test_state().await;
        let admin = seed_admin(&state).await;
        let client = seed_client_user(&state, Some(42)).await;
        let mut session = logged_in(&state, &admin).await;
        start(&state, &mut session, &admin, client.id, &meta())
            .await
            .unwrap();

        let outcome = stop(&state, &mut session, &meta()).await.unwrap();

        assert_eq!(outcome, StopOutcome::Restored(admin.clone()));
        assert_eq!(session.principal_id(), Some(admin.id));
        assert!(!session.has(IS_IMPERSONATING));
        assert!(!session.has(IMPERSONATOR_ID));
        assert!(invariant_holds(&session));

        let audits = db_audit::count_impersonation_audit(&state.db, admin.id, "stop")
            .await
            .unwrap();
        assert_eq!(audits, 1);
    }

    #[tokio::test]
    async fn stop_with_deleted_admin_logs_out() {
        let state = test_state().await;
        let admin = seed_admin(&state).await;
        let client = seed_client_user(&state, Some(42)).await;
        let mut session = logged_in(&state, &admin).await;
        start(&state, &mut session, &admin, client.id, &meta())
            .await
            .unwrap();
        let impersonating_id = session.id().to_string();

        db_users::delete_user(&state.db, admin.id).await.unwrap();
        let outcome = stop(&state, &mut session, &meta()).await.unwrap();

        assert_eq!(outcome, StopOutcome::LoggedOut);
        assert_eq!(session.principal_id(), None);
        assert!(session.slots().is_empty());
        assert_ne!(session.id(), impersonating_id);
        assert!(!state.sessions.exists(&impersonating_id).await.unwrap());
    }

    #[tokio::test]
    async fn stop_when_not_impersonating_is_a_no_op() {
        let state = test_state().await;
        let admin = seed_admin(&state).await;
        let mut session = logged_in(&state, &admin).await;
        let before = session.clone();

        let outcome = stop(&state, &mut session, &meta()).await.unwrap();

        assert_eq!(outcome, StopOutcome::NotImpersonating);
        assert_eq!(session, before);
    }

    #[tokio::test]
    async fn landing_needs_both_params_and_recorded_admin() {
        let state = test_state().await;
        let both = LandingParams {
            impersonating: Some("1".to_string()),
            token: Some("anything".to_string()),
        };

        let mut session = Session::new();
        let partial = LandingParams {
            impersonating: Some("1".to_string()),
            token: None,
        };
        session.put(IMPERSONATOR_ID, 1);
        assert!(!landing(&state, &mut session, &partial).await.unwrap());
        assert!(!session.has(IS_IMPERSONATING));

        let mut fresh = Session::new();
        assert!(!landing(&state, &mut fresh, &both).await.unwrap());
        assert!(!fresh.has(IS_IMPERSONATING));

        assert!(landing(&state, &mut session, &both).await.unwrap());
        assert!(session.get_bool(IS_IMPERSONATING));
        assert!(state.sessions.exists(session.id()).await.unwrap());
    }
}

use anyhow::Result;
use shared::types::Principal;
use tracing::warn;

use crate::AppState;
use crate::auth::current_principal;
use crate::session::Session;

/// Result of an authentication gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Proceed with this principal as the current one.
    Allow(Principal),
    /// Stop and send the browser here.
    Redirect(String),
}

/// The standard "must be authenticated" gate: a resolvable principal whose
/// account is still active. Anything else is sent to the login page.
pub async fn require_authenticated(state: &AppState, session: &Session) -> Result<GateOutcome> {
    let login_path = state.config.read().await.surfaces.login_path.clone();

    match current_principal(state, session).await? {
        Some(principal) if principal.is_active => Ok(GateOutcome::Allow(principal)),
        Some(principal) => {
            warn!("Inactive account {} rejected by auth gate", principal.id);
            Ok(GateOutcome::Redirect(login_path))
        }
        None => Ok(GateOutcome::Redirect(login_path)),
    }
}

pub mod gate;
pub mod token;

use anyhow::{Context, Result};
use shared::types::Principal;
use tracing::{debug, warn};

use crate::AppState;
use crate::database::users as db_users;
use crate::session::Session;

pub use gate::{GateOutcome, require_authenticated};
pub use token::{TokenAuthError, authenticate_request};

/// Make `principal` the current principal of `session`.
pub fn login(session: &mut Session, principal: &Principal, remember: bool) {
    debug!("Session principal set to {}", principal.id);
    session.set_principal(Some(principal.id), remember);
}

/// Drop the principal and every slot.
pub fn logout(session: &mut Session) {
    session.set_principal(None, false);
    session.flush();
}

/// Resolve the session's principal. A principal id that no longer maps to a
/// user is treated as "not authenticated".
pub async fn current_principal(state: &AppState, session: &Session) -> Result<Option<Principal>> {
    let Some(user_id) = session.principal_id() else {
        return Ok(None);
    };

    let principal = db_users::get_principal(&state.db, user_id)
        .await
        .context("Failed to resolve session principal")?;

    if principal.is_none() {
        warn!("Session refers to missing user {}", user_id);
    }

    Ok(principal)
}

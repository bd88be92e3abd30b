//! The impersonation slots and the transitions between `Normal` and
//! `Impersonating`.
//!
//! Everything here is a pure function of a [`Session`] value; persistence
//! and auditing live in the controller.

use shared::types::Principal;

use crate::auth;
use crate::session::Session;

/// Session slot: truthy while an administrator is acting as a client.
pub const IS_IMPERSONATING: &str = "is_impersonating";

/// Session slot: id of the administrator who started the impersonation.
pub const IMPERSONATOR_ID: &str = "impersonator_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpersonationState {
    Normal,
    /// `impersonator_id` is `None` only for a corrupted session; callers
    /// treat that the same as a missing administrator.
    Impersonating { impersonator_id: Option<i64> },
}

impl ImpersonationState {
    pub fn of(session: &Session) -> Self {
        if session.get_bool(IS_IMPERSONATING) {
            ImpersonationState::Impersonating {
                impersonator_id: session.get_i64(IMPERSONATOR_ID),
            }
        } else {
            ImpersonationState::Normal
        }
    }

    pub fn is_impersonating(&self) -> bool {
        matches!(self, ImpersonationState::Impersonating { .. })
    }
}

pub fn is_impersonating(session: &Session) -> bool {
    ImpersonationState::of(session).is_impersonating()
}

/// `impersonator_id` is set exactly when `is_impersonating` is truthy.
pub fn invariant_holds(session: &Session) -> bool {
    let flagged = session.get_bool(IS_IMPERSONATING);
    let recorded = session.get_i64(IMPERSONATOR_ID).is_some();
    flagged == recorded
}

/// `Normal → Impersonating`.
///
/// Clears every slot, rotates the session id, logs the target in as a
/// remembered principal and records the administrator. Returns the old
/// session id so the caller can destroy it in the store.
pub fn begin(session: &mut Session, admin_id: i64, target: &Principal) -> String {
    session.flush();
    let old_id = session.invalidate_id();
    auth::login(session, target, true);
    session.put(IS_IMPERSONATING, true);
    session.put(IMPERSONATOR_ID, admin_id);
    old_id
}

/// Re-assert the flag after an external landing; only valid when the
/// administrator is already recorded server-side.
pub fn resume(session: &mut Session) -> bool {
    if session.get_i64(IMPERSONATOR_ID).is_some() {
        session.put(IS_IMPERSONATING, true);
        true
    } else {
        false
    }
}

/// `Impersonating → Normal`: drop both slots and log the administrator back in.
pub fn end(session: &mut Session, admin: &Principal) {
    session.forget(IS_IMPERSONATING);
    session.forget(IMPERSONATOR_ID);
    auth::login(session, admin, true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::types::Role;

    fn principal(id: i64, role: Role) -> Principal {
        Principal {
            id,
            email: format!("user{}@example.com", id),
            name: format!("User {}", id),
            role,
            client_id: (role == Role::Client).then_some(42),
            is_active: true,
        }
    }

    #[test]
    fn fresh_session_is_normal() {
        let s = Session::new();
        assert_eq!(ImpersonationState::of(&s), ImpersonationState::Normal);
        assert!(invariant_holds(&s));
    }

    #[test]
    fn begin_switches_principal_and_records_admin() {
        let mut s = Session::new();
        s.set_principal(Some(1), false);
        s.put("unrelated", "x");
        let before = s.id().to_string();

        let old = begin(&mut s, 1, &principal(2, Role::Client));

        assert_eq!(old, before);
        assert_ne!(s.id(), before);
        assert_eq!(s.principal_id(), Some(2));
        assert!(s.is_remembered());
        assert!(!s.has("unrelated"));
        assert_eq!(
            ImpersonationState::of(&s),
            ImpersonationState::Impersonating {
                impersonator_id: Some(1)
            }
        );
        assert!(invariant_holds(&s));
    }

    #[test]
    fn end_restores_admin_and_clears_slots() {
        let mut s = Session::new();
        begin(&mut s, 1, &principal(2, Role::Client));

        end(&mut s, &principal(1, Role::Admin));

        assert_eq!(s.principal_id(), Some(1));
        assert!(!s.has(IS_IMPERSONATING));
        assert!(!s.has(IMPERSONATOR_ID));
        assert!(!is_impersonating(&s));
        assert!(invariant_holds(&s));
    }

    #[test]
    fn resume_requires_recorded_admin() {
        let mut s = Session::new();
        assert!(!resume(&mut s));
        assert!(!s.has(IS_IMPERSONATING));

        s.put(IMPERSONATOR_ID, 1);
        assert!(resume(&mut s));
        assert!(is_impersonating(&s));
    }

    #[test]
    fn flag_without_admin_breaks_invariant() {
        let mut s = Session::new();
        s.put(IS_IMPERSONATING, true);
        assert!(!invariant_holds(&s));
        assert_eq!(
            ImpersonationState::of(&s),
            ImpersonationState::Impersonating {
                impersonator_id: None
            }
        );
    }
}

//! Administrator impersonation of client users.
//!
//! `state` holds the session slots and pure transitions, `controller` the
//! audited operations that persist them, and `guard` the request gates that
//! read them.

pub mod controller;
pub mod guard;
pub mod state;

pub use controller::{ImpersonationError, LandingParams, RequestMeta, StopOutcome};
pub use guard::{SurfaceDecision, authenticate_or_bypass, client_surface_guard};
pub use state::{IMPERSONATOR_ID, IS_IMPERSONATING, ImpersonationState, is_impersonating};

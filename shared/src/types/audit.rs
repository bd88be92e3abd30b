use std::fmt;

use serde::{Deserialize, Serialize};

/// Which end of an impersonation an audit row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpersonationEvent {
    Start,
    Stop,
}

impl ImpersonationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpersonationEvent::Start => "start",
            ImpersonationEvent::Stop => "stop",
        }
    }
}

impl fmt::Display for ImpersonationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the `impersonation_audit` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpersonationAudit {
    pub event: ImpersonationEvent,
    pub admin_id: i64,
    pub admin_email: String,
    pub target_id: i64,
    pub target_email: String,
    pub target_client_id: Option<i64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl fmt::Display for ImpersonationAudit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "event={}, admin={} <{}>, target={} <{}>, client_id={:?}, ip={:?}",
            self.event,
            self.admin_id,
            self.admin_email,
            self.target_id,
            self.target_email,
            self.target_client_id,
            self.ip_address
        )
    }
}

pub mod audit;
pub mod json_error;
pub mod leads;
pub mod login;
pub mod principal;
pub mod server_config;

pub use self::audit::{ImpersonationAudit, ImpersonationEvent};
pub use self::json_error::{ApiError, ErrorResponse};
pub use self::leads::{Client, Lead, LeadStats, LeadStatus, NewLead};
pub use self::login::{LoginData, LoginError, LoginResponse};
pub use self::principal::{Principal, Role};

//! Lead-reporting endpoints behind API token auth.
//!
//! Administrators see every lead and client; client users see only rows
//! belonging to their own tenant.

use anyhow::{Context, Result};
use hyper::StatusCode;
use serde_json::json;
use shared::types::{Client, LeadStatus, Principal};
use tracing::debug;

use crate::AppState;
use crate::database::leads::{self as db_leads, LeadFilter, LeadScope};
use crate::database::users as db_users;
use crate::handlers::http::utils::*;

pub const DEFAULT_LIMIT: i64 = 25;
pub const MAX_LIMIT: i64 = 100;

fn scope_for(principal: &Principal) -> LeadScope {
    if principal.is_admin() {
        LeadScope::All
    } else {
        LeadScope::Client(principal.client_id)
    }
}

/// Read `status`, `limit` and `offset` from the query string.
///
/// `limit` is clamped to `1..=MAX_LIMIT`; negative offsets become zero.
pub fn parse_filter(req: &HttpRequest) -> std::result::Result<LeadFilter, String> {
    let params = query_params(req);

    let status = match params.get("status").filter(|s| !s.is_empty()) {
        Some(s) => Some(s.parse::<LeadStatus>()?),
        None => None,
    };

    let limit = params
        .get("limit")
        .and_then(|l| l.parse::<i64>().ok())
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, MAX_LIMIT);

    let offset = params
        .get("offset")
        .and_then(|o| o.parse::<i64>().ok())
        .unwrap_or(0)
        .max(0);

    Ok(LeadFilter {
        status,
        limit,
        offset,
    })
}

/// GET /api/user
pub async fn handle_current_user(
    _req: HttpRequest,
    _state: AppState,
    principal: Principal,
) -> Result<HttpResponse> {
    deliver_success_json(Some(principal))
}

/// GET /api/leads
pub async fn handle_list_leads(
    req: HttpRequest,
    state: AppState,
    principal: Principal,
) -> Result<HttpResponse> {
    let filter = match parse_filter(&req) {
        Ok(filter) => filter,
        Err(reason) => return deliver_api_error(&reason, StatusCode::BAD_REQUEST),
    };

    let leads = db_leads::list_leads(&state.db, scope_for(&principal), &filter)
        .await
        .context("Failed to list leads")?;

    debug!("Returning {} leads to user {}", leads.len(), principal.id);

    deliver_success_json(Some(json!({
        "leads": leads,
        "limit": filter.limit,
        "offset": filter.offset,
    })))
}

/// GET /api/leads/stats
pub async fn handle_lead_stats(
    _req: HttpRequest,
    state: AppState,
    principal: Principal,
) -> Result<HttpResponse> {
    let stats = db_leads::lead_stats(&state.db, scope_for(&principal))
        .await
        .context("Failed to compute lead stats")?;
    deliver_success_json(Some(stats))
}

/// GET /api/leads/:id
pub async fn handle_get_lead(
    _req: HttpRequest,
    state: AppState,
    principal: Principal,
    lead_id: i64,
) -> Result<HttpResponse> {
    match db_leads::get_lead(&state.db, scope_for(&principal), lead_id)
        .await
        .context("Failed to load lead")?
    {
        Some(lead) => deliver_success_json(Some(lead)),
        None => deliver_api_error("Lead not found", StatusCode::NOT_FOUND),
    }
}

/// GET /api/clients
pub async fn handle_list_clients(
    _req: HttpRequest,
    state: AppState,
    principal: Principal,
) -> Result<HttpResponse> {
    let clients: Vec<Client> = if principal.is_admin() {
        db_users::list_clients(&state.db)
            .await
            .context("Failed to list clients")?
    } else {
        match principal.client_id {
            Some(id) => db_users::get_client(&state.db, id)
                .await
                .context("Failed to load client")?
                .into_iter()
                .collect(),
            None => Vec::new(),
        }
    };

    deliver_success_json(Some(clients))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn req(uri: &str) -> HttpRequest {
        hyper::Request::builder().uri(uri).body(Bytes::new()).unwrap()
    }

    #[test]
    fn filter_defaults() {
        let f = parse_filter(&req("/api/leads")).unwrap();
        assert_eq!(f.status, None);
        assert_eq!(f.limit, DEFAULT_LIMIT);
        assert_eq!(f.offset, 0);
    }

    #[test]
    fn limit_is_capped_and_offset_floored() {
        let f = parse_filter(&req("/api/leads?limit=1000&offset=-5&status=qualified")).unwrap();
        assert_eq!(f.limit, MAX_LIMIT);
        assert_eq!(f.offset, 0);
        assert_eq!(f.status, Some(LeadStatus::Qualified));
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(parse_filter(&req("/api/leads?status=hot")).is_err());
    }
}

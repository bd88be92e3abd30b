use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use tracing::{error, info, warn};

use super::routes::Router;
use super::utils::*;
use crate::AppState;

/// Per-request entry point for the hyper service.
///
/// Collects the body (bounded by `server.max_body_bytes`), records the peer
/// address, dispatches through the router and turns any unhandled error into
/// an opaque 500.
pub async fn handle_request(
    req: Request<Incoming>,
    peer: SocketAddr,
    router: Arc<Router>,
    state: AppState,
) -> Result<HttpResponse, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let max_body = state.config.read().await.server.max_body_bytes;

    let (mut parts, body) = req.into_parts();
    let bytes = match Limited::new(body, max_body).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Rejected body for {} {} from {}: {}", method, path, peer, e);
            return Ok(fallback(
                deliver_error_json(
                    "PAYLOAD_TOO_LARGE",
                    "Request body too large or unreadable",
                    StatusCode::PAYLOAD_TOO_LARGE,
                ),
                StatusCode::PAYLOAD_TOO_LARGE,
            ));
        }
    };
    parts.extensions.insert(peer);
    let req = Request::from_parts(parts, bytes);

    let response = match router.route(req, state).await {
        Ok(response) => response,
        Err(e) => {
            error!("{} {} failed: {:#}", method, path, e);
            fallback(
                deliver_error_json(
                    "INTERNAL_ERROR",
                    "An internal error occurred",
                    StatusCode::INTERNAL_SERVER_ERROR,
                ),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    };

    info!("{} {} -> {}", method, path, response.status().as_u16());
    Ok(response)
}

fn fallback(response: anyhow::Result<HttpResponse>, status: StatusCode) -> HttpResponse {
    response.unwrap_or_else(|e| {
        error!("Failed to build error response: {}", e);
        let mut res = Response::new(full(status.canonical_reason().unwrap_or("Error")));
        *res.status_mut() = status;
        res
    })
}

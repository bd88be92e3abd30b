use std::convert::Infallible;

use anyhow::{Result, anyhow};
use bytes::Bytes;
use http::HeaderValue;
use http_body_util::{BodyExt, Empty, Full, combinators::BoxBody};
use hyper::{Response, StatusCode, header};
use tracing::{debug, error, info};

use super::HttpResponse;

/// Delivers a redirect response
pub fn deliver_redirect(location: &str) -> Result<HttpResponse> {
    deliver_redirect_with_cookie(location, None)
}

/// Delivers a redirect response, optionally setting a cookie on the way
pub fn deliver_redirect_with_cookie(
    location: &str,
    cookie: Option<HeaderValue>,
) -> Result<HttpResponse> {
    info!("Delivering redirect to: {}", location);

    let mut builder = Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location);

    if let Some(c) = cookie {
        builder = builder.header(header::SET_COOKIE, c);
    }
    let response = builder.body(empty()).map_err(|e: http::Error| {
        error!("Failed to build redirect response to {}: {}", location, e);
        anyhow!("Failed to build redirect response: {}", e)
    })?;

    Ok(response)
}

/// Delivers an in-memory HTML document with no-cache headers
pub fn deliver_html<T: Into<Bytes>>(html: T, status: StatusCode) -> Result<HttpResponse> {
    let bytes: Bytes = html.into();

    debug!("Delivering HTML response, size: {} bytes", bytes.len());

    let response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .header("x-content-type-options", "nosniff")
        .body(full(bytes))
        .map_err(|e: http::Error| {
            error!("Failed to build HTML response: {}", e);
            anyhow!("Failed to build HTML response: {}", e)
        })?;

    Ok(response)
}

/// Escape text for interpolation into HTML element content or attributes
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Helper function to create an empty body
pub fn empty() -> BoxBody<Bytes, Infallible> {
    Empty::<Bytes>::new().boxed()
}

/// Helper function to create a full body from various types
/// Made public for use in error handling
pub fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, Infallible> {
    let bytes: Bytes = chunk.into();
    let full_body: Full<Bytes> = Full::new(bytes);
    full_body.boxed()
}

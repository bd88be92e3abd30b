use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Result, anyhow};
use hyper::Request;
use hyper::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

/// Extract a header value as a string
pub fn get_header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(|s| {
        debug!("Retrieved header: {}", name);
        s.to_string()
    })
}

/// Extract cookie value by name
pub fn get_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all("cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookies| {
            cookies.split(';').find_map(|cookie| {
                let mut parts = cookie.trim().splitn(2, '=');
                let name = parts.next()?.trim();
                let value = parts.next()?.trim();
                if name == cookie_name {
                    debug!("Cookie found: {}", cookie_name);
                    Some(value.to_string())
                } else {
                    None
                }
            })
        })
        .or_else(|| {
            debug!("Cookie not found: {}", cookie_name);
            None
        })
}

/// Set a cookie with options
pub fn set_cookie(
    name: &str,
    value: &str,
    max_age: Option<Duration>,
    path: Option<&str>,
    http_only: bool,
    secure: bool,
) -> Result<HeaderValue> {
    let mut cookie = format!("{}={}", name, value);

    if let Some(age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", age.as_secs()));
    }

    if let Some(p) = path {
        cookie.push_str(&format!("; Path={}", p));
    }

    if http_only {
        cookie.push_str("; HttpOnly");
    }

    if secure {
        cookie.push_str("; Secure");
    }

    // Lax so the cookie survives the top-level redirect between surfaces
    cookie.push_str("; SameSite=Lax");

    debug!("Setting cookie: {}", name);

    HeaderValue::from_str(&cookie).map_err(|e| {
        warn!("Failed to create cookie header for {}: {}", name, e);
        anyhow!("Invalid cookie value: {}", e)
    })
}

/// Create a session cookie (expires when browser closes)
pub fn create_session_cookie(name: &str, value: &str, secure: bool) -> Result<HeaderValue> {
    debug!("Creating session cookie: {}", name);
    set_cookie(name, value, None, Some("/"), true, secure)
}

/// Create a persistent cookie with expiration
pub fn create_persistent_cookie(
    name: &str,
    value: &str,
    max_age: Duration,
    secure: bool,
) -> Result<HeaderValue> {
    debug!(
        "Creating persistent cookie: {} with max_age: {:?}",
        name, max_age
    );
    set_cookie(name, value, Some(max_age), Some("/"), true, secure)
}

/// Delete a cookie by setting it to expire
pub fn delete_cookie(name: &str) -> Result<HeaderValue> {
    debug!("Deleting cookie: {}", name);
    set_cookie(
        name,
        "",
        Some(Duration::from_secs(0)),
        Some("/"),
        true,
        false,
    )
}

/// Extract the client IP address from the request
pub fn get_client_ip<B>(req: &Request<B>) -> Option<String> {
    // Check X-Forwarded-For header first (for proxied requests)
    if let Some(forwarded) = get_header_value(req.headers(), "x-forwarded-for") {
        return forwarded.split(',').next().map(|s| s.trim().to_string());
    }

    // Check X-Real-IP header
    if let Some(real_ip) = get_header_value(req.headers(), "x-real-ip") {
        return Some(real_ip);
    }

    // Peer address stashed by the connection loop
    req.extensions()
        .get::<SocketAddr>()
        .map(|addr| addr.ip().to_string())
}

/// Whether the request reached us over TLS, directly or via a proxy that
/// sets `X-Forwarded-Proto` / `X-Forwarded-Ssl`.
pub fn is_https<B>(req: &Request<B>) -> bool {
    let proxied = get_header_value(req.headers(), "x-forwarded-proto")
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
        || get_header_value(req.headers(), "x-forwarded-ssl")
            .is_some_and(|ssl| ssl.eq_ignore_ascii_case("on"));

    proxied || req.uri().scheme_str() == Some("https")
}

/// Extract the user agent string
pub fn get_user_agent<B>(req: &Request<B>) -> Option<String> {
    get_header_value(req.headers(), "user-agent")
}

/// Check if the request accepts a specific content type
pub fn accepts_content_type<B>(req: &Request<B>, content_type: &str) -> bool {
    get_header_value(req.headers(), "accept")
        .map(|accept| accept.contains(content_type))
        .unwrap_or(false)
}

/// Extract bearer token from Authorization header
/// Format: "Authorization: Bearer <token>" (scheme is case-insensitive)
pub fn get_bearer_token<B>(req: &Request<B>) -> Option<String> {
    get_header_value(req.headers(), "authorization").and_then(|auth| {
        match auth.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => {
                debug!("Bearer token extracted");
                Some(token.to_string())
            }
            _ => {
                debug!("Authorization header is not a Bearer credential");
                None
            }
        }
    })
}

/// Decode the query string into a map. Later duplicates win.
pub fn query_params<B>(req: &Request<B>) -> HashMap<String, String> {
    req.uri()
        .query()
        .map(|q| {
            form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect::<HashMap<String, String>>()
        })
        .unwrap_or_default()
}

/// Look up a single query parameter
pub fn get_query_param<B>(req: &Request<B>, name: &str) -> Option<String> {
    req.uri().query().and_then(|q| {
        form_urlencoded::parse(q.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_lookup_finds_named_value() {
        let req = Request::builder()
            .header("cookie", "a=1; crm_session=abc; b=2")
            .body(())
            .unwrap();
        assert_eq!(get_cookie(req.headers(), "crm_session").as_deref(), Some("abc"));
        assert_eq!(get_cookie(req.headers(), "missing"), None);
    }

    #[test]
    fn persistent_cookie_carries_max_age() {
        let v = create_persistent_cookie("s", "v", Duration::from_secs(60), true).unwrap();
        let v = v.to_str().unwrap();
        assert!(v.starts_with("s=v"));
        assert!(v.contains("Max-Age=60"));
        assert!(v.contains("Secure"));
        assert!(v.contains("HttpOnly"));
    }

    #[test]
    fn session_cookie_has_no_max_age() {
        let v = create_session_cookie("s", "v", false).unwrap();
        assert!(!v.to_str().unwrap().contains("Max-Age"));
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let req = Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .body(())
            .unwrap();
        assert_eq!(get_client_ip(&req).as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn peer_address_is_the_fallback_ip() {
        let mut req = Request::builder().body(()).unwrap();
        req.extensions_mut()
            .insert::<SocketAddr>("192.168.1.9:5000".parse().unwrap());
        assert_eq!(get_client_ip(&req).as_deref(), Some("192.168.1.9"));
    }

    #[test]
    fn forwarded_proto_marks_https() {
        let req = Request::builder()
            .header("x-forwarded-proto", "HTTPS")
            .body(())
            .unwrap();
        assert!(is_https(&req));
        assert!(!is_https(&Request::builder().body(()).unwrap()));
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let req = Request::builder()
            .header("authorization", "bearer tok")
            .body(())
            .unwrap();
        assert_eq!(get_bearer_token(&req).as_deref(), Some("tok"));
    }

    #[test]
    fn query_params_are_percent_decoded() {
        let req = Request::builder()
            .uri("/x?name=a%20b&n=1")
            .body(())
            .unwrap();
        assert_eq!(get_query_param(&req, "name").as_deref(), Some("a b"));
        assert_eq!(query_params(&req).get("n").map(String::as_str), Some("1"));
    }
}

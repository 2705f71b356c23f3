//! The request gate: rate limiting, method filtering, and bearer-token
//! authentication, applied in that order before any route runs. CORS is
//! answered one layer further out by [`cors_layer`].
//!
//! Origin checks only decide whether a browser may *read* the response. They
//! are not an authorization mechanism; the bearer token is.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use subtle::ConstantTimeEq;
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::rate_limit::RateDecision;
use super::AppState;

/// Routes reachable without a session token.
pub const PUBLIC_ROUTES: &[&str] = &["/health", "/auth/token"];

const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "[::1]"];

/// The caller's transport address, attached to every request that passes the gate.
#[derive(Debug, Clone, Copy)]
pub struct ClientInfo {
    pub addr: Option<SocketAddr>,
}

impl ClientInfo {
    pub fn id(&self) -> Option<String> {
        self.addr.map(|a| a.ip().to_string())
    }

    /// Unknown addresses are treated as remote.
    pub fn is_loopback(&self) -> bool {
        self.addr.is_some_and(|a| a.ip().is_loopback())
    }
}

pub async fn gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    // Preflights never reach here; the CORS layer answers them.
    if request.method() == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }

    let client = ClientInfo {
        addr: request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr),
    };
    let rate_key = client
        .addr
        .map(|a| a.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if let RateDecision::Limited { retry_after } = state.rate_limiter.check(rate_key) {
        tracing::warn!(client = %rate_key, "rate limit exceeded");
        let secs = retry_after.as_secs().max(1);
        let mut response = error_response(
            StatusCode::TOO_MANY_REQUESTS,
            &format!("rate limit exceeded, retry in {secs}s"),
        );
        if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    if !matches!(*request.method(), Method::GET | Method::POST) {
        return error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    }

    let path = request.uri().path();
    if !PUBLIC_ROUTES.contains(&path) && !is_authorized(request.headers(), &state.token) {
        tracing::debug!(path, client = ?client.addr, "unauthenticated request rejected");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "unauthorized",
                "hint": "GET /auth/token from this machine, then send 'Authorization: Bearer <token>'",
            })),
        )
            .into_response();
    }

    request.extensions_mut().insert(client);
    next.run(request).await
}

fn is_authorized(headers: &HeaderMap, token: &str) -> bool {
    let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let Some((scheme, presented)) = value.split_once(' ') else {
        return false;
    };
    scheme.eq_ignore_ascii_case("bearer")
        && bool::from(presented.trim().as_bytes().ct_eq(token.as_bytes()))
}

/// CORS for browser callers: loopback origins plus the configured extras may
/// read responses. Sits outside [`gate`] so preflights need no token.
pub fn cors_layer(extra: Arc<[String]>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &axum::http::request::Parts| {
                origin_allowed(origin, &extra)
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(600))
}

fn origin_allowed(origin: &HeaderValue, extra: &[String]) -> bool {
    origin
        .to_str()
        .is_ok_and(|text| is_loopback_origin(text) || extra.iter().any(|o| o == text))
}

pub fn is_loopback_origin(origin: &str) -> bool {
    let Some(rest) = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
    else {
        return false;
    };
    LOOPBACK_HOSTS.iter().any(|host| match rest.strip_prefix(host) {
        Some("") => true,
        Some(port) => port
            .strip_prefix(':')
            .is_some_and(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit())),
        None => false,
    })
}

pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_origins() {
        assert!(is_loopback_origin("http://localhost"));
        assert!(is_loopback_origin("https://127.0.0.1:8443"));
        assert!(is_loopback_origin("http://[::1]:3000"));
        assert!(!is_loopback_origin("http://localhost.evil.com"));
        assert!(!is_loopback_origin("http://127.0.0.1:"));
        assert!(!is_loopback_origin("http://127.0.0.1:80x"));
        assert!(!is_loopback_origin("https://example.com"));
        assert!(!is_loopback_origin("null"));
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer s3cret"));
        assert!(is_authorized(&headers, "s3cret"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic s3cret"));
        assert!(!is_authorized(&headers, "s3cret"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer wrong"));
        assert!(!is_authorized(&headers, "s3cret"));
    }

    #[test]
    fn bearer_token_must_match_in_full() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer s3cre"));
        assert!(!is_authorized(&headers, "s3cret"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer s3cret2"));
        assert!(!is_authorized(&headers, "s3cret"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer  s3cret "));
        assert!(is_authorized(&headers, "s3cret"));
    }

    #[test]
    fn extra_origin_must_match_exactly() {
        let extra = vec!["app://obsidian.md".to_string()];
        assert!(origin_allowed(&HeaderValue::from_static("app://obsidian.md"), &extra));
        assert!(!origin_allowed(&HeaderValue::from_static("app://obsidian.md.evil"), &extra));
        assert!(origin_allowed(&HeaderValue::from_static("http://localhost:5173"), &extra));
    }
}

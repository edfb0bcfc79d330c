//! Client identification from request headers.
//!
//! The rate limiter keys on the client IP: the first `X-Forwarded-For` entry
//! when present (the service usually sits behind a load balancer), otherwise
//! the socket peer address.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Best-effort client IP for `req`, `"unknown"` if nothing identifies it.
pub fn client_ip<B>(req: &Request<B>) -> String {
    let forwarded = req
        .headers()
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_prefers_first_forwarded_entry() {
        let req = Request::builder()
            .header("X-Forwarded-For", " 203.0.113.7 , 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "203.0.113.7");
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        let addr: SocketAddr = "192.0.2.10:51000".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_ip(&req), "192.0.2.10");
    }

    #[test]
    fn test_blank_forwarded_header_is_ignored() {
        let req = Request::builder()
            .header("X-Forwarded-For", "  ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "unknown");
    }
}

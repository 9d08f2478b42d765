//! Security headers for HTTP responses
//!
//! Every response of this JSON API, errors included, goes out with the
//! same strict header set.

use warp::http::HeaderValue;
use warp::reply::Response;

/// Strict Content Security Policy for API endpoints
const STRICT_CSP: &str = "default-src 'none'; frame-ancestors 'none';";

const PERMISSIONS_POLICY: &str = "geolocation=(), microphone=(), camera=(), payment=(), usb=()";

/// Add API security headers to a response
pub fn add_security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.insert("Content-Security-Policy", HeaderValue::from_static(STRICT_CSP));
    // Responses carry tokens; keep them out of every cache
    headers.insert(
        "Cache-Control",
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert("Permissions-Policy", HeaderValue::from_static(PERMISSIONS_POLICY));
    headers.remove("Server");

    response
}

/// Wrap any reply with the API security headers
pub fn with_security_headers<T: warp::Reply>(reply: T) -> Response {
    add_security_headers(reply.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_csp_for_api() {
        assert!(STRICT_CSP.contains("default-src 'none'"));
        assert!(STRICT_CSP.contains("frame-ancestors 'none'"));
        assert!(!STRICT_CSP.contains("unsafe-inline"));
    }

    #[test]
    fn test_headers_are_applied() {
        let response = with_security_headers(warp::reply::json(&serde_json::json!({"ok": true})));
        let headers = response.headers();
        assert_eq!(headers["X-Content-Type-Options"], "nosniff");
        assert_eq!(headers["X-Frame-Options"], "DENY");
        assert!(headers["Cache-Control"].to_str().unwrap().contains("no-store"));
    }
}

//! Response hardening headers.
//!
//! Every response leaves locked down: no framing, no sniffing, no
//! third-party scripts, no powerful browser features. Pages are never cached
//! because they carry the visitor's cart and session state.

use axum::{
    extract::Request,
    http::{
        HeaderMap, HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

use super::csp::CspNonce;

/// Browser features nobody on the storefront needs.
const DENIED_FEATURES: &[&str] = &[
    "accelerometer",
    "autoplay",
    "browsing-topics",
    "camera",
    "display-capture",
    "geolocation",
    "gyroscope",
    "hid",
    "interest-cohort",
    "magnetometer",
    "microphone",
    "midi",
    "payment",
    "serial",
    "usb",
    "xr-spatial-tracking",
];

/// CSP directives after `default-src` and `script-src`. Product images are
/// hosted wherever the backend points, hence `https:` for `img-src`.
const POLICY_TAIL: &[&str] = &[
    "style-src 'self'",
    "font-src 'self'",
    "img-src 'self' https: data:",
    "connect-src 'self'",
    "frame-src 'none'",
    "object-src 'none'",
    "base-uri 'self'",
    "form-action 'self'",
    "frame-ancestors 'none'",
];

/// Fixed headers set on every response.
fn static_headers(headers: &mut HeaderMap) {
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("same-origin"));
    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );
    // Image hosts do not send CORP headers.
    headers.insert(
        HeaderName::from_static("cross-origin-embedder-policy"),
        HeaderValue::from_static("credentialless"),
    );
}

/// Stamp the hardening headers on the response, with a `script-src` that
/// admits only inline scripts carrying this request's [`CspNonce`].
///
/// A handler that already chose a `Cache-Control` keeps it.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let nonce = request.extensions().get::<CspNonce>().cloned();
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    static_headers(headers);

    if let Ok(value) = HeaderValue::from_str(&content_security_policy(nonce.as_ref())) {
        headers.insert(CONTENT_SECURITY_POLICY, value);
    }
    if let Ok(value) = HeaderValue::from_str(&permissions_policy()) {
        headers.insert(HeaderName::from_static("permissions-policy"), value);
    }
    headers
        .entry(CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("no-store, max-age=0"));

    response
}

fn permissions_policy() -> String {
    DENIED_FEATURES
        .iter()
        .map(|feature| format!("{feature}=()"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn content_security_policy(nonce: Option<&CspNonce>) -> String {
    let script_src = match nonce {
        Some(nonce) => format!("script-src 'self' 'nonce-{}'", nonce.value()),
        None => "script-src 'self'".to_owned(),
    };
    let mut directives = vec!["default-src 'none'".to_owned(), script_src];
    directives.extend(POLICY_TAIL.iter().map(|d| (*d).to_owned()));
    directives.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_carries_the_nonce() {
        let policy = content_security_policy(Some(&CspNonce("abc123".into())));
        assert!(policy.contains("script-src 'self' 'nonce-abc123';"));
        assert!(policy.starts_with("default-src 'none';"));

        let policy = content_security_policy(None);
        assert!(policy.contains("script-src 'self';"));
        assert!(policy.ends_with("frame-ancestors 'none'"));
    }

    #[test]
    fn permissions_policy_denies_each_feature() {
        let policy = permissions_policy();
        assert!(policy.starts_with("accelerometer=(), autoplay=()"));
        assert!(policy.contains("payment=()"));
        assert!(!policy.ends_with(", "));
    }
}

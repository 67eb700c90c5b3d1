//! Per-request script nonces.
//!
//! The layout stamps the nonce on its inline `<script>` tags and
//! [`super::security_headers_middleware`] repeats it in `script-src`, so an
//! injected script without the nonce is refused by the browser.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

/// Bytes of randomness behind each nonce.
const NONCE_BYTES: usize = 16;

/// Base64 nonce placed on inline scripts for one response.
#[derive(Clone, Debug)]
pub struct CspNonce(pub String);

impl CspNonce {
    #[must_use]
    pub fn generate() -> Self {
        let mut raw = [0u8; NONCE_BYTES];
        rand::rng().fill_bytes(&mut raw);
        Self(STANDARD.encode(raw))
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

/// Attach a fresh [`CspNonce`] to the request. Layered outside the security
/// headers middleware, which reads it back when building the policy.
pub async fn csp_nonce_middleware(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(CspNonce::generate());
    next.run(request).await
}

impl<S: Send + Sync> FromRequestParts<S> for CspNonce {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(nonce) = parts.extensions.get::<Self>() {
            return Ok(nonce.clone());
        }
        tracing::warn!("no CSP nonce on request; inline scripts on this page will be blocked");
        Ok(Self::generate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonces_are_unique_and_base64() {
        let a = CspNonce::generate();
        let b = CspNonce::generate();
        assert_ne!(a.value(), b.value());
        assert_eq!(STANDARD.decode(a.value()).map(|v| v.len()).ok(), Some(NONCE_BYTES));
    }
}

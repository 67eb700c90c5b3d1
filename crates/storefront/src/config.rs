//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `BACKEND_API_URL` - Base URL of the commerce REST backend (e.g. `http://localhost:8080/api`)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `BACKEND_TIMEOUT_SECS` - Per-request timeout for backend calls (default: 15)
//! - `STOREFRONT_DEGRADED_MODE` - `off` or `demo` (default: off)
//! - `STOREFRONT_CURRENCY` - `VND` or `USD` (default: VND)
//! - `CATALOG_CACHE_TTL_SECS` - Catalog cache lifetime, 0 disables (default: 60)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use shopfront_core::Currency;
use thiserror::Error;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Fragments that give away a copied template value; matched case-insensitively.
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// What the backend client does when a catalog read fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegradedMode {
    /// Failures propagate to the page.
    #[default]
    Off,
    /// Catalog reads fall back to the bundled demo catalog.
    Demo,
}

impl std::str::FromStr for DegradedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "" => Ok(Self::Off),
            "demo" => Ok(Self::Demo),
            other => Err(format!("expected 'off' or 'demo', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Public URL visitors reach the storefront at
    pub base_url: String,
    pub session_secret: SecretString,
    pub backend: BackendConfig,
    /// Currency prices are rendered in
    pub currency: Currency,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Commerce REST backend configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL every endpoint path is appended to
    pub base_url: Url,
    /// Per-request timeout
    pub timeout: Duration,
    /// Fallback policy for catalog reads
    pub degraded_mode: DegradedMode,
    /// Catalog cache TTL; zero disables the cache
    pub catalog_cache_ttl: Duration,
}

impl StorefrontConfig {
    /// Read the process environment, after merging in `.env` if one exists.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] for a missing or unparsable variable, or a session
    /// secret that is short, a placeholder, or low in entropy.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env is fine.
        let _ = dotenvy::dotenv();

        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = required("STOREFRONT_BASE_URL")?;
        let session_secret = secret_from_env("STOREFRONT_SESSION_SECRET")?;

        let backend = BackendConfig::from_env()?;
        let currency = parse_env("STOREFRONT_CURRENCY", "VND")?;

        Ok(Self {
            host,
            port,
            base_url,
            session_secret,
            backend,
            currency,
            sentry_dsn: optional("SENTRY_DSN"),
            sentry_environment: optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl BackendConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw = required("BACKEND_API_URL")?;
        let timeout_secs: u64 = parse_env("BACKEND_TIMEOUT_SECS", "15")?;
        let ttl_secs: u64 = parse_env("CATALOG_CACHE_TTL_SECS", "60")?;

        Ok(Self {
            base_url: parse_base_url(&raw)
                .map_err(|e| ConfigError::InvalidEnvVar("BACKEND_API_URL".to_string(), e))?,
            timeout: Duration::from_secs(timeout_secs),
            degraded_mode: parse_env("STOREFRONT_DEGRADED_MODE", "off")?,
            catalog_cache_ttl: Duration::from_secs(ttl_secs),
        })
    }

    /// Build a backend configuration for a given base URL with defaults for
    /// everything else.
    ///
    /// # Errors
    ///
    /// Returns an error message if the URL cannot be parsed or is not http(s).
    pub fn with_base_url(raw: &str) -> Result<Self, String> {
        Ok(Self {
            base_url: parse_base_url(raw)?,
            timeout: Duration::from_secs(15),
            degraded_mode: DegradedMode::Off,
            catalog_cache_ttl: Duration::from_secs(60),
        })
    }
}

/// Parse a backend base URL, normalizing it to end with `/` so relative
/// endpoint paths join under it instead of replacing its last segment.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Unset and blank are both treated as absent.
fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse `key` with `FromStr`, using `default` when it is unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Shannon entropy of `s`, in bits per character.
fn entropy_bits_per_char(s: &str) -> f64 {
    let mut counts: HashMap<char, u32> = HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_default() += 1;
    }
    let total: u32 = counts.values().sum();
    if total == 0 {
        return 0.0;
    }
    let total = f64::from(total);
    counts
        .values()
        .map(|&n| {
            let p = f64::from(n) / total;
            -p * p.log2()
        })
        .sum()
}

/// Reject secrets that are short, look like a template placeholder, or are
/// too repetitive to be random.
fn check_secret(key: &str, value: &str) -> Result<(), ConfigError> {
    let insecure = |reason: String| Err(ConfigError::InsecureSecret(key.to_string(), reason));

    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return insecure(format!(
            "must be at least {MIN_SESSION_SECRET_LENGTH} characters (got {})",
            value.len()
        ));
    }
    let lower = value.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return insecure(format!("appears to be a placeholder (contains '{pattern}')"));
    }
    let entropy = entropy_bits_per_char(value);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return insecure(format!(
            "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}); generate it randomly"
        ));
    }
    Ok(())
}

fn secret_from_env(key: &str) -> Result<SecretString, ConfigError> {
    let value = required(key)?;
    check_secret(key, &value)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn entropy_of_uniform_pairs() {
        assert!(entropy_bits_per_char("").abs() < f64::EPSILON);
        assert!((entropy_bits_per_char("ab") - 1.0).abs() < 0.01);
        assert!((entropy_bits_per_char("abcd") - 2.0).abs() < 0.01);
    }

    #[test]
    fn placeholder_secrets_are_rejected() {
        let err = check_secret("TEST_VAR", "changeme-aB3xY9mK2nL5pQ7rT0uW4zC6").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, ref why) if why.contains("changeme")));
    }

    #[test]
    fn repetitive_secrets_are_rejected() {
        assert!(check_secret("TEST_VAR", &"ab".repeat(20)).is_err());
    }

    #[test]
    fn short_secrets_are_rejected() {
        let err = check_secret("TEST_VAR", "short").unwrap_err();
        assert!(err.to_string().contains("at least 32"));
    }

    #[test]
    fn random_secret_is_accepted() {
        assert!(check_secret("TEST_VAR", "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%").is_ok());
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let url = parse_base_url("http://localhost:8080/api").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/");
        assert_eq!(
            url.join("products/7").unwrap().as_str(),
            "http://localhost:8080/api/products/7"
        );
    }

    #[test]
    fn base_url_rejects_other_schemes() {
        assert!(parse_base_url("ftp://example.org/api").is_err());
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn degraded_mode_parsing() {
        assert_eq!("demo".parse::<DegradedMode>(), Ok(DegradedMode::Demo));
        assert_eq!("OFF".parse::<DegradedMode>(), Ok(DegradedMode::Off));
        assert!("sometimes".parse::<DegradedMode>().is_err());
    }

    #[test]
    fn socket_addr_and_secure_flag() {
        let config = StorefrontConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "https://shop.test".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            backend: BackendConfig::with_base_url("http://localhost:8080/api").unwrap(),
            currency: Currency::Vnd,
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert!(config.is_secure());
    }
}

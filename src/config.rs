//! Server configuration module
//! Loads listen address, store location, signing keys and hashing costs
//! from the environment. The result is passed down explicitly; nothing
//! here is read again after startup.

use crate::auth::password::PasswordPolicy;
use crate::constants::{
    DEFAULT_ARGON2_ITERATIONS, DEFAULT_ARGON2_MEMORY_KIB, DEFAULT_ARGON2_PARALLELISM,
    DEFAULT_HOST, DEFAULT_PORT, DEFAULT_STORE_URL,
};
use crate::error::{ApiError, Result};
use std::env;
use std::path::Path;
use std::time::Duration;

/// PEM-encoded RSA keypair used by one token family
#[derive(Clone)]
pub struct KeyPairPem {
    pub private_pem: String,
    pub public_pem: String,
}

impl KeyPairPem {
    pub fn new(private_pem: impl Into<String>, public_pem: impl Into<String>) -> Self {
        Self {
            private_pem: private_pem.into(),
            public_pem: public_pem.into(),
        }
    }
}

// Key material must never end up in logs through a derived Debug.
impl std::fmt::Debug for KeyPairPem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPairPem")
            .field("private_pem", &"<redacted>")
            .field("public_pem_len", &self.public_pem.len())
            .finish()
    }
}

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Location of the document store (only `memory://` ships)
    pub store_url: String,
    /// Keypair signing and verifying access tokens
    pub access_keys: KeyPairPem,
    /// Keypair signing and verifying refresh tokens (must differ from `access_keys`)
    pub refresh_keys: KeyPairPem,
    /// Lifetime of refresh tokens; `None` issues refresh tokens without `exp`
    pub refresh_token_ttl: Option<Duration>,
    /// Argon2 cost parameters
    pub password_policy: PasswordPolicy,
    /// TLS configuration
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
    /// Enable TLS
    pub enable_tls: bool,
}

impl ServerConfig {
    /// Build a configuration around explicit keypairs, defaults everywhere else
    pub fn with_keys(access_keys: KeyPairPem, refresh_keys: KeyPairPem) -> Result<Self> {
        Self::validate_keypair(&access_keys, "Access token")?;
        Self::validate_keypair(&refresh_keys, "Refresh token")?;
        Self::validate_keypairs_are_different(&access_keys, &refresh_keys)?;

        Ok(Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            store_url: DEFAULT_STORE_URL.to_string(),
            access_keys,
            refresh_keys,
            refresh_token_ttl: None,
            password_policy: PasswordPolicy::default(),
            tls_cert_path: None,
            tls_key_path: None,
            enable_tls: false,
        })
    }

    /// Check the PEM armour of both halves of a keypair
    fn validate_keypair(keys: &KeyPairPem, key_type: &str) -> Result<()> {
        if !Self::looks_like_pem(&keys.private_pem, "PRIVATE KEY") {
            return Err(ApiError::Config(format!(
                "{} private key is not a PEM encoded RSA private key",
                key_type
            )));
        }
        if !Self::looks_like_pem(&keys.public_pem, "PUBLIC KEY") {
            return Err(ApiError::Config(format!(
                "{} public key is not a PEM encoded RSA public key",
                key_type
            )));
        }
        Ok(())
    }

    fn looks_like_pem(pem: &str, label: &str) -> bool {
        let trimmed = pem.trim();
        trimmed.starts_with("-----BEGIN")
            && trimmed.contains(&format!("{}-----", label))
            && trimmed.ends_with("-----")
    }

    /// Access and refresh tokens must be signed by separate keypairs
    fn validate_keypairs_are_different(access: &KeyPairPem, refresh: &KeyPairPem) -> Result<()> {
        if access.private_pem.trim() == refresh.private_pem.trim()
            || access.public_pem.trim() == refresh.public_pem.trim()
        {
            return Err(ApiError::Config(
                "Access and refresh tokens must use different keypairs. A shared key would let \
                 a refresh token pass as an access token."
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Read a key given inline under `names` or as a file under `<name>_PATH`.
    /// Inline values may carry literal `\n` escapes as produced by most `.env` tooling.
    fn read_key(names: &[&str]) -> Result<String> {
        for name in names {
            if let Ok(value) = env::var(name) {
                if !value.trim().is_empty() {
                    return Ok(value.replace("\\n", "\n"));
                }
            }
        }

        for name in names {
            let path_var = format!("{}_PATH", name);
            if let Ok(path) = env::var(&path_var) {
                return std::fs::read_to_string(&path).map_err(|e| {
                    ApiError::Config(format!("Cannot read key file {} ({}): {}", path, path_var, e))
                });
            }
        }

        Err(ApiError::Config(format!(
            "{} environment variable is required (inline PEM or {}_PATH). \
             Generate a keypair with: openssl genpkey -algorithm RSA -pkeyopt rsa_keygen_bits:2048",
            names.last().copied().unwrap_or_default(),
            names.last().copied().unwrap_or_default()
        )))
    }

    fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
        env::var(name).ok().and_then(|v| v.parse().ok())
    }

    fn flag_env(name: &str) -> bool {
        env::var(name)
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let host = env::var("PROJECTS_API_HOST").unwrap_or(DEFAULT_HOST.to_string());
        let port = Self::parse_env("PROJECTS_API_PORT")
            .or_else(|| Self::parse_env("PORT"))
            .unwrap_or(DEFAULT_PORT);

        let store_url = env::var("PROJECTS_API_STORE_URL").unwrap_or(DEFAULT_STORE_URL.to_string());
        if !store_url.starts_with("memory://") {
            return Err(ApiError::Config(format!(
                "Unsupported store URL '{}': only memory:// is available",
                store_url
            )));
        }

        let access_keys = KeyPairPem::new(
            Self::read_key(&["PROJECTS_API_ACCESS_PRIVATE_KEY", "PRIVATE_KEY"])?,
            Self::read_key(&["PROJECTS_API_ACCESS_PUBLIC_KEY", "PUBLIC_KEY"])?,
        );
        let refresh_keys = KeyPairPem::new(
            Self::read_key(&["PROJECTS_API_REFRESH_PRIVATE_KEY", "REFRESH_TOKEN_PRIVATE_KEY"])?,
            Self::read_key(&["PROJECTS_API_REFRESH_PUBLIC_KEY", "REFRESH_TOKEN_PUBLIC_KEY"])?,
        );

        let refresh_token_ttl = match env::var("PROJECTS_API_REFRESH_TOKEN_TTL_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    ApiError::Config(format!(
                        "PROJECTS_API_REFRESH_TOKEN_TTL_SECS must be a number of seconds, got '{}'",
                        raw
                    ))
                })?;
                if secs == 0 {
                    return Err(ApiError::Config(
                        "PROJECTS_API_REFRESH_TOKEN_TTL_SECS must be greater than zero".to_string(),
                    ));
                }
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        let password_policy = PasswordPolicy::new(
            Self::parse_env("PROJECTS_API_ARGON2_MEMORY_KIB").unwrap_or(DEFAULT_ARGON2_MEMORY_KIB),
            Self::parse_env("PROJECTS_API_ARGON2_ITERATIONS").unwrap_or(DEFAULT_ARGON2_ITERATIONS),
            Self::parse_env("PROJECTS_API_ARGON2_PARALLELISM").unwrap_or(DEFAULT_ARGON2_PARALLELISM),
        )?;

        // TLS configuration
        let enable_tls = Self::flag_env("PROJECTS_API_ENABLE_TLS");
        let tls_cert_path = env::var("PROJECTS_API_TLS_CERT_PATH").ok();
        let tls_key_path = env::var("PROJECTS_API_TLS_KEY_PATH").ok();

        if enable_tls {
            match (&tls_cert_path, &tls_key_path) {
                (Some(cert_path), Some(key_path)) => {
                    if !Path::new(cert_path).exists() {
                        return Err(ApiError::Config(format!(
                            "TLS certificate file does not exist: {}",
                            cert_path
                        )));
                    }
                    if !Path::new(key_path).exists() {
                        return Err(ApiError::Config(format!(
                            "TLS private key file does not exist: {}",
                            key_path
                        )));
                    }
                }
                _ => {
                    return Err(ApiError::Config(
                        "TLS is enabled but PROJECTS_API_TLS_CERT_PATH or PROJECTS_API_TLS_KEY_PATH is not set"
                            .to_string(),
                    ))
                }
            }
        }

        let mut config = Self::with_keys(access_keys, refresh_keys)?;
        config.host = host;
        config.port = port;
        config.store_url = store_url;
        config.refresh_token_ttl = refresh_token_ttl;
        config.password_policy = password_policy;
        config.enable_tls = enable_tls;
        config.tls_cert_path = tls_cert_path;
        config.tls_key_path = tls_key_path;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_PRIVATE: &str = include_str!("../tests/fixtures/access_private.pem");
    const ACCESS_PUBLIC: &str = include_str!("../tests/fixtures/access_public.pem");
    const REFRESH_PRIVATE: &str = include_str!("../tests/fixtures/refresh_private.pem");
    const REFRESH_PUBLIC: &str = include_str!("../tests/fixtures/refresh_public.pem");

    #[test]
    fn test_with_keys_accepts_distinct_keypairs() {
        let config = ServerConfig::with_keys(
            KeyPairPem::new(ACCESS_PRIVATE, ACCESS_PUBLIC),
            KeyPairPem::new(REFRESH_PRIVATE, REFRESH_PUBLIC),
        )
        .unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.refresh_token_ttl.is_none());
    }

    #[test]
    fn test_with_keys_rejects_shared_keypair() {
        let err = ServerConfig::with_keys(
            KeyPairPem::new(ACCESS_PRIVATE, ACCESS_PUBLIC),
            KeyPairPem::new(ACCESS_PRIVATE, ACCESS_PUBLIC),
        )
        .unwrap_err();
        assert!(err.to_string().contains("different keypairs"));
    }

    #[test]
    fn test_with_keys_rejects_swapped_halves() {
        let result = ServerConfig::with_keys(
            KeyPairPem::new(ACCESS_PUBLIC, ACCESS_PRIVATE),
            KeyPairPem::new(REFRESH_PRIVATE, REFRESH_PUBLIC),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let keys = KeyPairPem::new(ACCESS_PRIVATE, ACCESS_PUBLIC);
        let rendered = format!("{:?}", keys);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("BEGIN RSA PRIVATE KEY"));
    }
}

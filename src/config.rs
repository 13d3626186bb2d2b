// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults and the typed [`SecurityConfig`]
//! read from them once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` | PEM certificate chain; enables HTTPS with `TLS_KEY_PATH` | unset (plain HTTP) |
//! | `TLS_KEY_PATH` | PEM private key | unset |
//! | `SERVER_NAME` | Prefix of cookie names | `myBoot` |
//! | `COOKIE_SECURE` | Mark cookies `Secure` | `false` |
//! | `COOKIE_HTTP_ONLY` | Mark cookies `HttpOnly` | `true` |
//! | `LOGIN_URL` | Where unauthenticated requests are sent | `/admin/login.html` |
//! | `SUCCESS_URL` | Post-login target when no request was saved | `/admin/` |
//! | `UNAUTHORIZED_URL` | Where denied requests are sent | `/error.html` |
//! | `SESSION_TIMEOUT_MS` | Session idle timeout | `1800000` |
//! | `SESSION_VALIDATION_INTERVAL_SECS` | Expired-session sweep interval | `3600` |
//! | `SESSION_LIMIT` | Stored sessions before new ones are refused | `100000` |
//! | `AUTHC_CACHE_TTL_SECS` | Authentication cache TTL | `1800` |
//! | `AUTHZ_CACHE_TTL_SECS` | Authorization cache TTL | `300` |
//! | `AUTH_CACHE_CAPACITY` | Entries per cache region | `10000` |
//! | `REMEMBER_ME_CIPHER_KEY` | Base64 AES key (16, 24 or 32 bytes) | random per process |
//! | `FILTER_CHAIN_PATH` | Filter chain definitions file | built-in rules |
//! | `ACCOUNTS_PATH` | JSON accounts file for the credential store | no accounts |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const SERVER_NAME_ENV: &str = "SERVER_NAME";
pub const COOKIE_SECURE_ENV: &str = "COOKIE_SECURE";
pub const COOKIE_HTTP_ONLY_ENV: &str = "COOKIE_HTTP_ONLY";
pub const LOGIN_URL_ENV: &str = "LOGIN_URL";
pub const SUCCESS_URL_ENV: &str = "SUCCESS_URL";
pub const UNAUTHORIZED_URL_ENV: &str = "UNAUTHORIZED_URL";
pub const SESSION_TIMEOUT_MS_ENV: &str = "SESSION_TIMEOUT_MS";
pub const SESSION_VALIDATION_INTERVAL_ENV: &str = "SESSION_VALIDATION_INTERVAL_SECS";

/// Upper bound on stored sessions.
///
/// Every cookie-less request to a protected path starts a session to hold the
/// saved request, and those linger for the idle timeout plus up to one sweep
/// interval. The limit caps what such clients can accumulate.
pub const SESSION_LIMIT_ENV: &str = "SESSION_LIMIT";
pub const AUTHC_CACHE_TTL_ENV: &str = "AUTHC_CACHE_TTL_SECS";
pub const AUTHZ_CACHE_TTL_ENV: &str = "AUTHZ_CACHE_TTL_SECS";
pub const AUTH_CACHE_CAPACITY_ENV: &str = "AUTH_CACHE_CAPACITY";

/// Base64-encoded remember-me key.
///
/// When unset a random key is generated at startup, so remembered identities
/// do not survive a restart.
pub const REMEMBER_ME_CIPHER_KEY_ENV: &str = "REMEMBER_ME_CIPHER_KEY";

pub const FILTER_CHAIN_PATH_ENV: &str = "FILTER_CHAIN_PATH";
pub const ACCOUNTS_PATH_ENV: &str = "ACCOUNTS_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_SERVER_NAME: &str = "myBoot";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("TLS_CERT_PATH and TLS_KEY_PATH must be set together")]
    IncompleteTls,
}

/// Settings consumed once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsPaths>,
    pub server_name: String,
    pub cookie_secure: bool,
    pub cookie_http_only: bool,
    pub login_url: String,
    pub success_url: String,
    pub unauthorized_url: String,
    pub session_timeout: Duration,
    pub validation_interval: Duration,
    pub session_limit: usize,
    pub authc_cache_ttl: Duration,
    pub authz_cache_ttl: Duration,
    pub cache_capacity: usize,
    pub remember_me_key: Option<String>,
    pub filter_chain_path: Option<PathBuf>,
    pub accounts_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            tls: None,
            server_name: DEFAULT_SERVER_NAME.to_string(),
            cookie_secure: false,
            cookie_http_only: true,
            login_url: "/admin/login.html".to_string(),
            success_url: "/admin/".to_string(),
            unauthorized_url: "/error.html".to_string(),
            session_timeout: Duration::from_millis(1_800_000),
            validation_interval: Duration::from_secs(3600),
            session_limit: 100_000,
            authc_cache_ttl: Duration::from_secs(1800),
            authz_cache_ttl: Duration::from_secs(300),
            cache_capacity: 10_000,
            remember_me_key: None,
            filter_chain_path: None,
            accounts_path: None,
        }
    }
}

impl SecurityConfig {
    /// Read from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read through an arbitrary lookup. Unset and blank variables take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteTls),
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or(defaults.host),
            port: parse_or(get(PORT_ENV), PORT_ENV, defaults.port)?,
            tls,
            server_name: get(SERVER_NAME_ENV).unwrap_or(defaults.server_name),
            cookie_secure: parse_bool(get(COOKIE_SECURE_ENV), COOKIE_SECURE_ENV, defaults.cookie_secure)?,
            cookie_http_only: parse_bool(get(COOKIE_HTTP_ONLY_ENV), COOKIE_HTTP_ONLY_ENV, defaults.cookie_http_only)?,
            login_url: path_or(get(LOGIN_URL_ENV), LOGIN_URL_ENV, defaults.login_url)?,
            success_url: path_or(get(SUCCESS_URL_ENV), SUCCESS_URL_ENV, defaults.success_url)?,
            unauthorized_url: path_or(get(UNAUTHORIZED_URL_ENV), UNAUTHORIZED_URL_ENV, defaults.unauthorized_url)?,
            session_timeout: Duration::from_millis(positive(
                get(SESSION_TIMEOUT_MS_ENV),
                SESSION_TIMEOUT_MS_ENV,
                1_800_000,
            )?),
            validation_interval: Duration::from_secs(positive(
                get(SESSION_VALIDATION_INTERVAL_ENV),
                SESSION_VALIDATION_INTERVAL_ENV,
                3600,
            )?),
            session_limit: usize::try_from(positive(get(SESSION_LIMIT_ENV), SESSION_LIMIT_ENV, 100_000)?)
                .unwrap_or(usize::MAX),
            authc_cache_ttl: Duration::from_secs(positive(get(AUTHC_CACHE_TTL_ENV), AUTHC_CACHE_TTL_ENV, 1800)?),
            authz_cache_ttl: Duration::from_secs(positive(get(AUTHZ_CACHE_TTL_ENV), AUTHZ_CACHE_TTL_ENV, 300)?),
            cache_capacity: parse_or(get(AUTH_CACHE_CAPACITY_ENV), AUTH_CACHE_CAPACITY_ENV, defaults.cache_capacity)?,
            remember_me_key: get(REMEMBER_ME_CIPHER_KEY_ENV),
            filter_chain_path: get(FILTER_CHAIN_PATH_ENV).map(PathBuf::from),
            accounts_path: get(ACCOUNTS_PATH_ENV).map(PathBuf::from),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn positive(value: Option<String>, var: &'static str, default: u64) -> Result<u64, ConfigError> {
    let parsed = parse_or(value, var, default)?;
    if parsed == 0 {
        return Err(ConfigError::Invalid {
            var,
            value: "0".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(parsed)
}

fn parse_bool(value: Option<String>, var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            var,
            value: other.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Redirect targets must be absolute paths on this server.
fn path_or(value: Option<String>, var: &'static str, default: String) -> Result<String, ConfigError> {
    match value {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => Ok(path),
        Some(other) => Err(ConfigError::Invalid {
            var,
            value: other,
            reason: "must be an absolute path such as /admin/login.html".to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(pairs: &[(&str, &str)]) -> Result<SecurityConfig, ConfigError> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        SecurityConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = from_map(&[]).unwrap();
        assert_eq!(config, SecurityConfig::default());
        assert_eq!(config.server_name, "myBoot");
        assert!(config.cookie_http_only);
        assert!(!config.cookie_secure);
        assert_eq!(config.session_timeout, Duration::from_millis(1_800_000));
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn overrides_are_applied() {
        let config = from_map(&[
            (SERVER_NAME_ENV, "portal"),
            (COOKIE_SECURE_ENV, "TRUE"),
            (COOKIE_HTTP_ONLY_ENV, "0"),
            (SESSION_TIMEOUT_MS_ENV, "60000"),
            (LOGIN_URL_ENV, "/login"),
            (REMEMBER_ME_CIPHER_KEY_ENV, " s/29TncV2aWcOLrdESikaA== "),
            (FILTER_CHAIN_PATH_ENV, "/etc/gatekeeper/filters.conf"),
        ])
        .unwrap();
        assert_eq!(config.server_name, "portal");
        assert!(config.cookie_secure);
        assert!(!config.cookie_http_only);
        assert_eq!(config.session_timeout, Duration::from_secs(60));
        assert_eq!(config.login_url, "/login");
        assert_eq!(config.remember_me_key.as_deref(), Some("s/29TncV2aWcOLrdESikaA=="));
        assert_eq!(config.filter_chain_path, Some(PathBuf::from("/etc/gatekeeper/filters.conf")));
    }

    #[test]
    fn session_limit_is_positive() {
        assert_eq!(from_map(&[]).unwrap().session_limit, 100_000);
        assert_eq!(from_map(&[(SESSION_LIMIT_ENV, "500")]).unwrap().session_limit, 500);
        assert!(matches!(
            from_map(&[(SESSION_LIMIT_ENV, "0")]),
            Err(ConfigError::Invalid { var: SESSION_LIMIT_ENV, .. })
        ));
    }

    #[test]
    fn blank_values_take_defaults() {
        let config = from_map(&[(PORT_ENV, "  "), (REMEMBER_ME_CIPHER_KEY_ENV, "")]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.remember_me_key.is_none());
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            from_map(&[(PORT_ENV, "http")]),
            Err(ConfigError::Invalid { var: PORT_ENV, .. })
        ));
        assert!(matches!(
            from_map(&[(COOKIE_SECURE_ENV, "maybe")]),
            Err(ConfigError::Invalid { var: COOKIE_SECURE_ENV, .. })
        ));
        assert!(matches!(
            from_map(&[(SESSION_TIMEOUT_MS_ENV, "0")]),
            Err(ConfigError::Invalid { var: SESSION_TIMEOUT_MS_ENV, .. })
        ));
        assert!(matches!(
            from_map(&[(LOGIN_URL_ENV, "https://evil.example/login")]),
            Err(ConfigError::Invalid { var: LOGIN_URL_ENV, .. })
        ));
    }

    #[test]
    fn tls_paths_come_in_pairs() {
        assert_eq!(
            from_map(&[(TLS_CERT_PATH_ENV, "/tls/cert.pem")]),
            Err(ConfigError::IncompleteTls)
        );
        let config = from_map(&[(TLS_CERT_PATH_ENV, "/tls/cert.pem"), (TLS_KEY_PATH_ENV, "/tls/key.pem")]).unwrap();
        assert_eq!(config.tls.unwrap().key, PathBuf::from("/tls/key.pem"));
    }
}

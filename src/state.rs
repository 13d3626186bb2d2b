// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Application state and the startup routine that builds it.
//!
//! Components are constructed bottom-up and handed to each other explicitly:
//!
//! ```text
//! caches → realm → session store → session manager → remember-me codec
//!        → filter chain → security manager
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::cookies::SecurityCookies;
use crate::auth::credentials::{CredentialStore, InMemoryCredentialStore};
use crate::auth::manager::{SecurityManager, SecurityUrls};
use crate::auth::realm::Realm;
use crate::auth::remember_me::RememberMeCodec;
use crate::auth::session::{SessionManager, SessionManagerConfig};
use crate::config::SecurityConfig;
use crate::error::BootstrapError;
use crate::filter::{FilterChain, DEFAULT_FILTER_CHAIN};
use crate::models::{AuthenticationInfo, AuthorizationInfo};
use crate::storage::{InMemorySessionStore, TtlCache, AUTHENTICATION_CACHE, AUTHORIZATION_CACHE};

#[derive(Clone)]
pub struct AppState {
    pub security: Arc<SecurityManager>,
    pub filters: Arc<FilterChain>,
    pub cookies: Arc<SecurityCookies>,
}

impl AppState {
    /// Build every component from configuration.
    ///
    /// Credentials come from `ACCOUNTS_PATH` when set; otherwise the store
    /// starts empty and nobody can log in.
    pub fn bootstrap(config: &SecurityConfig) -> Result<Self, BootstrapError> {
        let credentials: Arc<dyn CredentialStore> = match &config.accounts_path {
            Some(path) => {
                let store = InMemoryCredentialStore::from_json_file(path)?;
                info!(path = %path.display(), "Loaded accounts file");
                Arc::new(store)
            }
            None => {
                warn!("ACCOUNTS_PATH not set, credential store is empty");
                Arc::new(InMemoryCredentialStore::new())
            }
        };
        Self::bootstrap_with_store(config, credentials)
    }

    /// Build every component around an externally supplied credential store.
    pub fn bootstrap_with_store(
        config: &SecurityConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, BootstrapError> {
        let authentication_cache = TtlCache::<AuthenticationInfo>::new(
            AUTHENTICATION_CACHE,
            config.cache_capacity,
            config.authc_cache_ttl,
        )?;
        let authorization_cache = TtlCache::<AuthorizationInfo>::new(
            AUTHORIZATION_CACHE,
            config.cache_capacity,
            config.authz_cache_ttl,
        )?;

        let realm = Realm::new(
            credentials,
            Arc::new(authentication_cache),
            Arc::new(authorization_cache),
        );

        let sessions = SessionManager::new(
            Arc::new(InMemorySessionStore::new()),
            SessionManagerConfig {
                idle_timeout: config.session_timeout,
                max_sessions: config.session_limit,
                ..Default::default()
            },
        );

        let remember_me = match &config.remember_me_key {
            Some(key) => RememberMeCodec::from_base64_key(key)?,
            None => {
                warn!("REMEMBER_ME_CIPHER_KEY not set, remembered identities will not survive a restart");
                RememberMeCodec::ephemeral()
            }
        };

        let filters = match &config.filter_chain_path {
            Some(path) => FilterChain::from_file(path)?,
            None => FilterChain::parse(DEFAULT_FILTER_CHAIN)?,
        };

        let security = SecurityManager::new(
            Arc::new(realm),
            Arc::new(sessions),
            Arc::new(remember_me),
            SecurityUrls {
                login_url: config.login_url.clone(),
                success_url: config.success_url.clone(),
                unauthorized_url: config.unauthorized_url.clone(),
            },
        );

        info!(
            rules = filters.len(),
            session_timeout_ms = config.session_timeout.as_millis() as u64,
            server_name = %config.server_name,
            "Security components initialized"
        );

        Ok(Self {
            security: Arc::new(security),
            filters: Arc::new(filters),
            cookies: Arc::new(SecurityCookies::new(
                &config.server_name,
                config.cookie_http_only,
                config.cookie_secure,
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::RoutingError;
    use crate::storage::CacheError;
    use std::io::Write;

    #[test]
    fn bootstrap_with_defaults() {
        let state = AppState::bootstrap(&SecurityConfig::default()).unwrap();
        assert_eq!(state.cookies.session.name, "myBoot_SHAREJSESSIONID");
        assert!(state.filters.resolve("/admin/index").is_some());
        assert_eq!(state.security.urls().login_url, "/admin/login.html");
    }

    #[test]
    fn zero_cache_capacity_is_fatal() {
        let config = SecurityConfig {
            cache_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            AppState::bootstrap(&config),
            Err(BootstrapError::Cache(CacheError::InvalidCapacity(_)))
        ));
    }

    #[test]
    fn bad_remember_me_key_is_fatal() {
        let config = SecurityConfig {
            remember_me_key: Some("c2hvcnQ=".into()),
            ..Default::default()
        };
        assert!(matches!(AppState::bootstrap(&config), Err(BootstrapError::RememberMeKey(_))));
    }

    #[test]
    fn duplicate_rule_file_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "/admin/sys/logout = logout\n/admin/sys/logout = anon").unwrap();
        let config = SecurityConfig {
            filter_chain_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(matches!(
            AppState::bootstrap(&config),
            Err(BootstrapError::Routing(RoutingError::DuplicatePattern { .. }))
        ));
    }

    #[tokio::test]
    async fn accounts_file_feeds_the_realm() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"principal": "admin", "salt": "s1", "password": "admin", "roles": ["admin"]}}]"#
        )
        .unwrap();
        let config = SecurityConfig {
            accounts_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let state = AppState::bootstrap(&config).unwrap();
        let info = state
            .security
            .realm()
            .authenticate(&crate::models::UsernamePasswordToken::new("admin", "admin"))
            .await
            .unwrap();
        assert_eq!(info.principal, "admin");
    }
}

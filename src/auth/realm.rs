// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential-verifying realm with cached authentication and authorization facts.
//!
//! ## Caching
//!
//! - `authentication_cache` holds [`AuthenticationInfo`] keyed by principal.
//!   Credentials are still verified against the cached hash on every call.
//! - `authorization_cache` holds [`AuthorizationInfo`] keyed by principal,
//!   with its own (usually shorter) TTL so grant edits are felt sooner.
//!
//! Either region failing is logged and bypassed; the credential store is
//! then queried directly.

use std::sync::Arc;

use tracing::{debug, warn};

use super::credentials::{credentials_match, CredentialStore};
use super::error::AuthenticationError;
use crate::models::{AuthenticationInfo, AuthorizationInfo, UsernamePasswordToken};
use crate::storage::Cache;

/// Default realm name.
pub const DEFAULT_REALM_NAME: &str = "userRealm";

pub struct Realm {
    name: String,
    store: Arc<dyn CredentialStore>,
    authentication_cache: Arc<dyn Cache<AuthenticationInfo>>,
    authorization_cache: Arc<dyn Cache<AuthorizationInfo>>,
}

impl Realm {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        authentication_cache: Arc<dyn Cache<AuthenticationInfo>>,
        authorization_cache: Arc<dyn Cache<AuthorizationInfo>>,
    ) -> Self {
        Self {
            name: DEFAULT_REALM_NAME.to_string(),
            store,
            authentication_cache,
            authorization_cache,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Verify a login attempt.
    ///
    /// # Errors
    /// - `UnknownPrincipal` if the store has no such account
    /// - `IncorrectCredentials` if the secret does not match
    /// - `CredentialStore` if the store itself failed
    pub async fn authenticate(
        &self,
        token: &UsernamePasswordToken,
    ) -> Result<AuthenticationInfo, AuthenticationError> {
        let principal = token.principal.as_str();

        let info = match self.cached_authentication(principal) {
            Some(info) => info,
            None => {
                let info = self.load_authentication(principal).await?;
                if let Err(e) = self.authentication_cache.put(principal, info.clone()) {
                    warn!(principal, error = %e, "Failed to cache authentication info");
                }
                info
            }
        };

        if !credentials_match(&info.salt, &token.credentials, &info.credential_hash) {
            return Err(AuthenticationError::IncorrectCredentials(principal.to_string()));
        }

        Ok(info)
    }

    /// Roles and permissions for a principal.
    ///
    /// A principal the store knows nothing about gets an empty grant set.
    pub async fn authorize(&self, principal: &str) -> Result<AuthorizationInfo, AuthenticationError> {
        match self.authorization_cache.get(principal) {
            Ok(Some(info)) => return Ok(info),
            Ok(None) => {}
            Err(e) => warn!(principal, error = %e, "Authorization cache bypassed"),
        }

        let grants = self
            .store
            .find_grants(principal)
            .await
            .map_err(|e| AuthenticationError::CredentialStore(e.to_string()))?;

        let info = match grants {
            Some(grants) => AuthorizationInfo {
                principal: principal.to_string(),
                roles: grants.roles,
                permissions: grants.permissions,
            },
            None => AuthorizationInfo::empty(principal),
        };

        if let Err(e) = self.authorization_cache.put(principal, info.clone()) {
            warn!(principal, error = %e, "Failed to cache authorization info");
        }
        Ok(info)
    }

    /// Drop cached authentication info, e.g. after a password change.
    pub fn invalidate_authentication(&self, principal: &str) {
        if let Err(e) = self.authentication_cache.remove(principal) {
            warn!(principal, error = %e, "Failed to invalidate authentication cache entry");
        } else {
            debug!(principal, "Authentication cache entry invalidated");
        }
    }

    /// Drop cached authorization info, e.g. after a role edit.
    pub fn invalidate_authorization(&self, principal: &str) {
        if let Err(e) = self.authorization_cache.remove(principal) {
            warn!(principal, error = %e, "Failed to invalidate authorization cache entry");
        } else {
            debug!(principal, "Authorization cache entry invalidated");
        }
    }

    fn cached_authentication(&self, principal: &str) -> Option<AuthenticationInfo> {
        match self.authentication_cache.get(principal) {
            Ok(hit) => hit,
            Err(e) => {
                warn!(principal, error = %e, "Authentication cache bypassed");
                None
            }
        }
    }

    async fn load_authentication(&self, principal: &str) -> Result<AuthenticationInfo, AuthenticationError> {
        let account = self
            .store
            .find_account(principal)
            .await
            .map_err(|e| AuthenticationError::CredentialStore(e.to_string()))?
            .ok_or_else(|| AuthenticationError::UnknownPrincipal(principal.to_string()))?;

        Ok(AuthenticationInfo {
            principal: account.principal,
            credential_hash: account.credential_hash,
            salt: account.salt,
            realm_name: self.name.clone(),
        })
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential store contract and credential hashing.
//!
//! The credential store is an external collaborator: it supplies principal,
//! credential hash and grant data, and the realm never writes to it. Calls
//! may be slow, so the realm never holds a lock across them.
//!
//! ## Hashing
//!
//! The canonical credential hash is `base64(HMAC-SHA256(key = salt, msg = secret))`.
//! Verification goes through `Mac::verify_slice`, which compares in constant time.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tokio::sync::RwLock;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum CredentialStoreError {
    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    #[error("failed to load accounts file: {0}")]
    Load(String),
}

/// Stored account record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub principal: String,
    /// Base64 HMAC-SHA256 of the secret, keyed by `salt`.
    pub credential_hash: String,
    pub salt: String,
}

/// Roles and permissions held by a principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Grants {
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

/// Source of principal, credential and grant data.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_account(&self, principal: &str) -> Result<Option<Account>, CredentialStoreError>;

    async fn find_grants(&self, principal: &str) -> Result<Option<Grants>, CredentialStoreError>;
}

/// Hash a secret with the given salt.
pub fn hash_credentials(salt: &str, secret: &str) -> String {
    Base64::encode_string(&keyed_mac(salt, secret).finalize().into_bytes())
}

/// Check a presented secret against a stored hash.
///
/// A malformed stored hash never matches.
pub fn credentials_match(salt: &str, secret: &str, stored_hash: &str) -> bool {
    let Ok(expected) = Base64::decode_vec(stored_hash) else {
        return false;
    };
    keyed_mac(salt, secret).verify_slice(&expected).is_ok()
}

fn keyed_mac(salt: &str, secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length, including empty.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(salt.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC takes keys of any size"));
    mac.update(secret.as_bytes());
    mac
}

/// One entry of the JSON accounts file.
#[derive(Debug, Deserialize)]
struct AccountFileEntry {
    principal: String,
    salt: String,
    /// Either a pre-computed hash...
    #[serde(default)]
    credential_hash: Option<String>,
    /// ...or a plaintext password hashed on load (development only).
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    roles: BTreeSet<String>,
    #[serde(default)]
    permissions: BTreeSet<String>,
}

/// Process-local credential store.
///
/// Used for development and tests; production deployments plug their user
/// directory in behind [`CredentialStore`].
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    accounts: RwLock<HashMap<String, (Account, Grants)>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace an account, hashing `secret` with `salt`.
    pub async fn insert(&self, principal: &str, salt: &str, secret: &str, grants: Grants) {
        let account = Account {
            principal: principal.to_string(),
            credential_hash: hash_credentials(salt, secret),
            salt: salt.to_string(),
        };
        self.accounts
            .write()
            .await
            .insert(principal.to_string(), (account, grants));
    }

    /// Replace the grants of an existing principal.
    pub async fn set_grants(&self, principal: &str, grants: Grants) -> bool {
        match self.accounts.write().await.get_mut(principal) {
            Some(entry) => {
                entry.1 = grants;
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, principal: &str) -> bool {
        self.accounts.write().await.remove(principal).is_some()
    }

    /// Load accounts from a JSON array file.
    ///
    /// ```json
    /// [{"principal": "admin", "salt": "s1", "password": "admin",
    ///   "roles": ["admin"], "permissions": ["sys:session:list"]}]
    /// ```
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CredentialStoreError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CredentialStoreError::Load(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CredentialStoreError> {
        let entries: Vec<AccountFileEntry> =
            serde_json::from_str(raw).map_err(|e| CredentialStoreError::Load(e.to_string()))?;

        let mut accounts = HashMap::with_capacity(entries.len());
        for entry in entries {
            let credential_hash = match (entry.credential_hash, entry.password) {
                (Some(hash), _) => hash,
                (None, Some(password)) => hash_credentials(&entry.salt, &password),
                (None, None) => {
                    return Err(CredentialStoreError::Load(format!(
                        "account {} has neither credential_hash nor password",
                        entry.principal
                    )))
                }
            };
            let account = Account {
                principal: entry.principal.clone(),
                credential_hash,
                salt: entry.salt,
            };
            let grants = Grants {
                roles: entry.roles,
                permissions: entry.permissions,
            };
            accounts.insert(entry.principal, (account, grants));
        }

        Ok(Self {
            accounts: RwLock::new(accounts),
        })
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_account(&self, principal: &str) -> Result<Option<Account>, CredentialStoreError> {
        Ok(self
            .accounts
            .read()
            .await
            .get(principal)
            .map(|(account, _)| account.clone()))
    }

    async fn find_grants(&self, principal: &str) -> Result<Option<Grants>, CredentialStoreError> {
        Ok(self
            .accounts
            .read()
            .await
            .get(principal)
            .map(|(_, grants)| grants.clone()))
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Data Models
//!
//! Records shared between the realm, the session layer and the HTTP API.
//!
//! ## Model Categories
//!
//! - **Credentials**: what a login attempt presents
//! - **Realm facts**: cached authentication / authorization info
//! - **Sessions**: server-side session records owned by the session store
//! - **Remember-me**: plaintext carried inside the encrypted cookie
//! - **API**: request and response bodies

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Credentials
// =============================================================================

/// Principal + secret presented on a single login attempt.
#[derive(Clone, Deserialize)]
pub struct UsernamePasswordToken {
    pub principal: String,
    pub credentials: String,
    #[serde(default)]
    pub remember_me: bool,
    #[serde(default)]
    pub host: Option<String>,
}

impl UsernamePasswordToken {
    pub fn new(principal: impl Into<String>, credentials: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            credentials: credentials.into(),
            remember_me: false,
            host: None,
        }
    }

    pub fn remember_me(mut self, remember_me: bool) -> Self {
        self.remember_me = remember_me;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}

// Never print the secret.
impl std::fmt::Debug for UsernamePasswordToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsernamePasswordToken")
            .field("principal", &self.principal)
            .field("remember_me", &self.remember_me)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Realm Facts
// =============================================================================

/// Result of a successful credential verification.
///
/// Cached in the `authentication_cache` region keyed by principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationInfo {
    pub principal: String,
    /// Canonical credential hash (base64 HMAC-SHA256 over the secret).
    pub credential_hash: String,
    /// Per-account salt the hash was keyed with.
    pub salt: String,
    /// Realm that produced this info.
    pub realm_name: String,
}

/// Roles and permissions granted to a principal.
///
/// Cached in the `authorization_cache` region, independently of
/// [`AuthenticationInfo`], because grants change more often than passwords.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthorizationInfo {
    pub principal: String,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
}

impl AuthorizationInfo {
    pub fn empty(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            ..Default::default()
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// Server-side session record.
///
/// Owned by the session store; the session manager is the only writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque, unique among live sessions.
    pub id: String,
    /// Bound principal, `None` until a login succeeds on this session.
    pub principal: Option<String>,
    /// `true` only after a fresh credential check in this session.
    pub authenticated: bool,
    pub created_at: DateTime<Utc>,
    pub last_access_at: DateTime<Utc>,
    pub idle_timeout_ms: u64,
    /// Host/origin tag recorded at creation.
    pub host: Option<String>,
    pub attributes: HashMap<String, serde_json::Value>,
    /// Set when the session was invalidated but kept in the store.
    pub stopped_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(id: impl Into<String>, host: Option<String>, idle_timeout: Duration, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            principal: None,
            authenticated: false,
            created_at: now,
            last_access_at: now,
            idle_timeout_ms: u64::try_from(idle_timeout.as_millis()).unwrap_or(u64::MAX),
            host,
            attributes: HashMap::new(),
            stopped_at: None,
        }
    }

    /// `true` once the idle duration exceeds the timeout.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let idle_ms = (now - self.last_access_at).num_milliseconds();
        idle_ms > 0 && idle_ms as u64 > self.idle_timeout_ms
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped_at.is_some()
    }

    /// Live sessions are neither stopped nor expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_stopped() && !self.is_expired_at(now)
    }
}

// =============================================================================
// Remember-me
// =============================================================================

/// Plaintext wrapped by the remember-me cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RememberedIdentity {
    pub principal: String,
    /// Issue time, milliseconds since the Unix epoch.
    pub issued_at: i64,
}

// =============================================================================
// API Models
// =============================================================================

/// Form body accepted by the login endpoint.
#[derive(Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Checkbox semantics: any of `on`, `true`, `1` enables remember-me.
    #[serde(default, rename = "rememberMe")]
    pub remember_me: Option<String>,
}

impl LoginRequest {
    pub fn wants_remember_me(&self) -> bool {
        matches!(
            self.remember_me.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("on" | "true" | "1" | "yes")
        )
    }
}

/// Trust tier of the identity attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TrustTier {
    Anonymous,
    Remembered,
    Authenticated,
}

/// Current subject as seen by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubjectView {
    pub principal: Option<String>,
    pub tier: TrustTier,
    pub session_id: Option<String>,
}

/// Session administration summary.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionStats {
    pub active_sessions: usize,
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Security Manager
//!
//! Composes the realm, the session manager and the remember-me codec behind
//! one login / logout / identity API used by the filter chain and handlers.
//!
//! ## Identity resolution
//!
//! 1. Session cookie → live session bound to an authenticated principal
//! 2. Remember-me cookie → decrypted principal (weaker tier)
//! 3. Anonymous
//!
//! Nothing here is global: one instance is built at startup and shared by
//! `Arc` through the application state.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::cookies::CookieDirective;
use super::error::{AuthError, AuthorizationError, SessionError};
use super::realm::Realm;
use super::remember_me::RememberMeCodec;
use super::session::SessionManager;
use super::subject::{Identity, Subject};
use crate::models::{Session, UsernamePasswordToken};

/// Session attribute holding the path (and query) requested before login.
pub const SAVED_REQUEST_KEY: &str = "saved_request";

/// Redirect targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityUrls {
    pub login_url: String,
    pub success_url: String,
    pub unauthorized_url: String,
}

impl Default for SecurityUrls {
    fn default() -> Self {
        Self {
            login_url: "/admin/login.html".to_string(),
            success_url: "/admin/".to_string(),
            unauthorized_url: "/error.html".to_string(),
        }
    }
}

/// Decides whether a granted string satisfies a required one.
pub trait PermissionCheck: Send + Sync {
    fn implies(&self, granted: &str, required: &str) -> bool;
}

/// Granted and required strings must be identical.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactMatch;

impl PermissionCheck for ExactMatch {
    fn implies(&self, granted: &str, required: &str) -> bool {
        granted == required
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub principal: String,
    pub session: Session,
    /// Saved request if one was recorded, otherwise the success URL.
    pub redirect_to: String,
    pub directives: Vec<CookieDirective>,
}

pub struct SecurityManager {
    realm: Arc<Realm>,
    sessions: Arc<SessionManager>,
    remember_me: Arc<RememberMeCodec>,
    urls: SecurityUrls,
    permission_check: Arc<dyn PermissionCheck>,
}

impl SecurityManager {
    pub fn new(
        realm: Arc<Realm>,
        sessions: Arc<SessionManager>,
        remember_me: Arc<RememberMeCodec>,
        urls: SecurityUrls,
    ) -> Self {
        Self {
            realm,
            sessions,
            remember_me,
            urls,
            permission_check: Arc::new(ExactMatch),
        }
    }

    pub fn with_permission_check(mut self, check: Arc<dyn PermissionCheck>) -> Self {
        self.permission_check = check;
        self
    }

    pub fn urls(&self) -> &SecurityUrls {
        &self.urls
    }

    pub fn realm(&self) -> &Arc<Realm> {
        &self.realm
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Resolve the identity attached to a request.
    ///
    /// Never fails: unusable session ids and tokens degrade to the next
    /// source and produce a directive clearing the offending cookie.
    pub async fn current_subject(&self, session_id: Option<&str>, remember_token: Option<&str>) -> Subject {
        let mut directives = Vec::new();

        let session = match session_id {
            Some(id) => match self.sessions.touch(id).await {
                Ok(session) => Some(session),
                Err(SessionError::Store(e)) => {
                    warn!(session_id = %id, error = %e, "Session store failed, treating request as sessionless");
                    None
                }
                Err(e) => {
                    debug!(session_id = %id, error = %e, "Discarding stale session cookie");
                    directives.push(CookieDirective::ClearSession);
                    None
                }
            },
            None => None,
        };

        if let Some(principal) = session
            .as_ref()
            .filter(|s| s.authenticated)
            .and_then(|s| s.principal.clone())
        {
            return Subject {
                identity: Identity::Authenticated(principal),
                session,
                directives,
            };
        }

        let identity = match remember_token {
            Some(token) => match self.remember_me.recall(token) {
                Some(remembered) => Identity::Remembered(remembered.principal),
                None => {
                    directives.push(CookieDirective::ClearRememberMe);
                    Identity::Anonymous
                }
            },
            None => Identity::Anonymous,
        };

        Subject {
            identity,
            session,
            directives,
        }
    }

    /// Verify credentials and establish an authenticated session.
    ///
    /// The principal is bound to a fresh session; a saved request recorded on
    /// the previous session is carried over as the redirect target and the
    /// previous session is invalidated.
    ///
    /// # Errors
    /// Authentication failures and session store failures. The caller decides
    /// how to present them (the login handler redirects back to the login URL).
    pub async fn login(&self, subject: &Subject, token: &UsernamePasswordToken) -> Result<LoginOutcome, AuthError> {
        let info = match self.realm.authenticate(token).await {
            Ok(info) => info,
            Err(e) => {
                warn!(principal = %token.principal, error = %e, "Login failed");
                return Err(e.into());
            }
        };

        let saved_request = match subject.session_id() {
            Some(old_id) => {
                let saved = self.take_saved_request(old_id).await;
                if let Err(e) = self.sessions.invalidate(old_id).await {
                    warn!(session_id = %old_id, error = %e, "Failed to invalidate pre-login session");
                }
                saved
            }
            None => None,
        };

        let host = token.host.clone().or_else(|| subject.session.as_ref().and_then(|s| s.host.clone()));
        let session = self.sessions.start(host).await?;
        let session = self.sessions.bind_principal(&session.id, &info.principal).await?;

        // Warms the authorization cache.
        if let Err(e) = self.realm.authorize(&info.principal).await {
            warn!(principal = %info.principal, error = %e, "Could not load grants at login");
        }

        let mut directives = vec![CookieDirective::SetSession(session.id.clone())];
        if token.remember_me {
            directives.push(CookieDirective::SetRememberMe(
                self.remember_me.encode(&info.principal, Utc::now())?,
            ));
        } else {
            directives.push(CookieDirective::ClearRememberMe);
        }

        info!(principal = %info.principal, session_id = %session.id, remember_me = token.remember_me, "Login succeeded");

        Ok(LoginOutcome {
            principal: info.principal,
            session,
            redirect_to: saved_request
                .filter(|target| {
                    let local = is_local_path(target);
                    if !local {
                        warn!(saved = %target, "Ignoring non-local saved request");
                    }
                    local
                })
                .unwrap_or_else(|| self.urls.success_url.clone()),
            directives,
        })
    }

    /// End the subject's session and forget any remembered identity.
    pub async fn logout(&self, subject: &Subject) -> Vec<CookieDirective> {
        if let Some(id) = subject.session_id() {
            if let Err(e) = self.sessions.invalidate(id).await {
                warn!(session_id = %id, error = %e, "Failed to invalidate session on logout");
            }
        }
        if let Some(principal) = subject.principal() {
            self.realm.invalidate_authentication(principal);
            self.realm.invalidate_authorization(principal);
            info!(principal, "Logged out");
        }
        vec![CookieDirective::ClearSession, CookieDirective::ClearRememberMe]
    }

    /// Remember where the subject was headed before being sent to login.
    ///
    /// Starts a session when the subject has none; the returned directives
    /// then set its cookie.
    pub async fn save_request(&self, subject: &Subject, target: &str, host: Option<String>) -> Vec<CookieDirective> {
        if !is_local_path(target) {
            warn!(requested = %target, "Refusing to save non-local request target");
            return Vec::new();
        }
        let value = serde_json::Value::String(target.to_string());

        if let Some(id) = subject.session_id() {
            match self.sessions.set_attribute(id, SAVED_REQUEST_KEY, value.clone()).await {
                Ok(_) => return Vec::new(),
                Err(e) => debug!(session_id = %id, error = %e, "Could not save request on existing session"),
            }
        }

        let session = match self.sessions.start(host).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Could not start session to save request");
                return Vec::new();
            }
        };
        if let Err(e) = self.sessions.set_attribute(&session.id, SAVED_REQUEST_KEY, value).await {
            warn!(session_id = %session.id, error = %e, "Could not save request");
        }
        vec![CookieDirective::SetSession(session.id)]
    }

    /// Require every listed permission.
    ///
    /// # Errors
    /// - `Unauthenticated` for an anonymous subject
    /// - `InsufficientPermission` naming the first missing permission
    /// - a credential store failure while loading grants
    pub async fn check_permissions(&self, subject: &Subject, required: &[String]) -> Result<(), AuthError> {
        let principal = subject.principal().ok_or(AuthorizationError::Unauthenticated)?;
        let info = self.realm.authorize(principal).await?;
        self.require_all(principal, &info.permissions, required)
    }

    /// Require every listed role.
    pub async fn check_roles(&self, subject: &Subject, required: &[String]) -> Result<(), AuthError> {
        let principal = subject.principal().ok_or(AuthorizationError::Unauthenticated)?;
        let info = self.realm.authorize(principal).await?;
        match required.iter().find(|role| !info.has_role(role)) {
            Some(missing) => Err(AuthorizationError::InsufficientPermission {
                principal: principal.to_string(),
                required: format!("role {missing}"),
            }
            .into()),
            None => Ok(()),
        }
    }

    fn require_all(&self, principal: &str, granted: &BTreeSet<String>, required: &[String]) -> Result<(), AuthError> {
        let missing = required
            .iter()
            .find(|needed| !granted.iter().any(|g| self.permission_check.implies(g, needed)));
        match missing {
            Some(needed) => Err(AuthorizationError::InsufficientPermission {
                principal: principal.to_string(),
                required: format!("permission {needed}"),
            }
            .into()),
            None => Ok(()),
        }
    }

    async fn take_saved_request(&self, session_id: &str) -> Option<String> {
        match self.sessions.take_attribute(session_id, SAVED_REQUEST_KEY).await {
            Ok(Some(serde_json::Value::String(target))) => Some(target),
            Ok(_) => None,
            Err(e) => {
                debug!(session_id, error = %e, "No saved request available");
                None
            }
        }
    }
}

/// Same-origin absolute path: a single leading `/`, no scheme or authority.
fn is_local_path(target: &str) -> bool {
    let mut chars = target.chars();
    chars.next() == Some('/') && !matches!(chars.next(), Some('/' | '\\'))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::realm::tests::{caching_realm, CountingStore};
    use crate::auth::session::SessionManagerConfig;
    use crate::storage::{InMemorySessionStore, SessionStore};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    pub(crate) struct Fixture {
        pub security: SecurityManager,
        pub store: Arc<CountingStore>,
        pub sessions: Arc<InMemorySessionStore>,
        pub codec: Arc<RememberMeCodec>,
    }

    pub(crate) async fn fixture() -> Fixture {
        fixture_with_timeout(Duration::from_secs(60)).await
    }

    pub(crate) async fn fixture_with_timeout(idle_timeout: Duration) -> Fixture {
        let store = Arc::new(CountingStore::with_alice().await);
        let sessions = Arc::new(InMemorySessionStore::new());
        let codec = Arc::new(RememberMeCodec::new(&[9u8; 16]).unwrap());
        let security = SecurityManager::new(
            Arc::new(caching_realm(store.clone())),
            Arc::new(SessionManager::new(
                sessions.clone(),
                SessionManagerConfig {
                    idle_timeout,
                    ..Default::default()
                },
            )),
            codec.clone(),
            SecurityUrls::default(),
        );
        Fixture {
            security,
            store,
            sessions,
            codec,
        }
    }

    fn session_cookie(directives: &[CookieDirective]) -> Option<String> {
        directives.iter().find_map(|d| match d {
            CookieDirective::SetSession(id) => Some(id.clone()),
            _ => None,
        })
    }

    #[tokio::test]
    async fn anonymous_without_cookies() {
        let f = fixture().await;
        let subject = f.security.current_subject(None, None).await;
        assert_eq!(subject.identity, Identity::Anonymous);
        assert!(subject.directives.is_empty());
    }

    #[tokio::test]
    async fn login_binds_fresh_session_and_resolves_authenticated() {
        let f = fixture().await;
        let token = UsernamePasswordToken::new("alice", "correct");
        let outcome = f.security.login(&Subject::anonymous(), &token).await.unwrap();

        assert_eq!(outcome.redirect_to, "/admin/");
        assert_eq!(session_cookie(&outcome.directives).as_deref(), Some(outcome.session.id.as_str()));
        assert!(outcome.directives.contains(&CookieDirective::ClearRememberMe));
        // Authorization warmed at login.
        assert_eq!(f.store.grant_lookups.load(Ordering::SeqCst), 1);

        let subject = f.security.current_subject(Some(&outcome.session.id), None).await;
        assert_eq!(subject.identity, Identity::Authenticated("alice".into()));
    }

    #[tokio::test]
    async fn login_failure_is_reported() {
        let f = fixture().await;
        let err = f
            .security
            .login(&Subject::anonymous(), &UsernamePasswordToken::new("alice", "nope"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "authentication_failed");
        assert_eq!(f.sessions.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn login_redirects_to_saved_request_and_rotates_session() {
        let f = fixture().await;
        let anonymous = Subject::anonymous();
        let directives = f.security.save_request(&anonymous, "/admin/index?tab=2", None).await;
        let pre_login_id = session_cookie(&directives).unwrap();

        let subject = f.security.current_subject(Some(&pre_login_id), None).await;
        let outcome = f
            .security
            .login(&subject, &UsernamePasswordToken::new("alice", "correct"))
            .await
            .unwrap();

        assert_eq!(outcome.redirect_to, "/admin/index?tab=2");
        assert_ne!(outcome.session.id, pre_login_id);
        assert!(f.sessions.read(&pre_login_id).await.unwrap().is_none());
    }

    #[test]
    fn local_paths_exclude_protocol_relative_targets() {
        assert!(is_local_path("/admin/index?tab=2"));
        assert!(is_local_path("/"));
        assert!(!is_local_path("//evil.example/steal"));
        assert!(!is_local_path("/\\evil.example"));
        assert!(!is_local_path("https://evil.example"));
        assert!(!is_local_path(""));
    }

    #[tokio::test]
    async fn save_request_refuses_protocol_relative_target() {
        let f = fixture().await;
        let directives = f
            .security
            .save_request(&Subject::anonymous(), "//evil.example/steal", None)
            .await;
        assert!(directives.is_empty());
        assert_eq!(f.sessions.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn login_ignores_protocol_relative_saved_request() {
        let f = fixture().await;
        let pre_login = f.security.sessions().start(None).await.unwrap();
        f.security
            .sessions()
            .set_attribute(
                &pre_login.id,
                SAVED_REQUEST_KEY,
                serde_json::Value::String("//evil.example/steal".into()),
            )
            .await
            .unwrap();

        let subject = f.security.current_subject(Some(&pre_login.id), None).await;
        let outcome = f
            .security
            .login(&subject, &UsernamePasswordToken::new("alice", "correct"))
            .await
            .unwrap();
        assert_eq!(outcome.redirect_to, f.security.urls().success_url);
    }

    #[tokio::test]
    async fn remember_me_login_issues_token_recalled_as_remembered() {
        let f = fixture().await;
        let token = UsernamePasswordToken::new("alice", "correct").remember_me(true);
        let outcome = f.security.login(&Subject::anonymous(), &token).await.unwrap();

        let remember_token = outcome
            .directives
            .iter()
            .find_map(|d| match d {
                CookieDirective::SetRememberMe(t) => Some(t.clone()),
                _ => None,
            })
            .unwrap();

        let subject = f.security.current_subject(None, Some(&remember_token)).await;
        assert_eq!(subject.identity, Identity::Remembered("alice".into()));
        assert!(subject.session.is_none());
    }

    #[tokio::test]
    async fn unusable_cookies_are_cleared() {
        let f = fixture().await;
        let subject = f.security.current_subject(Some("missing"), Some("garbage")).await;
        assert_eq!(subject.identity, Identity::Anonymous);
        assert!(subject.directives.contains(&CookieDirective::ClearSession));
        assert!(subject.directives.contains(&CookieDirective::ClearRememberMe));
    }

    #[tokio::test]
    async fn logout_invalidates_session_and_clears_cookies() {
        let f = fixture().await;
        let token = UsernamePasswordToken::new("alice", "correct").remember_me(true);
        let outcome = f.security.login(&Subject::anonymous(), &token).await.unwrap();
        let subject = f.security.current_subject(Some(&outcome.session.id), None).await;

        let directives = f.security.logout(&subject).await;
        assert!(directives.contains(&CookieDirective::ClearSession));
        assert!(directives.contains(&CookieDirective::ClearRememberMe));
        assert!(f.sessions.read(&outcome.session.id).await.unwrap().is_none());

        let after = f.security.current_subject(Some(&outcome.session.id), None).await;
        assert_eq!(after.identity, Identity::Anonymous);
    }

    #[tokio::test]
    async fn expired_session_falls_back_to_remember_me() {
        let f = fixture_with_timeout(Duration::from_millis(10)).await;
        let token = UsernamePasswordToken::new("alice", "correct");
        let outcome = f.security.login(&Subject::anonymous(), &token).await.unwrap();
        let remembered = f.codec.encode("alice", Utc::now()).unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        let subject = f
            .security
            .current_subject(Some(&outcome.session.id), Some(&remembered))
            .await;
        assert_eq!(subject.identity, Identity::Remembered("alice".into()));
        assert!(subject.directives.contains(&CookieDirective::ClearSession));
    }

    #[tokio::test]
    async fn permission_and_role_checks() {
        let f = fixture().await;
        let alice = Subject {
            identity: Identity::Remembered("alice".into()),
            session: None,
            directives: Vec::new(),
        };

        f.security
            .check_permissions(&alice, &["sys:session:list".to_string()])
            .await
            .unwrap();
        f.security.check_roles(&alice, &["admin".to_string()]).await.unwrap();

        let err = f
            .security
            .check_permissions(&alice, &["sys:session:list".into(), "sys:user:delete".into()])
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "insufficient_permission");

        let err = f
            .security
            .check_roles(&Subject::anonymous(), &["admin".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "unauthenticated");
    }

    #[tokio::test]
    async fn custom_permission_check_is_used() {
        struct Prefix;
        impl PermissionCheck for Prefix {
            fn implies(&self, granted: &str, required: &str) -> bool {
                granted
                    .strip_suffix('*')
                    .is_some_and(|prefix| required.starts_with(prefix))
            }
        }

        let f = fixture().await;
        f.store
            .inner
            .set_grants(
                "alice",
                crate::auth::credentials::Grants {
                    roles: Default::default(),
                    permissions: ["sys:*".to_string()].into(),
                },
            )
            .await;
        let security = f.security.with_permission_check(Arc::new(Prefix));
        let alice = Subject {
            identity: Identity::Authenticated("alice".into()),
            session: None,
            directives: Vec::new(),
        };
        security
            .check_permissions(&alice, &["sys:user:delete".to_string()])
            .await
            .unwrap();
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Running a rule's filters against a request.

use tracing::{debug, warn};

use super::chain::FilterChainRule;
use super::definition::FilterKind;
use crate::auth::cookies::CookieDirective;
use crate::auth::error::{AuthError, AuthorizationError};
use crate::auth::manager::SecurityManager;
use crate::auth::subject::Subject;

/// The parts of a request the filters look at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub path: String,
    pub query: Option<String>,
    pub host: Option<String>,
}

impl RequestContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Path plus query string, as saved for the post-login redirect.
    ///
    /// Runs of `/` collapse to one so the target can never read as a
    /// protocol-relative URL (`//host/..`).
    pub fn target(&self) -> String {
        let path = collapse_slashes(&self.path);
        match self.query.as_deref() {
            Some(q) if !q.is_empty() => format!("{path}?{q}"),
            _ => path,
        }
    }
}

fn collapse_slashes(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len() + 1);
    collapsed.push('/');
    for c in path.chars() {
        if (c == '/' || c == '\\') && collapsed.ends_with('/') {
            continue;
        }
        collapsed.push(if c == '\\' { '/' } else { c });
    }
    collapsed
}

/// Outcome of a filter chain pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Redirect {
        location: String,
        directives: Vec<CookieDirective>,
    },
}

impl Decision {
    fn redirect(location: &str) -> Self {
        Decision::Redirect {
            location: location.to_string(),
            directives: Vec::new(),
        }
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, Decision::Continue)
    }
}

/// Run `rule`'s filters left to right. The first filter that does not
/// continue decides.
pub async fn evaluate(
    rule: &FilterChainRule,
    request: &RequestContext,
    subject: &Subject,
    security: &SecurityManager,
) -> Decision {
    for filter in &rule.filters {
        let decision = apply(filter, request, subject, security).await;
        if !decision.is_continue() {
            debug!(path = %request.path, pattern = %rule.pattern, filter = %filter, "Request stopped by filter");
            return decision;
        }
    }
    Decision::Continue
}

async fn apply(
    filter: &FilterKind,
    request: &RequestContext,
    subject: &Subject,
    security: &SecurityManager,
) -> Decision {
    let urls = security.urls();
    let is_login_request = request.path == urls.login_url;

    match filter {
        FilterKind::Anon => Decision::Continue,

        FilterKind::Authc if subject.identity.is_authenticated() || is_login_request => Decision::Continue,
        FilterKind::Authc => redirect_to_login(request, subject, security).await,

        FilterKind::User if subject.identity.is_known() || is_login_request => Decision::Continue,
        FilterKind::User => redirect_to_login(request, subject, security).await,

        FilterKind::Logout => Decision::Redirect {
            location: urls.login_url.clone(),
            directives: security.logout(subject).await,
        },

        FilterKind::Perms(required) => {
            authorization_decision(security.check_permissions(subject, required).await, request, subject, security)
                .await
        }
        FilterKind::Roles(required) => {
            authorization_decision(security.check_roles(subject, required).await, request, subject, security).await
        }
    }
}

async fn authorization_decision(
    result: Result<(), AuthError>,
    request: &RequestContext,
    subject: &Subject,
    security: &SecurityManager,
) -> Decision {
    match result {
        Ok(()) => Decision::Continue,
        Err(AuthError::Authorization(AuthorizationError::Unauthenticated)) => {
            redirect_to_login(request, subject, security).await
        }
        Err(e @ AuthError::Authorization(_)) => {
            debug!(path = %request.path, error = %e, "Access denied");
            Decision::redirect(&security.urls().unauthorized_url)
        }
        Err(e) => {
            warn!(path = %request.path, error = %e, "Authorization check failed, denying");
            Decision::redirect(&security.urls().unauthorized_url)
        }
    }
}

async fn redirect_to_login(request: &RequestContext, subject: &Subject, security: &SecurityManager) -> Decision {
    let directives = security
        .save_request(subject, &request.target(), request.host.clone())
        .await;
    Decision::Redirect {
        location: security.urls().login_url.clone(),
        directives,
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session and remember-me cookie settings.
//!
//! | cookie | name | path | max-age | httpOnly | secure |
//! |--------|------|------|---------|----------|--------|
//! | session | `{serverName}_SHAREJSESSIONID` | `/` | 259200 s | true | false |
//! | remember-me | `{serverName}_rememberMe` | `/` | 259200 s | true | false |
//!
//! Max-age is 3 days for both, as configured.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use tracing::warn;

/// Cookie lifetime in seconds (3 days).
pub const COOKIE_MAX_AGE_SECS: u64 = 259_200;

/// Value written when a cookie is cleared.
pub const DELETED_COOKIE_VALUE: &str = "deleteMe";

const SESSION_COOKIE_SUFFIX: &str = "_SHAREJSESSIONID";
const REMEMBER_ME_COOKIE_SUFFIX: &str = "_rememberMe";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSpec {
    pub name: String,
    pub path: String,
    pub max_age_secs: u64,
    pub http_only: bool,
    pub secure: bool,
}

impl CookieSpec {
    pub fn session(server_name: &str, http_only: bool, secure: bool) -> Self {
        Self::named(format!("{server_name}{SESSION_COOKIE_SUFFIX}"), http_only, secure)
    }

    pub fn remember_me(server_name: &str, http_only: bool, secure: bool) -> Self {
        Self::named(format!("{server_name}{REMEMBER_ME_COOKIE_SUFFIX}"), http_only, secure)
    }

    fn named(name: String, http_only: bool, secure: bool) -> Self {
        Self {
            name,
            path: "/".to_string(),
            max_age_secs: COOKIE_MAX_AGE_SECS,
            http_only,
            secure,
        }
    }

    /// `Set-Cookie` value carrying `value`.
    pub fn render(&self, value: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        self.render_with_max_age(value, self.max_age_secs)
    }

    /// `Set-Cookie` value that makes the browser drop the cookie.
    pub fn render_removal(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        self.render_with_max_age(DELETED_COOKIE_VALUE, 0)
    }

    fn render_with_max_age(&self, value: &str, max_age: u64) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{}={value}; Path={}; Max-Age={max_age}; SameSite=Lax",
            self.name, self.path
        );
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }

    /// Read this cookie from a request's `Cookie` headers.
    ///
    /// Empty values and the removal marker count as absent.
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|header| header.to_str().ok())
            .flat_map(|value| value.split(';'))
            .find_map(|pair| {
                let (key, val) = pair.trim().split_once('=')?;
                (key.trim() == self.name).then(|| val.trim().to_string())
            })
            .filter(|val| !val.is_empty() && val != DELETED_COOKIE_VALUE)
    }
}

/// Cookie change requested by the security layer, rendered by the HTTP adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieDirective {
    SetSession(String),
    ClearSession,
    SetRememberMe(String),
    ClearRememberMe,
}

/// Both cookie specs, as configured for one server name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityCookies {
    pub session: CookieSpec,
    pub remember_me: CookieSpec,
}

impl SecurityCookies {
    pub fn new(server_name: &str, http_only: bool, secure: bool) -> Self {
        Self {
            session: CookieSpec::session(server_name, http_only, secure),
            remember_me: CookieSpec::remember_me(server_name, http_only, secure),
        }
    }

    pub fn render(&self, directive: &CookieDirective) -> Result<HeaderValue, InvalidHeaderValue> {
        match directive {
            CookieDirective::SetSession(id) => self.session.render(id),
            CookieDirective::ClearSession => self.session.render_removal(),
            CookieDirective::SetRememberMe(token) => self.remember_me.render(token),
            CookieDirective::ClearRememberMe => self.remember_me.render_removal(),
        }
    }

    /// Like [`apply`](Self::apply), but skips directives for cookies the
    /// response already sets. Handler decisions (a login issuing a new
    /// session cookie) override those made while resolving the request.
    pub fn apply_missing(&self, headers: &mut HeaderMap, directives: &[CookieDirective]) {
        let already_set = |spec: &CookieSpec| {
            let prefix = format!("{}=", spec.name);
            headers
                .get_all(SET_COOKIE)
                .iter()
                .any(|v| v.to_str().is_ok_and(|v| v.starts_with(&prefix)))
        };
        let pending: Vec<CookieDirective> = directives
            .iter()
            .filter(|d| !already_set(self.spec_for(d)))
            .cloned()
            .collect();
        self.apply(headers, &pending);
    }

    fn spec_for(&self, directive: &CookieDirective) -> &CookieSpec {
        match directive {
            CookieDirective::SetSession(_) | CookieDirective::ClearSession => &self.session,
            CookieDirective::SetRememberMe(_) | CookieDirective::ClearRememberMe => &self.remember_me,
        }
    }

    /// Append one `Set-Cookie` header per directive, in order.
    pub fn apply(&self, headers: &mut HeaderMap, directives: &[CookieDirective]) {
        for directive in directives {
            match self.render(directive) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(e) => warn!(error = %e, "Dropping unrenderable cookie"),
            }
        }
    }
}

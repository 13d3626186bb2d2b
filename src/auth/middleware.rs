// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Security filter middleware for Axum.
//!
//! Runs in front of every route:
//!
//! 1. reads the session and remember-me cookies
//! 2. resolves the [`Subject`](super::Subject)
//! 3. evaluates the first matching filter chain rule
//! 4. either redirects, or stores the subject in request extensions and
//!    calls the handler
//!
//! Cookie directives collected along the way are written to the response as
//! `Set-Cookie` headers.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/admin/index", get(index))
//!     .layer(axum::middleware::from_fn_with_state(state.clone(), security_filter));
//! ```

use axum::{
    extract::{Request, State},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::cookies::{CookieDirective, SecurityCookies};
use crate::filter::{evaluate, Decision, RequestContext};
use crate::state::AppState;

pub async fn security_filter(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let context = RequestContext {
        path: request.uri().path().to_string(),
        query: request.uri().query().map(str::to_string),
        host: client_host(request.headers()),
    };

    let session_id = state.cookies.session.read(request.headers());
    let remember_token = state.cookies.remember_me.read(request.headers());
    let mut subject = state
        .security
        .current_subject(session_id.as_deref(), remember_token.as_deref())
        .await;
    let mut directives = std::mem::take(&mut subject.directives);

    let decision = match state.filters.resolve(&context.path) {
        Some(rule) => evaluate(rule, &context, &subject, &state.security).await,
        // Unmatched paths pass through; startup coverage keeps deployed routes matched.
        None => Decision::Continue,
    };

    match decision {
        Decision::Continue => {
            debug!(path = %context.path, tier = ?subject.identity.tier(), "Request allowed");
            request.extensions_mut().insert(subject);
            let mut response = next.run(request).await;
            state.cookies.apply_missing(response.headers_mut(), &directives);
            response
        }
        Decision::Redirect {
            location,
            directives: decided,
        } => {
            directives.extend(decided);
            redirect(&location, &directives, &state.cookies)
        }
    }
}

/// `302 Found` to `location`, carrying cookie directives.
pub fn redirect(location: &str, directives: &[CookieDirective], cookies: &SecurityCookies) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    match HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(LOCATION, value);
        }
        Err(e) => {
            warn!(location, error = %e, "Unrepresentable redirect target");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }
    cookies.apply(response.headers_mut(), directives);
    response
}

/// Client address as reported by a fronting proxy, if any.
pub(crate) fn client_host(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

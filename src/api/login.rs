// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login and logout endpoints.
//!
//! Both answer with `302 Found`. Cookie changes decided by the security
//! manager travel as `Set-Cookie` headers on the redirect.

use axum::{
    extract::State,
    http::HeaderMap,
    response::Response,
    Form,
};

use crate::{
    auth::{
        middleware::{client_host, redirect},
        OptionalSubject,
    },
    models::{LoginRequest, UsernamePasswordToken},
    state::AppState,
};

/// Log in with a username/password form.
///
/// On success the browser is sent to the request saved before login, or to
/// the success URL. On failure it goes back to the login URL with an
/// `error` query parameter.
#[utoipa::path(
    post,
    path = "/admin/sys/login",
    tag = "Auth",
    request_body(content = LoginRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Redirect to the saved request or success URL; back to the login URL on failure")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    OptionalSubject(subject): OptionalSubject,
    headers: HeaderMap,
    Form(form): Form<LoginRequest>,
) -> Response {
    let mut token = UsernamePasswordToken::new(form.username.trim(), form.password.as_str())
        .remember_me(form.wants_remember_me());
    if let Some(host) = client_host(&headers) {
        token = token.with_host(host);
    }

    match state.security.login(&subject, &token).await {
        Ok(outcome) => redirect(&outcome.redirect_to, &outcome.directives, &state.cookies),
        Err(e) => {
            let location = login_failure_url(&state.security.urls().login_url, e.error_code());
            redirect(&location, &[], &state.cookies)
        }
    }
}

/// Log out and return to the login URL.
///
/// The `logout` filter normally answers first; this handler covers chains
/// that route the path through another filter.
#[utoipa::path(
    get,
    path = "/admin/sys/logout",
    tag = "Auth",
    responses(
        (status = 302, description = "Redirect to the login URL with both cookies cleared")
    )
)]
pub async fn logout(State(state): State<AppState>, OptionalSubject(subject): OptionalSubject) -> Response {
    let directives = state.security.logout(&subject).await;
    redirect(&state.security.urls().login_url, &directives, &state.cookies)
}

fn login_failure_url(login_url: &str, error_code: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("error", error_code)
        .finish();
    let separator = if login_url.contains('?') { '&' } else { '?' };
    format!("{login_url}{separator}{query}")
}

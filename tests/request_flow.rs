// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! End-to-end request flows through the router, the security filter and the
//! handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Request, StatusCode,
    },
    response::Response,
    Router,
};
use tower::ServiceExt;

use relational_gatekeeper::{
    api::router,
    auth::InMemoryCredentialStore,
    config::SecurityConfig,
    filter::FilterChain,
    state::AppState,
};

const SESSION_COOKIE: &str = "myBoot_SHAREJSESSIONID";
const REMEMBER_COOKIE: &str = "myBoot_rememberMe";

const ACCOUNTS: &str = r#"[
    {"principal": "alice", "salt": "a-salt", "password": "correct",
     "roles": ["admin"], "permissions": ["sys:session:list"]},
    {"principal": "bob", "salt": "b-salt", "password": "hunter2", "roles": ["viewer"]}
]"#;

fn app_with(config: SecurityConfig) -> Router {
    let store = InMemoryCredentialStore::from_json_str(ACCOUNTS).unwrap();
    let state = AppState::bootstrap_with_store(&config, Arc::new(store)).unwrap();
    router(state)
}

fn app_with_chain(definitions: &str) -> Router {
    let store = InMemoryCredentialStore::from_json_str(ACCOUNTS).unwrap();
    let mut state = AppState::bootstrap_with_store(&SecurityConfig::default(), Arc::new(store)).unwrap();
    state.filters = Arc::new(FilterChain::parse(definitions).unwrap());
    router(state)
}

fn app() -> Router {
    app_with(SecurityConfig {
        remember_me_key: Some("AAECAwQFBgcICQoLDA0ODw==".to_string()),
        ..Default::default()
    })
}

fn get(path: &str, cookies: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if !cookies.is_empty() {
        builder = builder.header(COOKIE, cookie_header(cookies));
    }
    builder.body(Body::empty()).unwrap()
}

fn login_request(form: &str, cookies: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/admin/sys/login")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if !cookies.is_empty() {
        builder = builder.header(COOKIE, cookie_header(cookies));
    }
    builder.body(Body::from(form.to_string())).unwrap()
}

fn cookie_header(cookies: &[(&str, &str)]) -> String {
    cookies
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Last value the response sets for `name`, as a browser would keep it.
fn set_cookie(response: &Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.strip_prefix(prefix.as_str()))
        .filter_map(|v| v.split(';').next())
        .last()
        .map(str::to_string)
}

fn location(response: &Response) -> &str {
    response.headers()[LOCATION].to_str().unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login_as(app: &Router, form: &str) -> Response {
    app.clone().oneshot(login_request(form, &[])).await.unwrap()
}

#[tokio::test]
async fn login_with_remember_me_sets_both_cookies() {
    let app = app();
    let response = login_as(&app, "username=alice&password=correct&rememberMe=on").await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/");
    let session = set_cookie(&response, SESSION_COOKIE).unwrap();
    assert!(!session.is_empty() && session != "deleteMe");
    let remembered = set_cookie(&response, REMEMBER_COOKIE).unwrap();
    assert_ne!(remembered, "deleteMe");

    let response = app
        .clone()
        .oneshot(get("/admin/index", &[(SESSION_COOKIE, &session)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["principal"], "alice");
    assert_eq!(body["tier"], "authenticated");
}

#[tokio::test]
async fn failed_login_returns_to_login_page_with_error() {
    let app = app();
    let response = login_as(&app, "username=alice&password=wrong").await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/login.html?error=authentication_failed");
    assert!(set_cookie(&response, SESSION_COOKIE).is_none());
}

#[tokio::test]
async fn anonymous_request_is_sent_to_login_and_returned_after() {
    let app = app();
    let response = app.clone().oneshot(get("/admin/index", &[])).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/login.html");
    let pre_login = set_cookie(&response, SESSION_COOKIE).unwrap();

    let response = app
        .clone()
        .oneshot(login_request(
            "username=alice&password=correct",
            &[(SESSION_COOKIE, &pre_login)],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/index");
    let session = set_cookie(&response, SESSION_COOKIE).unwrap();
    assert_ne!(session, pre_login);
    assert_eq!(set_cookie(&response, REMEMBER_COOKIE).as_deref(), Some("deleteMe"));

    // The pre-login session is gone.
    let response = app
        .clone()
        .oneshot(get("/admin/index", &[(SESSION_COOKIE, &pre_login)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn remembered_identity_passes_user_rules_only() {
    let app = app();
    let response = login_as(&app, "username=alice&password=correct&rememberMe=on").await;
    let remembered = set_cookie(&response, REMEMBER_COOKIE).unwrap();

    // No session cookie: a returning browser after the session is gone.
    let response = app
        .clone()
        .oneshot(get("/admin/index", &[(REMEMBER_COOKIE, &remembered)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["principal"], "alice");
    assert_eq!(body["tier"], "remembered");

    let response = app
        .clone()
        .oneshot(get("/admin/sys/sessions", &[(REMEMBER_COOKIE, &remembered)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/login.html");
}

#[tokio::test]
async fn tampered_remember_me_cookie_is_cleared() {
    let app = app();
    let response = app
        .clone()
        .oneshot(get("/admin/index", &[(REMEMBER_COOKIE, "bm90LWEtdG9rZW4=")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/login.html");
    assert_eq!(set_cookie(&response, REMEMBER_COOKIE).as_deref(), Some("deleteMe"));
}

#[tokio::test]
async fn logout_ends_session_and_clears_cookies() {
    let app = app();
    let response = login_as(&app, "username=alice&password=correct&rememberMe=on").await;
    let session = set_cookie(&response, SESSION_COOKIE).unwrap();
    let remembered = set_cookie(&response, REMEMBER_COOKIE).unwrap();

    let response = app
        .clone()
        .oneshot(get(
            "/admin/sys/logout",
            &[(SESSION_COOKIE, &session), (REMEMBER_COOKIE, &remembered)],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/login.html");
    assert_eq!(set_cookie(&response, SESSION_COOKIE).as_deref(), Some("deleteMe"));
    assert_eq!(set_cookie(&response, REMEMBER_COOKIE).as_deref(), Some("deleteMe"));

    let response = app
        .clone()
        .oneshot(get("/admin/index", &[(SESSION_COOKIE, &session)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/login.html");
}

#[tokio::test]
async fn idle_session_expires() {
    let app = app_with(SecurityConfig {
        session_timeout: Duration::from_millis(50),
        ..Default::default()
    });
    let response = login_as(&app, "username=alice&password=correct").await;
    let session = set_cookie(&response, SESSION_COOKIE).unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;

    let response = app
        .clone()
        .oneshot(get("/admin/index", &[(SESSION_COOKIE, &session)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/login.html");
}

#[tokio::test]
async fn session_stats_require_permission() {
    let app = app();

    let response = login_as(&app, "username=alice&password=correct").await;
    let alice = set_cookie(&response, SESSION_COOKIE).unwrap();
    let response = app
        .clone()
        .oneshot(get("/admin/sys/sessions", &[(SESSION_COOKIE, &alice)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["active_sessions"].as_u64().unwrap() >= 1);

    let response = login_as(&app, "username=bob&password=hunter2").await;
    let bob = set_cookie(&response, SESSION_COOKIE).unwrap();
    let response = app
        .clone()
        .oneshot(get("/admin/sys/sessions", &[(SESSION_COOKIE, &bob)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/error.html");
}

#[tokio::test]
async fn health_is_public_and_carries_request_id() {
    let app = app();
    let response = app.clone().oneshot(get("/health", &[])).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert!(set_cookie(&response, SESSION_COOKIE).is_none());
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

/// Request an odd-looking path anonymously, log in with the session that
/// carries the saved request, and return the post-login `Location`.
async fn post_login_location(app: &Router, path: &str) -> String {
    let response = app.clone().oneshot(get(path, &[])).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/login.html");
    let pre_login = set_cookie(&response, SESSION_COOKIE).unwrap();

    let response = app
        .clone()
        .oneshot(login_request(
            "username=alice&password=correct",
            &[(SESSION_COOKIE, &pre_login)],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    location(&response).to_string()
}

#[tokio::test]
async fn doubled_slash_path_returns_to_local_page_after_login() {
    let app = app();
    assert_eq!(post_login_location(&app, "//admin/index").await, "/admin/index");
}

#[tokio::test]
async fn catch_all_rule_never_replays_an_off_site_target() {
    let app = app_with_chain("/admin/sys/login = anon\n/** = authc");
    let location = post_login_location(&app, "//evil.example/steal").await;
    assert!(!location.starts_with("//"), "off-site redirect: {location}");
    assert_eq!(location, "/evil.example/steal");
}

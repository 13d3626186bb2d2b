// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer, request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, Span};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::middleware::security_filter,
    models::{LoginRequest, SessionStats, SubjectView, TrustTier},
    state::AppState,
};

pub mod admin;
pub mod health;
pub mod login;

/// Paths served by [`router`]. Startup refuses to run when any of them is not
/// covered by the filter chain.
pub const DEPLOYED_ROUTES: &[&str] = &[
    "/admin/sys/login",
    "/admin/sys/logout",
    "/admin/index",
    "/admin/sys/sessions",
    "/health",
    "/docs/",
    "/api-doc/openapi.json",
];

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/admin/sys/login", post(login::login))
        .route("/admin/sys/logout", get(login::logout))
        .route("/admin/index", get(admin::index))
        .route("/admin/sys/sessions", get(admin::sessions))
        .route("/health", get(health::health))
        .with_state(state.clone());

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(from_fn_with_state(state, security_filter))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID_HEADER),
                    |_req: &Request<Body>| HeaderValue::from_str(&uuid::Uuid::new_v4().to_string()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(REQUEST_ID_HEADER)))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(CorsLayer::permissive()),
        )
}

fn make_span(request: &Request<Body>) -> Span {
    let path = request.uri().path();
    let method = request.method().as_str();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", method, path, request_id)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        login::login,
        login::logout,
        admin::index,
        admin::sessions,
        health::health
    ),
    components(
        schemas(
            LoginRequest,
            SubjectView,
            SessionStats,
            TrustTier,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Auth", description = "Login and logout"),
        (name = "Admin", description = "Subject and session administration"),
        (name = "Health", description = "Liveness")
    )
)]
struct ApiDoc;

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin endpoints behind the `/admin/**` filter chain rules.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use crate::{
    auth::{error::SessionError, AuthError, CurrentSubject},
    error::ApiError,
    models::{SessionStats, SubjectView},
    state::AppState,
};

/// Permission required to read session statistics.
pub const SESSION_LIST_PERMISSION: &str = "sys:session:list";

/// Current subject (authenticated or remembered).
#[utoipa::path(
    get,
    path = "/admin/index",
    tag = "Admin",
    responses(
        (status = 200, description = "Current subject", body = SubjectView),
        (status = 401, description = "No identity attached to the request")
    )
)]
pub async fn index(CurrentSubject(subject): CurrentSubject) -> Json<SubjectView> {
    Json(subject.view())
}

/// Number of live sessions in the store.
#[utoipa::path(
    get,
    path = "/admin/sys/sessions",
    tag = "Admin",
    responses(
        (status = 200, description = "Session statistics", body = SessionStats),
        (status = 401, description = "No identity attached to the request"),
        (status = 403, description = "Missing sys:session:list"),
        (status = 503, description = "Session store unavailable")
    )
)]
pub async fn sessions(
    State(state): State<AppState>,
    CurrentSubject(subject): CurrentSubject,
) -> Result<Json<SessionStats>, Response> {
    state
        .security
        .check_permissions(&subject, &[SESSION_LIST_PERMISSION.to_string()])
        .await
        .map_err(AuthError::into_response)?;

    match state.security.sessions().session_count().await {
        Ok(active_sessions) => Ok(Json(SessionStats { active_sessions })),
        Err(SessionError::Store(e)) => {
            warn!(error = %e, "Session count failed");
            Err(ApiError::unavailable("Session store unavailable").into_response())
        }
        Err(e) => Err(AuthError::from(e).into_response()),
    }
}

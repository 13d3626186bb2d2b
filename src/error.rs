// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::credentials::CredentialStoreError;
use crate::auth::error::CryptoError;
use crate::config::ConfigError;
use crate::filter::RoutingError;
use crate::storage::CacheError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Startup failures. Any of these stops the process before it serves traffic.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cache initialization failed: {0}")]
    Cache(#[from] CacheError),

    #[error("credential store initialization failed: {0}")]
    Credentials(#[from] CredentialStoreError),

    #[error("remember-me key rejected: {0}")]
    RememberMeKey(#[from] CryptoError),

    #[error("filter chain rejected: {0}")]
    Routing(#[from] RoutingError),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

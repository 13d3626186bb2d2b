// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication, authorization, session and crypto errors.
//!
//! All of these are recoverable at the filter boundary: the filter chain maps
//! them to a redirect. [`AuthError`] is the aggregate used by handlers and its
//! `IntoResponse` covers API-style callers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::SessionStoreError;

#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    #[error("unknown principal: {0}")]
    UnknownPrincipal(String),

    #[error("incorrect credentials for principal: {0}")]
    IncorrectCredentials(String),

    #[error("credential store unavailable: {0}")]
    CredentialStore(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("no identity is attached to this request")]
    Unauthenticated,

    #[error("principal {principal} lacks required {required}")]
    InsufficientPermission { principal: String, required: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session expired: {0}")]
    Expired(String),

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session invalidated: {0}")]
    Invalidated(String),

    #[error("session limit of {0} reached")]
    LimitReached(usize),

    #[error("session store error: {0}")]
    Store(#[from] SessionStoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("remember-me token could not be decrypted")]
    DecryptionFailed,

    #[error("remember-me token could not be encrypted")]
    EncryptionFailed,

    #[error("cipher key must be 16, 24 or 32 bytes, got {0}")]
    InvalidKeyLength(usize),
}

/// Aggregate request-path error.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Authentication(AuthenticationError::UnknownPrincipal(_))
            | AuthError::Authentication(AuthenticationError::IncorrectCredentials(_)) => {
                "authentication_failed"
            }
            AuthError::Authentication(AuthenticationError::CredentialStore(_)) => {
                "credential_store_unavailable"
            }
            AuthError::Authorization(AuthorizationError::Unauthenticated) => "unauthenticated",
            AuthError::Authorization(AuthorizationError::InsufficientPermission { .. }) => {
                "insufficient_permission"
            }
            AuthError::Session(SessionError::Expired(_)) => "session_expired",
            AuthError::Session(SessionError::NotFound(_)) => "session_not_found",
            AuthError::Session(SessionError::Invalidated(_)) => "session_invalidated",
            AuthError::Session(SessionError::LimitReached(_)) => "session_limit_reached",
            AuthError::Session(SessionError::Store(_)) => "session_store_error",
            AuthError::Crypto(CryptoError::DecryptionFailed) => "decryption_failed",
            AuthError::Crypto(_) => "crypto_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Authentication(AuthenticationError::CredentialStore(_))
            | AuthError::Session(SessionError::Store(_))
            | AuthError::Crypto(CryptoError::EncryptionFailed)
            | AuthError::Crypto(CryptoError::InvalidKeyLength(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AuthError::Authorization(AuthorizationError::InsufficientPermission { .. }) => {
                StatusCode::FORBIDDEN
            }
            AuthError::Session(SessionError::LimitReached(_)) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Message safe to show a client. Unknown principal and wrong password
    /// read the same.
    fn public_message(&self) -> String {
        match self {
            AuthError::Authentication(AuthenticationError::UnknownPrincipal(_))
            | AuthError::Authentication(AuthenticationError::IncorrectCredentials(_)) => {
                "Invalid username or password".to_string()
            }
            AuthError::Authorization(AuthorizationError::InsufficientPermission { .. }) => {
                "Insufficient permissions for this operation".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.public_message(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn unknown_principal_returns_401_without_leaking() {
        let response =
            AuthError::from(AuthenticationError::UnknownPrincipal("mallory".into())).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "authentication_failed");
        assert!(!body["error"].as_str().unwrap().contains("mallory"));
    }

    #[tokio::test]
    async fn insufficient_permission_returns_403() {
        let response = AuthError::from(AuthorizationError::InsufficientPermission {
            principal: "alice".into(),
            required: "sys:user:list".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn session_errors_have_distinct_codes() {
        assert_eq!(
            AuthError::from(SessionError::Expired("s".into())).error_code(),
            "session_expired"
        );
        assert_eq!(
            AuthError::from(SessionError::NotFound("s".into())).error_code(),
            "session_not_found"
        );
        assert_eq!(
            AuthError::from(SessionError::Invalidated("s".into())).error_code(),
            "session_invalidated"
        );
    }

    #[test]
    fn store_failures_are_server_errors() {
        let err = AuthError::from(SessionError::from(SessionStoreError::Unavailable("down".into())));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let err = AuthError::from(AuthenticationError::CredentialStore("down".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn decryption_failure_is_unauthorized() {
        let err = AuthError::from(CryptoError::DecryptionFailed);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.error_code(), "decryption_failed");
    }
}

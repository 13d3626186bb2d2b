// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the resolved subject.
//!
//! The security filter stores the [`Subject`] in request extensions before the
//! handler runs:
//!
//! ```rust,ignore
//! async fn my_handler(CurrentSubject(subject): CurrentSubject) -> impl IntoResponse {
//!     // subject.identity is Authenticated or Remembered here
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::error::{AuthError, AuthorizationError};
use super::Subject;

/// Subject with a known identity (authenticated or remembered).
///
/// Rejects anonymous requests with `401`.
pub struct CurrentSubject(pub Subject);

impl<S: Send + Sync> FromRequestParts<S> for CurrentSubject {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Subject>() {
            Some(subject) if subject.identity.is_known() => Ok(CurrentSubject(subject.clone())),
            _ => Err(AuthorizationError::Unauthenticated.into()),
        }
    }
}

/// Subject as resolved, anonymous when the security filter did not run.
pub struct OptionalSubject(pub Subject);

impl<S: Send + Sync> FromRequestParts<S> for OptionalSubject {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalSubject(
            parts
                .extensions
                .get::<Subject>()
                .cloned()
                .unwrap_or_else(Subject::anonymous),
        ))
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request identity context.

use super::cookies::CookieDirective;
use crate::models::{Session, SubjectView, TrustTier};

/// Who is making the request, and how strongly that is established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    /// Reconstructed from a remember-me token.
    Remembered(String),
    /// Fresh credential check in the current session.
    Authenticated(String),
}

impl Identity {
    pub fn principal(&self) -> Option<&str> {
        match self {
            Identity::Anonymous => None,
            Identity::Remembered(p) | Identity::Authenticated(p) => Some(p),
        }
    }

    pub fn tier(&self) -> TrustTier {
        match self {
            Identity::Anonymous => TrustTier::Anonymous,
            Identity::Remembered(_) => TrustTier::Remembered,
            Identity::Authenticated(_) => TrustTier::Authenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated(_))
    }

    /// Authenticated or remembered.
    pub fn is_known(&self) -> bool {
        !matches!(self, Identity::Anonymous)
    }
}

/// Resolved identity plus the session it came from.
///
/// Inserted into request extensions by the security filter.
#[derive(Debug, Clone)]
pub struct Subject {
    pub identity: Identity,
    pub session: Option<Session>,
    /// Cookie changes discovered while resolving (stale session id, unusable
    /// remember-me token).
    pub directives: Vec<CookieDirective>,
}

impl Subject {
    pub fn anonymous() -> Self {
        Self {
            identity: Identity::Anonymous,
            session: None,
            directives: Vec::new(),
        }
    }

    pub fn principal(&self) -> Option<&str> {
        self.identity.principal()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }

    pub fn view(&self) -> SubjectView {
        SubjectView {
            principal: self.principal().map(str::to_string),
            tier: self.identity.tier(),
            session_id: self.session_id().map(str::to_string),
        }
    }
}

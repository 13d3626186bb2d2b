// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session lifecycle on top of a [`SessionStore`].
//!
//! ## States
//!
//! ```text
//! Active ──idle > timeout──▶ Expired ──sweep──▶ Deleted
//! Active ──invalidate─────▶ Stopped ──────────▶ Deleted
//! ```
//!
//! Expired and stopped sessions are unreachable through `touch` and the
//! attribute accessors; they can only be deleted. Session ids travel only in
//! the session cookie, never in a rewritten URL.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::SessionError;
use crate::models::Session;
use crate::storage::{SessionStore, SessionStoreError};

/// Default idle timeout: 30 minutes (1,800,000 ms).
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_millis(60 * 30 * 1000);

/// Default cap on stored sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 100_000;

/// Attempts at finding an unused id before giving up.
const MAX_ID_ATTEMPTS: usize = 3;

/// Session manager settings.
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    pub idle_timeout: Duration,
    /// Delete expired/invalidated sessions instead of only marking them.
    pub delete_invalid_sessions: bool,
    /// Stored sessions (live or awaiting the sweep) before `start` refuses.
    pub max_sessions: usize,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_SESSION_TIMEOUT,
            delete_invalid_sessions: true,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: SessionManagerConfig,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: SessionManagerConfig) -> Self {
        Self { store, config }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.config.idle_timeout
    }

    /// Create and persist a new session.
    pub async fn start(&self, host: Option<String>) -> Result<Session, SessionError> {
        if self.store.count().await? >= self.config.max_sessions {
            warn!(limit = self.config.max_sessions, "Session limit reached, refusing new session");
            return Err(SessionError::LimitReached(self.config.max_sessions));
        }
        for _ in 0..MAX_ID_ATTEMPTS {
            let session = Session::new(
                Uuid::new_v4().to_string(),
                host.clone(),
                self.config.idle_timeout,
                Utc::now(),
            );
            match self.store.create(session.clone()).await {
                Ok(()) => {
                    debug!(session_id = %session.id, host = ?session.host, "Session started");
                    return Ok(session);
                }
                Err(SessionStoreError::DuplicateId(id)) => {
                    warn!(session_id = %id, "Session id collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(SessionError::Store(SessionStoreError::Unavailable(
            "could not allocate a unique session id".to_string(),
        )))
    }

    /// Record activity on a live session.
    ///
    /// # Errors
    /// - `NotFound` if no record exists
    /// - `Invalidated` if the session was stopped
    /// - `Expired` if it has been idle longer than its timeout
    pub async fn touch(&self, id: &str) -> Result<Session, SessionError> {
        let mut session = self.live(id).await?;
        session.last_access_at = Utc::now();
        self.save(session).await
    }

    /// Read a live session without recording activity.
    pub async fn get(&self, id: &str) -> Result<Session, SessionError> {
        self.live(id).await
    }

    /// Stop a session regardless of its idle state.
    pub async fn invalidate(&self, id: &str) -> Result<(), SessionError> {
        if self.config.delete_invalid_sessions {
            let existed = self.store.delete(id).await?;
            debug!(session_id = %id, existed, "Session invalidated");
            return Ok(());
        }

        match self.store.read(id).await? {
            Some(mut session) if !session.is_stopped() => {
                session.stopped_at = Some(Utc::now());
                self.store.update(session).await?;
                debug!(session_id = %id, "Session stopped");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Bind an authenticated principal to a live session.
    pub async fn bind_principal(&self, id: &str, principal: &str) -> Result<Session, SessionError> {
        let mut session = self.live(id).await?;
        session.principal = Some(principal.to_string());
        session.authenticated = true;
        session.last_access_at = Utc::now();
        self.save(session).await
    }

    pub async fn set_attribute(
        &self,
        id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<Session, SessionError> {
        let mut session = self.live(id).await?;
        session.attributes.insert(key.to_string(), value);
        self.save(session).await
    }

    /// Remove an attribute and return its previous value.
    pub async fn take_attribute(
        &self,
        id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, SessionError> {
        let mut session = self.live(id).await?;
        let value = session.attributes.remove(key);
        if value.is_some() {
            self.save(session).await?;
        }
        Ok(value)
    }

    /// One validation pass: delete (or stop) every session past its deadline.
    ///
    /// Each record is handled individually so request-path operations are
    /// never blocked for the length of the pass.
    pub async fn validate_sessions(&self) -> Result<usize, SessionError> {
        let now = Utc::now();
        let candidates = self.store.scan_expired(now).await?;
        let mut reclaimed = 0;

        for id in &candidates {
            let result = if self.config.delete_invalid_sessions {
                self.store.delete_if_expired(id, now).await
            } else {
                self.mark_stopped(id).await
            };
            match result {
                Ok(true) => reclaimed += 1,
                Ok(false) => {}
                Err(e) => warn!(session_id = %id, error = %e, "Failed to reclaim session"),
            }
        }

        if reclaimed > 0 {
            info!(reclaimed, scanned = candidates.len(), "Session validation pass complete");
        }
        Ok(reclaimed)
    }

    /// Number of records in the store, live or not yet reclaimed.
    pub async fn session_count(&self) -> Result<usize, SessionError> {
        Ok(self.store.count().await?)
    }

    async fn mark_stopped(&self, id: &str) -> Result<bool, SessionStoreError> {
        match self.store.read(id).await? {
            Some(mut session) if !session.is_stopped() => {
                session.stopped_at = Some(Utc::now());
                self.store.update(session).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn live(&self, id: &str) -> Result<Session, SessionError> {
        let session = self
            .store
            .read(id)
            .await?
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        if session.is_stopped() {
            return Err(SessionError::Invalidated(id.to_string()));
        }
        if session.is_expired_at(Utc::now()) {
            return Err(SessionError::Expired(id.to_string()));
        }
        Ok(session)
    }

    async fn save(&self, session: Session) -> Result<Session, SessionError> {
        match self.store.update(session.clone()).await {
            Ok(()) => Ok(session),
            // Deleted concurrently (logout or sweep).
            Err(SessionStoreError::NotFound(id)) => Err(SessionError::NotFound(id)),
            // Stopped concurrently (logout without deletion).
            Err(SessionStoreError::Stopped(id)) => Err(SessionError::Invalidated(id)),
            Err(e) => Err(e.into()),
        }
    }
}

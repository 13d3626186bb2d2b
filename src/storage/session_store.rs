// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session record storage.
//!
//! The store is a single logical key-value service. Every operation touches
//! one key and takes the lock only for that operation, so the validation
//! sweep never blocks request-path reads and writes for longer than a single
//! delete.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::Session;

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session id already exists: {0}")]
    DuplicateId(String),

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session already stopped: {0}")]
    Stopped(String),

    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// CRUD + expiry scan over session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new record. Fails if the id is already present.
    async fn create(&self, session: Session) -> Result<(), SessionStoreError>;

    async fn read(&self, id: &str) -> Result<Option<Session>, SessionStoreError>;

    /// Replace an existing record. Fails if the id is absent, or with
    /// `Stopped` if the stored record is stopped and the new one is not.
    async fn update(&self, session: Session) -> Result<(), SessionStoreError>;

    /// Remove a record. Returns whether it existed.
    async fn delete(&self, id: &str) -> Result<bool, SessionStoreError>;

    /// Ids of records that are expired or stopped at `now`.
    async fn scan_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>, SessionStoreError>;

    /// Delete `id` only if it is still expired or stopped at `now`.
    ///
    /// Guards against deleting a session that was touched between the scan
    /// and the delete.
    async fn delete_if_expired(&self, id: &str, now: DateTime<Utc>) -> Result<bool, SessionStoreError>;

    async fn count(&self) -> Result<usize, SessionStoreError>;
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: Session) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(SessionStoreError::DuplicateId(session.id));
        }
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn read(&self, id: &str) -> Result<Option<Session>, SessionStoreError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn update(&self, session: Session) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.id) {
            // A stale copy read before the stop must not revive the session.
            Some(existing) if existing.is_stopped() && !session.is_stopped() => {
                Err(SessionStoreError::Stopped(session.id))
            }
            Some(existing) => {
                *existing = session;
                Ok(())
            }
            None => Err(SessionStoreError::NotFound(session.id)),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, SessionStoreError> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }

    async fn scan_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>, SessionStoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|s| !s.is_valid_at(now))
            .map(|s| s.id.clone())
            .collect())
    }

    async fn delete_if_expired(&self, id: &str, now: DateTime<Utc>) -> Result<bool, SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        let expired = sessions.get(id).is_some_and(|s| !s.is_valid_at(now));
        if expired {
            sessions.remove(id);
        }
        Ok(expired)
    }

    async fn count(&self) -> Result<usize, SessionStoreError> {
        Ok(self.sessions.read().await.len())
    }
}

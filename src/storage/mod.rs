// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! In-process backing stores used by the security layer:
//!
//! - `cache` - TTL-bounded LRU regions for realm facts
//! - `session_store` - session records behind the [`SessionStore`] trait
//!
//! Both are safe under concurrent access. Neither holds a lock across an
//! `.await` on another component.

pub mod cache;
pub mod session_store;

pub use cache::{Cache, CacheError, TtlCache, AUTHENTICATION_CACHE, AUTHORIZATION_CACHE};
pub use session_store::{InMemorySessionStore, SessionStore, SessionStoreError};

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Credential verification, sessions and remembered identities.
//!
//! ## Auth Flow
//!
//! 1. The security filter reads the session and remember-me cookies
//! 2. [`SecurityManager::current_subject`] resolves the identity:
//!    - live authenticated session → `Authenticated`
//!    - decryptable remember-me token → `Remembered`
//!    - otherwise `Anonymous`
//! 3. The matching filter chain rule decides: continue, or redirect to the
//!    login / unauthorized URL
//! 4. Handlers read the resolved [`Subject`] through the extractors
//!
//! ## Security
//!
//! - Credentials are HMAC-SHA256 hashed with a per-account salt and compared
//!   in constant time
//! - Remember-me tokens are AES-GCM sealed; any decryption failure means
//!   "not remembered"
//! - Session ids travel only in the session cookie
//! - A successful login always gets a fresh session id

pub mod cookies;
pub mod credentials;
pub mod error;
pub mod extractor;
pub mod manager;
pub mod middleware;
pub mod realm;
pub mod remember_me;
pub mod session;
pub mod subject;
pub mod sweeper;

pub use cookies::{CookieDirective, CookieSpec};
pub use credentials::{CredentialStore, InMemoryCredentialStore};
pub use error::AuthError;
pub use extractor::{CurrentSubject, OptionalSubject};
pub use manager::{LoginOutcome, SecurityManager, SecurityUrls};
pub use realm::Realm;
pub use remember_me::RememberMeCodec;
pub use session::{SessionManager, SessionManagerConfig};
pub use subject::{Identity, Subject};
pub use sweeper::{SessionValidationScheduler, SweeperHandle};

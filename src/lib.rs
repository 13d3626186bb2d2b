// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Gatekeeper - request-time authentication and authorization
//!
//! Decides for every inbound HTTP request whether it may proceed, must
//! authenticate first, or is refused.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers and the router (Axum)
//! - `auth` - realm, sessions, remember-me cookies and the security manager
//! - `filter` - ordered URL pattern rules and filter evaluation
//! - `storage` - in-process caches and the session store

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod state;
pub mod storage;
pub mod telemetry;

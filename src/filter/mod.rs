// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Filter Chain
//!
//! Ordered `pattern = filters` rules gating every request.
//!
//! ## Definition format
//!
//! ```text
//! # comment
//! /admin/sys/logout   = logout
//! /admin/sys/sessions = authc, perms[sys:session:list]
//! /admin/**           = authc
//! /statics/**         = anon
//! ```
//!
//! Rules are tried in declaration order and the first matching pattern wins;
//! specificity plays no part. Declaring the same pattern twice is a load
//! error.
//!
//! ## Filters
//!
//! | filter | passes when | otherwise |
//! |--------|-------------|-----------|
//! | `anon` | always | |
//! | `authc` | authenticated, or the request is for the login URL | save request, redirect to login |
//! | `user` | authenticated or remembered | save request, redirect to login |
//! | `logout` | never | end session, clear cookies, redirect to login |
//! | `perms[..]` | every listed permission is held | login if anonymous, else unauthorized URL |
//! | `roles[..]` | every listed role is held | login if anonymous, else unauthorized URL |

pub mod ant;
pub mod chain;
pub mod definition;
pub mod evaluate;

pub use ant::AntPattern;
pub use chain::{FilterChain, FilterChainRule, DEFAULT_FILTER_CHAIN};
pub use definition::{FilterKind, FilterSpec};
pub use evaluate::{evaluate, Decision, RequestContext};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("no filter chain rule matches deployed path {0}")]
    NoMatchingRule(String),

    #[error("pattern {pattern} declared twice (line {first_line} and line {second_line})")]
    DuplicatePattern {
        pattern: String,
        first_line: usize,
        second_line: usize,
    },

    #[error("invalid pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("unknown filter '{name}' on line {line}")]
    UnknownFilter { name: String, line: usize },

    #[error("malformed definition on line {line}: {reason}")]
    MalformedDefinition { line: usize, reason: String },

    #[error("failed to read filter chain definitions from {path}: {reason}")]
    Read { path: String, reason: String },
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ant-style path patterns.
//!
//! - `?` matches one character inside a segment
//! - `*` matches zero or more characters inside a segment
//! - `**` matches zero or more whole segments
//!
//! `/admin/**` therefore matches `/admin`, `/admin/` and `/admin/sys/login`.

use std::fmt;

use super::RoutingError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// `**`
    AnyDepth,
    /// Literal or wildcard segment (`*`, `?` inside).
    Part(String),
}

/// Compiled ant-style pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AntPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl AntPattern {
    /// Compile a pattern.
    ///
    /// # Errors
    /// `InvalidPattern` if the pattern does not start with `/` or mixes `**`
    /// with other characters inside one segment.
    pub fn parse(raw: &str) -> Result<Self, RoutingError> {
        let raw = raw.trim();
        if !raw.starts_with('/') {
            return Err(RoutingError::InvalidPattern {
                pattern: raw.to_string(),
                reason: "must start with '/'".to_string(),
            });
        }

        let mut segments = Vec::new();
        for part in split_path(raw) {
            if part == "**" {
                // Consecutive `**` collapse into one.
                if segments.last() != Some(&Segment::AnyDepth) {
                    segments.push(Segment::AnyDepth);
                }
            } else if part.contains("**") {
                return Err(RoutingError::InvalidPattern {
                    pattern: raw.to_string(),
                    reason: format!("'**' must be a whole segment, found '{part}'"),
                });
            } else {
                segments.push(Segment::Part(part.to_string()));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `path` matches this pattern. Query strings must already be stripped.
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = split_path(path).collect();
        match_segments(&self.segments, &parts)
    }
}

impl fmt::Display for AntPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            // Try every possible number of consumed segments.
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((Segment::Part(part), rest)) => match path.split_first() {
            Some((first, remaining)) => {
                match_wildcards(part.as_bytes(), first.as_bytes()) && match_segments(rest, remaining)
            }
            None => false,
        },
    }
}

/// `*` / `?` matching within one segment.
fn match_wildcards(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == b'*')
}

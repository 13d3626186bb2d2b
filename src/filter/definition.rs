// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Parsing of `pattern = filter, filter[param, param]` lines.

use std::fmt;

use super::RoutingError;

/// One filter in a rule's list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKind {
    Anon,
    Authc,
    User,
    Logout,
    Perms(Vec<String>),
    Roles(Vec<String>),
}

impl FilterKind {
    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::Anon => "anon",
            FilterKind::Authc => "authc",
            FilterKind::User => "user",
            FilterKind::Logout => "logout",
            FilterKind::Perms(_) => "perms",
            FilterKind::Roles(_) => "roles",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterKind::Perms(params) | FilterKind::Roles(params) => {
                write!(f, "{}[{}]", self.name(), params.join(","))
            }
            _ => f.write_str(self.name()),
        }
    }
}

/// Parsed filter list of one rule.
pub type FilterSpec = Vec<FilterKind>;

/// A raw `(line, pattern, filters)` triple before pattern compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Definition {
    pub line: usize,
    pub pattern: String,
    pub filters: FilterSpec,
}

/// Parse a whole definitions document. Blank lines and `#` comments
/// (whole-line or trailing) are skipped.
pub(crate) fn parse_definitions(text: &str) -> Result<Vec<Definition>, RoutingError> {
    let mut definitions = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let content = raw.split_once('#').map_or(raw, |(before, _)| before).trim();
        if content.is_empty() {
            continue;
        }

        let (pattern, filters) = content
            .split_once('=')
            .ok_or_else(|| RoutingError::MalformedDefinition {
                line,
                reason: "expected 'pattern = filters'".to_string(),
            })?;
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(RoutingError::MalformedDefinition {
                line,
                reason: "missing pattern".to_string(),
            });
        }

        definitions.push(Definition {
            line,
            pattern: pattern.to_string(),
            filters: parse_filters(filters, line)?,
        });
    }
    Ok(definitions)
}

/// Parse `authc, perms[a,b]` into filter kinds.
pub(crate) fn parse_filters(text: &str, line: usize) -> Result<FilterSpec, RoutingError> {
    let filters = split_top_level(text, line)?
        .into_iter()
        .map(|token| parse_filter(token, line))
        .collect::<Result<FilterSpec, _>>()?;

    if filters.is_empty() {
        return Err(RoutingError::MalformedDefinition {
            line,
            reason: "no filters listed".to_string(),
        });
    }
    Ok(filters)
}

fn parse_filter(token: &str, line: usize) -> Result<FilterKind, RoutingError> {
    let (name, params) = match token.split_once('[') {
        Some((name, rest)) => {
            let inner = rest
                .strip_suffix(']')
                .ok_or_else(|| RoutingError::MalformedDefinition {
                    line,
                    reason: format!("unterminated parameters in '{token}'"),
                })?;
            (name.trim(), Some(parse_params(inner)))
        }
        None => (token, None),
    };

    let kind = match (name, params) {
        ("anon", None) => FilterKind::Anon,
        ("authc", None) => FilterKind::Authc,
        ("user", None) => FilterKind::User,
        ("logout", None) => FilterKind::Logout,
        ("perms", Some(params)) => FilterKind::Perms(non_empty(params, token, line)?),
        ("roles", Some(params)) => FilterKind::Roles(non_empty(params, token, line)?),
        ("anon" | "authc" | "user" | "logout", Some(_)) => {
            return Err(RoutingError::MalformedDefinition {
                line,
                reason: format!("'{name}' takes no parameters"),
            })
        }
        ("perms" | "roles", None) => {
            return Err(RoutingError::MalformedDefinition {
                line,
                reason: format!("'{name}' requires parameters"),
            })
        }
        (other, _) => {
            return Err(RoutingError::UnknownFilter {
                name: other.to_string(),
                line,
            })
        }
    };
    Ok(kind)
}

fn parse_params(inner: &str) -> Vec<String> {
    inner
        .split(',')
        .map(|p| p.trim().trim_matches('"').trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(params: Vec<String>, token: &str, line: usize) -> Result<Vec<String>, RoutingError> {
    if params.is_empty() {
        return Err(RoutingError::MalformedDefinition {
            line,
            reason: format!("empty parameter list in '{token}'"),
        });
    }
    Ok(params)
}

/// Split on commas that are not inside `[...]`.
fn split_top_level(text: &str, line: usize) -> Result<Vec<&str>, RoutingError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1).ok_or_else(|| RoutingError::MalformedDefinition {
                    line,
                    reason: "unbalanced ']'".to_string(),
                })?
            }
            ',' if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(RoutingError::MalformedDefinition {
            line,
            reason: "unbalanced '['".to_string(),
        });
    }
    parts.push(text[start..].trim());

    Ok(parts.into_iter().filter(|p| !p.is_empty()).collect())
}

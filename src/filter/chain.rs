// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ordered rule table.

use std::path::Path;

use tracing::{debug, info};

use super::ant::AntPattern;
use super::definition::{parse_definitions, parse_filters, Definition, FilterSpec};
use super::RoutingError;

/// Built-in rules, used when no definitions file is configured.
///
/// `/admin/sys/logout` is declared once. A second `anon` declaration of the
/// same pattern would be rejected by [`FilterChain::parse`].
pub const DEFAULT_FILTER_CHAIN: &str = "\
/admin/sys/logout   = logout
/admin/index        = user
/admin/captcha.jpg  = anon
/admin/sys/login    = anon
/admin/sys/sessions = authc, perms[sys:session:list]
/admin/**           = authc
/share/qrcode       = anon
/statics/**         = anon
/health             = anon
/docs/**            = anon
/api-doc/**         = anon
/error.html         = anon
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChainRule {
    pub pattern: AntPattern,
    pub filters: FilterSpec,
    /// Declaration position (1-based line or entry number).
    pub line: usize,
}

/// Rules in declaration order.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    rules: Vec<FilterChainRule>,
}

impl FilterChain {
    /// Parse a definitions document.
    ///
    /// # Errors
    /// Any malformed line, unknown filter, invalid pattern, or a pattern
    /// declared more than once.
    pub fn parse(text: &str) -> Result<Self, RoutingError> {
        Self::from_definitions(parse_definitions(text)?)
    }

    /// Load definitions from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RoutingError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| RoutingError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let chain = Self::parse(&text)?;
        info!(path = %path.display(), rules = chain.len(), "Loaded filter chain definitions");
        Ok(chain)
    }

    /// Build from `(pattern, filters)` pairs, numbered from 1.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self, RoutingError> {
        let definitions = pairs
            .into_iter()
            .enumerate()
            .map(|(index, (pattern, filters))| {
                Ok(Definition {
                    line: index + 1,
                    pattern: pattern.trim().to_string(),
                    filters: parse_filters(filters, index + 1)?,
                })
            })
            .collect::<Result<Vec<_>, RoutingError>>()?;
        Self::from_definitions(definitions)
    }

    fn from_definitions(definitions: Vec<Definition>) -> Result<Self, RoutingError> {
        let mut chain = Self::default();
        for definition in definitions {
            chain.push(definition)?;
        }
        Ok(chain)
    }

    fn push(&mut self, definition: Definition) -> Result<(), RoutingError> {
        let pattern = AntPattern::parse(&definition.pattern)?;
        if let Some(existing) = self.rules.iter().find(|r| r.pattern == pattern) {
            return Err(RoutingError::DuplicatePattern {
                pattern: pattern.to_string(),
                first_line: existing.line,
                second_line: definition.line,
            });
        }
        self.rules.push(FilterChainRule {
            pattern,
            filters: definition.filters,
            line: definition.line,
        });
        Ok(())
    }

    pub fn rules(&self) -> &[FilterChainRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule whose pattern matches `path`.
    pub fn resolve(&self, path: &str) -> Option<&FilterChainRule> {
        let rule = self.rules.iter().find(|rule| rule.pattern.matches(path));
        if rule.is_none() {
            debug!(path, "No filter chain rule matches");
        }
        rule
    }

    /// Fail unless every deployed path resolves to some rule.
    pub fn require_coverage<'a>(&self, paths: impl IntoIterator<Item = &'a str>) -> Result<(), RoutingError> {
        for path in paths {
            if !self.rules.iter().any(|rule| rule.pattern.matches(path)) {
                return Err(RoutingError::NoMatchingRule(path.to_string()));
            }
        }
        Ok(())
    }
}

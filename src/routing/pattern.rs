//! Route pattern compilation and matching.
//!
//! # Responsibilities
//! - Compile Express-style patterns (`/work/:spot/`) into segment matchers
//! - Extract named parameters in declaration order
//! - Cache compiled patterns per distinct pattern string
//!
//! # Design Decisions
//! - No regex: a pattern is a list of literal and parameter segments
//! - Literal segments compare ASCII case-insensitively
//! - Trailing slash is optional on both sides, so `/work` and `/work/`
//!   match the same patterns
//! - A parameter captures exactly one non-empty segment

use std::sync::Arc;

use dashmap::DashMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Errors raised while compiling a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl PatternError {
    fn invalid(pattern: &str, reason: impl Into<String>) -> Self {
        PatternError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Parameters captured by a successful match, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    /// Look up a captured value by parameter name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// A compiled route pattern. Pure function of its source string.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    segments: Vec<Segment>,
    param_names: Vec<String>,
}

impl CompiledPattern {
    /// Compile a pattern string.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let rest = pattern
            .strip_prefix('/')
            .ok_or_else(|| PatternError::invalid(pattern, "must start with '/'"))?;

        if let Some(c) = rest.chars().find(|c| matches!(c, '*' | '(' | ')' | '?' | '#')) {
            return Err(PatternError::invalid(
                pattern,
                format!("unsupported character '{}'", c),
            ));
        }

        let mut segments = Vec::new();
        let mut param_names: Vec<String> = Vec::new();

        for raw in split_segments(rest) {
            if raw.is_empty() {
                return Err(PatternError::invalid(pattern, "empty path segment"));
            }
            match raw.strip_prefix(':') {
                Some(name) => {
                    if name.is_empty()
                        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                    {
                        return Err(PatternError::invalid(
                            pattern,
                            format!("invalid parameter name ':{}'", name),
                        ));
                    }
                    if param_names.iter().any(|n| n == name) {
                        return Err(PatternError::invalid(
                            pattern,
                            format!("duplicate parameter ':{}'", name),
                        ));
                    }
                    param_names.push(name.to_string());
                    segments.push(Segment::Param(name.to_string()));
                }
                None => segments.push(Segment::Literal(raw.to_string())),
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
            param_names,
        })
    }

    /// Test a request path (no query string) and capture parameters.
    pub fn match_path(&self, path: &str) -> Option<Params> {
        let rest = path.strip_prefix('/').unwrap_or(path);
        let parts: Vec<&str> = split_segments(rest).collect();

        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = Vec::with_capacity(self.param_names.len());
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) => {
                    if !lit.eq_ignore_ascii_case(part) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.push((name.clone(), part.to_string()));
                }
            }
        }

        Some(Params(params))
    }

    /// Parameter names in declaration order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Split the part after the leading slash, dropping one trailing slash.
/// The root path yields no segments.
fn split_segments(rest: &str) -> impl Iterator<Item = &str> {
    let trimmed = rest.strip_suffix('/').unwrap_or(rest);
    let mut parts = trimmed.split('/');
    if trimmed.is_empty() {
        // consume the single empty piece `split` yields for ""
        parts.next();
    }
    parts
}

/// Process-wide cache of compiled patterns, keyed by pattern string.
#[derive(Debug, Clone, Default)]
pub struct PatternCache {
    inner: Arc<DashMap<String, Arc<CompiledPattern>>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a compiled pattern, compiling and storing it on first use.
    pub fn get_or_compile(&self, pattern: &str) -> Result<Arc<CompiledPattern>, PatternError> {
        if let Some(hit) = self.inner.get(pattern) {
            return Ok(hit.value().clone());
        }
        let compiled = Arc::new(CompiledPattern::compile(pattern)?);
        self.inner.insert(pattern.to_string(), compiled.clone());
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

//! Route lookup.
//!
//! # Responsibilities
//! - Turn route declarations into compiled routes
//! - Look up the first route matching a request path
//! - Return the matched route or an explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in declaration order, first match wins, no backtracking
//! - Invalid declarations abort loading under `LoadPolicy::Strict` and are
//!   skipped with a warning under `LoadPolicy::Lenient`

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::config::schema::RouteDefinition;
use crate::config::Mode;
use crate::routing::pattern::{CompiledPattern, Params, PatternCache, PatternError};

/// Layout used when a route does not name one.
pub const DEFAULT_LAYOUT: &str = "default";

/// Errors raised while loading route declarations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("invalid route '{name}': {reason}")]
    InvalidRoute { name: String, reason: String },

    #[error("invalid route '{0}': name declared more than once")]
    DuplicateName(String),

    #[error(transparent)]
    InvalidPattern(#[from] PatternError),
}

/// A validated route declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub name: String,
    pub path: String,
    pub template: String,
    pub layout: String,
}

impl Route {
    /// Apply defaults: template falls back to the name, layout to `default`.
    pub fn from_definition(definition: &RouteDefinition) -> Result<Self, RouteError> {
        let invalid = |reason: &str| RouteError::InvalidRoute {
            name: definition.name.clone(),
            reason: reason.to_string(),
        };

        if definition.name.trim().is_empty() {
            return Err(invalid("route name is empty"));
        }
        let path = match definition.path.as_deref() {
            Some(p) if !p.trim().is_empty() => p.to_string(),
            _ => return Err(invalid("missing path")),
        };

        Ok(Self {
            name: definition.name.clone(),
            path,
            template: definition
                .template
                .clone()
                .unwrap_or_else(|| definition.name.clone()),
            layout: definition
                .layout
                .clone()
                .unwrap_or_else(|| DEFAULT_LAYOUT.to_string()),
        })
    }
}

/// What to do with a declaration that fails to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Abort loading and report every error.
    Strict,
    /// Log and skip the bad entry.
    Lenient,
}

impl From<Mode> for LoadPolicy {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Debug => LoadPolicy::Strict,
            Mode::Production => LoadPolicy::Lenient,
        }
    }
}

#[derive(Debug)]
struct CompiledRoute {
    route: Route,
    pattern: Arc<CompiledPattern>,
}

/// A successful resolution.
#[derive(Debug, Clone, Serialize)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: Params,
}

/// Ordered, immutable route set.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<CompiledRoute>,
}

impl Router {
    /// Build a router from declarations, compiling patterns through `cache`.
    pub fn from_definitions<'a, I>(
        definitions: I,
        cache: &PatternCache,
        policy: LoadPolicy,
    ) -> Result<Self, Vec<RouteError>>
    where
        I: IntoIterator<Item = &'a RouteDefinition>,
    {
        let mut routes = Vec::new();
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for definition in definitions {
            let compiled = if !seen.insert(definition.name.clone()) {
                Err(RouteError::DuplicateName(definition.name.clone()))
            } else {
                Route::from_definition(definition).and_then(|route| {
                    let pattern = cache.get_or_compile(&route.path)?;
                    Ok(CompiledRoute { route, pattern })
                })
            };

            match compiled {
                Ok(route) => routes.push(route),
                Err(e) => match policy {
                    LoadPolicy::Strict => errors.push(e),
                    LoadPolicy::Lenient => {
                        tracing::warn!(route = %definition.name, error = %e, "Skipping route");
                    }
                },
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        tracing::debug!(count = routes.len(), "Routes compiled");
        Ok(Self { routes })
    }

    /// Find the first route matching `request_path`.
    ///
    /// Any query string or fragment is stripped before matching.
    pub fn resolve(&self, request_path: &str) -> Option<RouteMatch<'_>> {
        let path = strip_query(request_path);
        self.routes.iter().find_map(|compiled| {
            compiled.pattern.match_path(path).map(|params| RouteMatch {
                route: &compiled.route,
                params,
            })
        })
    }

    /// Routes in declaration order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().map(|c| &c.route)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Remove the query string and fragment from a request target.
pub fn strip_query(target: &str) -> &str {
    let end = target.find(['?', '#']).unwrap_or(target.len());
    &target[..end]
}

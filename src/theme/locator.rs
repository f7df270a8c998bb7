//! Template, layout and component locator.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::config::ThemeConfig;

/// What kind of file a logical name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Template,
    Layout,
    Component,
}

impl Kind {
    /// Subdirectory of a theme root holding files of this kind.
    pub fn dir(self) -> &'static str {
        match self {
            Kind::Template => "templates",
            Kind::Layout => "layouts",
            Kind::Component => "components",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Template => "template",
            Kind::Layout => "layout",
            Kind::Component => "component",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which root a file was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Child,
    Parent,
    Fallback,
}

/// Errors raised while locating theme files.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocateError {
    #[error("path traversal rejected for {kind} '{name}'")]
    PathTraversalRejected { kind: Kind, name: String },

    #[error("The file for the template {0} does not exist")]
    TemplateNotFound(String),

    #[error("The file for the layout {0} does not exist")]
    LayoutNotFound(String),

    #[error("The file for the component {0} does not exist")]
    ComponentNotFound(String),
}

impl LocateError {
    fn not_found(kind: Kind, name: &str) -> Self {
        match kind {
            Kind::Template => LocateError::TemplateNotFound(name.to_string()),
            Kind::Layout => LocateError::LayoutNotFound(name.to_string()),
            Kind::Component => LocateError::ComponentNotFound(name.to_string()),
        }
    }
}

/// A resolved logical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateReference {
    pub logical_name: String,
    pub kind: Kind,
    pub physical_path: PathBuf,
    pub layer: Layer,
}

/// Ordered theme roots: child, parent, fallback.
#[derive(Debug, Clone)]
pub struct ThemeRoots {
    roots: Vec<(Layer, PathBuf)>,
    extension: String,
}

impl ThemeRoots {
    pub fn new(roots: Vec<(Layer, PathBuf)>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            roots,
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn from_config(config: &ThemeConfig) -> Self {
        let mut roots = Vec::with_capacity(3);
        if let Some(child) = &config.child_root {
            roots.push((Layer::Child, child.clone()));
        }
        roots.push((Layer::Parent, config.parent_root.clone()));
        if let Some(fallback) = &config.fallback_root {
            roots.push((Layer::Fallback, fallback.clone()));
        }
        Self::new(roots, config.extension.as_str())
    }

    /// Base theme root, used for shared style files.
    pub fn parent_root(&self) -> Option<&Path> {
        self.roots
            .iter()
            .find(|(layer, _)| *layer == Layer::Parent)
            .map(|(_, p)| p.as_path())
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Search the roots without memoization.
    pub fn probe(&self, name: &str, kind: Kind) -> Result<TemplateReference, LocateError> {
        let clean = sanitize_name(name, kind)?;
        let relative = format!("{}/{}.{}", kind.dir(), clean, self.extension);

        for (layer, root) in &self.roots {
            let candidate = root.join(&relative);
            if candidate.is_file() {
                return Ok(TemplateReference {
                    logical_name: clean.to_string(),
                    kind,
                    physical_path: candidate,
                    layer: *layer,
                });
            }
        }

        Err(LocateError::not_found(kind, clean))
    }
}

/// Reject names that could escape the theme roots.
///
/// Leading slashes are trimmed; any `..` segment, empty name or NUL byte is
/// refused before the filesystem is touched.
fn sanitize_name(name: &str, kind: Kind) -> Result<&str, LocateError> {
    let trimmed = name.trim_start_matches(['/', '\\']);
    let traversal = trimmed.split(['/', '\\']).any(|segment| segment == "..");

    if traversal || trimmed.contains('\0') || Path::new(trimmed).is_absolute() {
        return Err(LocateError::PathTraversalRejected {
            kind,
            name: name.to_string(),
        });
    }
    if trimmed.is_empty() {
        return Err(LocateError::not_found(kind, name));
    }
    Ok(trimmed)
}

/// Per-request memo of locator results, negative ones included.
#[derive(Debug, Default)]
pub struct RequestLocator {
    entries: HashMap<(Kind, String), Result<TemplateReference, LocateError>>,
    probes: usize,
}

impl RequestLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `name`, probing the filesystem at most once per request.
    pub fn locate(
        &mut self,
        roots: &ThemeRoots,
        name: &str,
        kind: Kind,
    ) -> Result<TemplateReference, LocateError> {
        let key = (kind, name.to_string());
        if let Some(cached) = self.entries.get(&key) {
            return cached.clone();
        }
        self.probes += 1;
        let result = roots.probe(name, kind);
        self.entries.insert(key, result.clone());
        result
    }

    /// Number of filesystem probes performed so far.
    pub fn probes(&self) -> usize {
        self.probes
    }
}

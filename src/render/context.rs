//! Request-scoped render state.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::styles::StyleError;
use crate::theme::{Kind, LocateError, RequestLocator, TemplateReference, ThemeRoots};

/// Maximum component nesting before rendering is aborted.
pub const MAX_COMPONENT_DEPTH: usize = 32;

/// Errors that abort a page render.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error("failed to render {name}: {message}")]
    Template { name: String, message: String },

    #[error(transparent)]
    Style(#[from] StyleError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("component '{0}' nests too deeply")]
    TooDeep(String),
}

/// A compiled style contributed by one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedStyle {
    pub source_key: String,
    pub css: String,
}

/// A script contributed by one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedScript {
    pub source_key: String,
    /// Logical component name, used for generated file names.
    pub name: String,
    pub text: String,
}

/// Everything one request accumulates while rendering.
///
/// Created empty for every request and dropped when the response is built,
/// so dedup state never leaks between requests.
#[derive(Debug, Default)]
pub struct RenderContext {
    locator: RequestLocator,
    emitted_styles: HashSet<String>,
    emitted_scripts: HashSet<String>,
    styles: Vec<CollectedStyle>,
    scripts: Vec<CollectedScript>,
    fatal: Option<RenderError>,
}

/// Handle shared between the nested template functions of one request.
pub type SharedContext = Arc<Mutex<RenderContext>>;

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedContext {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn locate(
        &mut self,
        roots: &ThemeRoots,
        name: &str,
        kind: Kind,
    ) -> Result<TemplateReference, LocateError> {
        self.locator.locate(roots, name, kind)
    }

    /// Mark the styles of `source_key` as emitted. False if already claimed.
    pub fn claim_styles(&mut self, source_key: &str) -> bool {
        self.emitted_styles.insert(source_key.to_string())
    }

    /// Mark the scripts of `source_key` as emitted. False if already claimed.
    pub fn claim_scripts(&mut self, source_key: &str) -> bool {
        self.emitted_scripts.insert(source_key.to_string())
    }

    pub fn push_style(&mut self, style: CollectedStyle) {
        self.styles.push(style);
    }

    pub fn push_script(&mut self, script: CollectedScript) {
        self.scripts.push(script);
    }

    /// Record the first error raised inside a template function.
    pub fn set_fatal(&mut self, error: RenderError) {
        if self.fatal.is_none() {
            self.fatal = Some(error);
        }
    }

    pub fn take_fatal(&mut self) -> Option<RenderError> {
        self.fatal.take()
    }

    pub fn styles(&self) -> &[CollectedStyle] {
        &self.styles
    }

    pub fn scripts(&self) -> &[CollectedScript] {
        &self.scripts
    }

    pub fn probes(&self) -> usize {
        self.locator.probes()
    }

    pub fn into_parts(self) -> (Vec<CollectedStyle>, Vec<CollectedScript>) {
        (self.styles, self.scripts)
    }
}

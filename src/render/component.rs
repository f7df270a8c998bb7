//! Template and component rendering.
//!
//! Every theme file is rendered through a fresh `tera::Tera` holding just
//! that file, with the template functions bound to the current request:
//!
//! - `component(name="card", title="x", props={...})` renders a component
//! - `fragment(html="...")` collects styles and scripts from a raw string
//! - `outlet()` (layouts only) renders the routed template
//! - `styles()` / `scripts()` mark where aggregated output goes
//!
//! Nested component calls re-enter the renderer depth-first. The shared
//! request context is locked only for short bookkeeping, never across a
//! nested render.

use std::collections::HashMap;
use std::error::Error as _;
use std::fs;
use std::sync::{Arc, Mutex, MutexGuard};

use sha2::{Digest, Sha256};
use tera::{Context, Tera, Value};

use crate::render::context::{
    CollectedScript, CollectedStyle, RenderContext, RenderError, SharedContext,
    MAX_COMPONENT_DEPTH,
};
use crate::render::extract::{extract, Block};
use crate::site::Site;
use crate::theme::{Kind, LocateError, TemplateReference};

/// Placeholder printed by `styles()`.
pub const STYLES_MARKER: &str = "<!--pagewright:styles-->";
/// Placeholder printed by `scripts()`.
pub const SCRIPTS_MARKER: &str = "<!--pagewright:scripts-->";

/// A rendered component before aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRenderResult {
    /// Identity used for dedup and the style cache.
    pub source_key: String,
    pub body_html: String,
    pub style_blocks: Vec<Block>,
    pub script_blocks: Vec<Block>,
}

/// Renders theme files for one request.
#[derive(Clone)]
pub struct Renderer {
    site: Arc<Site>,
    ctx: SharedContext,
    globals: Arc<Context>,
    depth: usize,
}

impl Renderer {
    /// Start a request with an empty context.
    pub fn new(site: Arc<Site>, globals: Context) -> Self {
        Self {
            site,
            ctx: RenderContext::shared(),
            globals: Arc::new(globals),
            depth: 0,
        }
    }

    pub fn site(&self) -> &Arc<Site> {
        &self.site
    }

    fn lock(&self) -> MutexGuard<'_, RenderContext> {
        self.ctx.lock().expect("render context mutex poisoned")
    }

    /// Resolve a logical name through the request-scoped locator.
    pub fn locate(&self, name: &str, kind: Kind) -> Result<TemplateReference, LocateError> {
        let roots = self.site.roots();
        self.lock().locate(roots, name, kind)
    }

    /// Render a layout whose `outlet()` renders `template`.
    pub fn render_layout(
        &self,
        layout: &TemplateReference,
        template: TemplateReference,
    ) -> Result<String, RenderError> {
        let outlet = OutletFn {
            renderer: self.clone(),
            template,
            rendered: Mutex::new(None),
        };
        self.render_file(layout, Context::new(), Some(outlet))
    }

    /// Render a component by name, collect its styles and scripts and
    /// return its visible body.
    ///
    /// A missing component is logged and renders as an empty string.
    pub fn use_component(&self, name: &str, props: Context) -> Result<String, RenderError> {
        let reference = match self.locate(name, Kind::Component) {
            Ok(reference) => reference,
            Err(LocateError::ComponentNotFound(missing)) => {
                tracing::warn!(component = %missing, "Component not found, rendering nothing");
                return Ok(String::new());
            }
            Err(e @ LocateError::PathTraversalRejected { .. }) => {
                tracing::error!(error = %e, "Rejected component name");
                return Ok(String::new());
            }
            Err(e) => return Err(e.into()),
        };

        let result = self.render_component(&reference, props)?;
        self.collect(&result.source_key, &reference.logical_name, &result)?;
        Ok(result.body_html)
    }

    /// Render a component file and split its output. Nothing is collected.
    pub fn render_component(
        &self,
        reference: &TemplateReference,
        props: Context,
    ) -> Result<ComponentRenderResult, RenderError> {
        if self.depth >= MAX_COMPONENT_DEPTH {
            return Err(RenderError::TooDeep(reference.logical_name.clone()));
        }
        let nested = Self {
            depth: self.depth + 1,
            ..self.clone()
        };
        let html = nested.render_file(reference, props, None)?;
        let extracted = extract(&html);

        Ok(ComponentRenderResult {
            source_key: reference.physical_path.display().to_string(),
            body_html: extracted.body,
            style_blocks: extracted.styles,
            script_blocks: extracted.scripts,
        })
    }

    /// Collect styles and scripts from a raw HTML fragment that has no
    /// backing file. Its identity is the hash of its content.
    pub fn use_fragment(&self, html: &str) -> Result<String, RenderError> {
        let extracted = extract(html);
        let digest = hex::encode(Sha256::digest(html.as_bytes()));
        let source_key = format!("inline:{}", digest);
        let result = ComponentRenderResult {
            source_key: source_key.clone(),
            body_html: extracted.body,
            style_blocks: extracted.styles,
            script_blocks: extracted.scripts,
        };
        let name = format!("inline-{}", &digest[..12]);
        self.collect(&source_key, &name, &result)?;
        Ok(result.body_html)
    }

    /// Add a component's blocks to the request, once per source.
    fn collect(
        &self,
        source_key: &str,
        name: &str,
        result: &ComponentRenderResult,
    ) -> Result<(), RenderError> {
        if !result.style_blocks.is_empty() && self.lock().claim_styles(source_key) {
            let (text, first_line) = merge_blocks(&result.style_blocks);
            let display = format!("{}/{}", Kind::Component.dir(), name);
            let css = self
                .site
                .styles()
                .compile(source_key, &display, &text, first_line)?;
            self.lock().push_style(CollectedStyle {
                source_key: source_key.to_string(),
                css,
            });
        }

        if !result.script_blocks.is_empty() && self.lock().claim_scripts(source_key) {
            let text = result
                .script_blocks
                .iter()
                .map(|b| b.text.trim())
                .collect::<Vec<_>>()
                .join("\n");
            self.lock().push_script(CollectedScript {
                source_key: source_key.to_string(),
                name: name.to_string(),
                text,
            });
        }
        Ok(())
    }

    /// Render one theme file with the request globals plus `locals`.
    fn render_file(
        &self,
        reference: &TemplateReference,
        locals: Context,
        outlet: Option<OutletFn>,
    ) -> Result<String, RenderError> {
        let source =
            fs::read_to_string(&reference.physical_path).map_err(|source| RenderError::Io {
                path: reference.physical_path.clone(),
                source,
            })?;
        let name = format!(
            "{}/{}.{}",
            reference.kind.dir(),
            reference.logical_name,
            self.site.roots().extension()
        );

        let mut tera = Tera::default();
        tera.add_raw_template(&name, &source)
            .map_err(|e| template_error(&name, &e))?;
        tera.register_function(
            "component",
            ComponentFn {
                renderer: self.clone(),
            },
        );
        tera.register_function(
            "fragment",
            FragmentFn {
                renderer: self.clone(),
            },
        );
        tera.register_function("styles", Marker(STYLES_MARKER));
        tera.register_function("scripts", Marker(SCRIPTS_MARKER));
        match outlet {
            Some(outlet) => tera.register_function("outlet", outlet),
            None => tera.register_function("outlet", NoOutlet),
        }

        let mut context = (*self.globals).clone();
        context.extend(locals);

        tera.render(&name, &context).map_err(|e| {
            // an error raised inside a template function wins over tera's wrapper
            self.lock()
                .take_fatal()
                .unwrap_or_else(|| template_error(&name, &e))
        })
    }

    /// Finish the request and hand back what it collected.
    pub fn finish(self) -> Collected {
        let taken = std::mem::take(&mut *self.lock());
        let probes = taken.probes();
        let (styles, scripts) = taken.into_parts();
        Collected {
            styles,
            scripts,
            probes,
        }
    }
}

/// Aggregated output of one request.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub styles: Vec<CollectedStyle>,
    pub scripts: Vec<CollectedScript>,
    /// Filesystem probes the locator performed.
    pub probes: usize,
}

/// Join style blocks, padding between them so each keeps its line.
fn merge_blocks(blocks: &[Block]) -> (String, usize) {
    let first_line = blocks.first().map(|b| b.line).unwrap_or(1);
    let mut text = String::new();
    let mut line = first_line;

    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            text.push('\n');
            line += 1;
            while line < block.line {
                text.push('\n');
                line += 1;
            }
        }
        text.push_str(&block.text);
        line += block.text.matches('\n').count();
    }
    (text, first_line)
}

fn template_error(name: &str, error: &tera::Error) -> RenderError {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    RenderError::Template {
        name: name.to_string(),
        message,
    }
}

struct ComponentFn {
    renderer: Renderer,
}

impl tera::Function for ComponentFn {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("component() requires a string `name` argument"))?;

        let mut props = Context::new();
        match args.get("props") {
            None => {}
            Some(Value::Object(map)) => {
                for (key, value) in map {
                    props.insert(key.as_str(), value);
                }
            }
            Some(_) => return Err(tera::Error::msg("component() `props` must be a map")),
        }
        for (key, value) in args {
            if key != "name" && key != "props" {
                props.insert(key.as_str(), value);
            }
        }

        match self.renderer.use_component(name, props) {
            Ok(html) => Ok(Value::String(html)),
            Err(e) => {
                let message = e.to_string();
                self.renderer.lock().set_fatal(e);
                Err(tera::Error::msg(message))
            }
        }
    }

    fn is_safe(&self) -> bool {
        true
    }
}

struct FragmentFn {
    renderer: Renderer,
}

impl tera::Function for FragmentFn {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let html = args
            .get("html")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("fragment() requires a string `html` argument"))?;

        match self.renderer.use_fragment(html) {
            Ok(body) => Ok(Value::String(body)),
            Err(e) => {
                let message = e.to_string();
                self.renderer.lock().set_fatal(e);
                Err(tera::Error::msg(message))
            }
        }
    }

    fn is_safe(&self) -> bool {
        true
    }
}

struct OutletFn {
    renderer: Renderer,
    template: TemplateReference,
    rendered: Mutex<Option<String>>,
}

impl tera::Function for OutletFn {
    fn call(&self, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        let mut rendered = self.rendered.lock().expect("outlet mutex poisoned");
        if let Some(html) = rendered.as_ref() {
            return Ok(Value::String(html.clone()));
        }
        match self
            .renderer
            .render_file(&self.template, Context::new(), None)
        {
            Ok(html) => {
                *rendered = Some(html.clone());
                Ok(Value::String(html))
            }
            Err(e) => {
                let message = e.to_string();
                self.renderer.lock().set_fatal(e);
                Err(tera::Error::msg(message))
            }
        }
    }

    fn is_safe(&self) -> bool {
        true
    }
}

struct NoOutlet;

impl tera::Function for NoOutlet {
    fn call(&self, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        Err(tera::Error::msg("outlet() is only available in layouts"))
    }
}

struct Marker(&'static str);

impl tera::Function for Marker {
    fn call(&self, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        Ok(Value::String(self.0.to_string()))
    }

    fn is_safe(&self) -> bool {
        true
    }
}

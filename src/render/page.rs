//! Whole-page rendering and final emission.

use std::sync::Arc;

use serde_json::json;
use tera::Context;
use thiserror::Error;

use crate::config::ScriptMode;
use crate::render::component::{Collected, Renderer, SCRIPTS_MARKER, STYLES_MARKER};
use crate::render::context::{CollectedScript, RenderError};
use crate::routing::strip_query;
use crate::site::{Site, SiteStylesheet};
use crate::theme::Kind;

/// Endpoint polled by the debug reload script.
pub const LIVE_RELOAD_PATH: &str = "/__pagewright/reload";

/// Errors from rendering a request path.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("no route matches {0}")]
    NoRoute(String),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// A finished HTML document.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub route: String,
    pub html: String,
    /// Locator filesystem probes used by this request.
    pub probes: usize,
}

/// Resolve `request_path`, render its template inside its layout and emit
/// the aggregated styles and scripts.
pub fn render_page(site: &Arc<Site>, request_path: &str) -> Result<RenderedPage, PageError> {
    let path = strip_query(request_path);
    let matched = site
        .router()
        .resolve(path)
        .ok_or_else(|| PageError::NoRoute(path.to_string()))?;
    let route = matched.route;
    tracing::debug!(route = %route.name, path, "Route matched");

    let mut globals = Context::new();
    globals.insert(
        "route",
        &json!({
            "name": route.name,
            "template": route.template,
            "layout": route.layout,
            "params": matched.params,
        }),
    );
    globals.insert("path", path);
    globals.insert("body_class", &format!("route-{}", route.name));
    globals.insert("debug", &site.mode().is_debug());

    let renderer = Renderer::new(site.clone(), globals);
    let template = renderer
        .locate(&route.template, Kind::Template)
        .map_err(RenderError::from)?;
    let layout = renderer
        .locate(&route.layout, Kind::Layout)
        .map_err(RenderError::from)?;

    let html = renderer.render_layout(&layout, template)?;
    let collected = renderer.finish();
    let html = emit(site, html, &collected)?;

    Ok(RenderedPage {
        route: route.name.clone(),
        html,
        probes: collected.probes,
    })
}

/// Replace the output markers (or fall back to `</head>` / `</body>`).
fn emit(site: &Site, html: String, collected: &Collected) -> Result<String, RenderError> {
    let styles = style_html(site, collected)?;
    let mut scripts = script_html(site, &collected.scripts);
    if let Some(interval) = site.live_reload_interval() {
        scripts.push_str(&live_reload_script(interval));
    }

    let html = place(html, STYLES_MARKER, &styles, "</head>", false);
    Ok(place(html, SCRIPTS_MARKER, &scripts, "</body>", true))
}

fn style_html(site: &Site, collected: &Collected) -> Result<String, RenderError> {
    let mut out = String::new();
    match site.site_stylesheet()? {
        Some(SiteStylesheet::Linked(asset)) => {
            out.push_str(&format!(
                "<link rel=\"stylesheet\" id=\"pagewright-site-css\" href=\"{}\">\n",
                asset.versioned_url()
            ));
        }
        Some(SiteStylesheet::Inline(css)) => {
            out.push_str(&format!("<style id=\"pagewright-site\">\n{}</style>\n", css));
        }
        None => {}
    }

    if !collected.styles.is_empty() {
        out.push_str("<style id=\"pagewright-components\">\n");
        for style in &collected.styles {
            out.push_str(&style.css);
            if !style.css.ends_with('\n') {
                out.push('\n');
            }
        }
        out.push_str("</style>\n");
    }
    Ok(out)
}

fn script_html(site: &Site, scripts: &[CollectedScript]) -> String {
    if scripts.is_empty() {
        return String::new();
    }

    let mut inline = Vec::new();
    let mut out = String::new();

    for script in scripts {
        if site.script_mode() == ScriptMode::File {
            let relative = format!("{}/{}.js", Kind::Component.dir(), script.name);
            match site.assets().write_if_changed(&relative, script.text.as_bytes()) {
                Ok(asset) => {
                    out.push_str(&format!(
                        "<script src=\"{}\"></script>\n",
                        asset.versioned_url()
                    ));
                    continue;
                }
                Err(e) => {
                    tracing::warn!(script = %script.name, error = %e, "Cannot write script file, inlining it");
                }
            }
        }
        inline.push(script.text.as_str());
    }

    if !inline.is_empty() {
        out.push_str("<script id=\"pagewright-components\">\n");
        out.push_str(&inline.join("\n"));
        out.push_str("\n</script>\n");
    }
    out
}

/// Poll the change stamp and reload once it moves.
fn live_reload_script(interval_ms: u64) -> String {
    format!(
        r#"<script id="pagewright-live-reload">
(function () {{
  var seen = null;
  setInterval(function () {{
    fetch("{path}", {{ cache: "no-store" }})
      .then(function (res) {{ return res.json(); }})
      .then(function (data) {{
        if (seen === null) {{ seen = data.stamp; }}
        else if (data.stamp !== seen) {{ location.reload(); }}
      }})
      .catch(function () {{}});
  }}, {interval});
}})();
</script>
"#,
        path = LIVE_RELOAD_PATH,
        interval = interval_ms
    )
}

/// Put `content` at the first `marker`, dropping any further markers.
/// Without a marker, insert before `anchor` (first or last occurrence,
/// ASCII case-insensitive) or append.
fn place(html: String, marker: &str, content: &str, anchor: &str, last: bool) -> String {
    if let Some(pos) = html.find(marker) {
        let mut out = String::with_capacity(html.len() + content.len());
        out.push_str(&html[..pos]);
        out.push_str(content);
        out.push_str(&html[pos + marker.len()..].replace(marker, ""));
        return out;
    }
    if content.is_empty() {
        return html;
    }

    let lower = html.to_ascii_lowercase();
    let found = if last {
        lower.rfind(anchor)
    } else {
        lower.find(anchor)
    };
    match found {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + content.len());
            out.push_str(&html[..pos]);
            out.push_str(content);
            out.push_str(&html[pos..]);
            out
        }
        None if last => html + content,
        None => format!("{}{}", content, html),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_uses_marker_once() {
        let html = format!("<head>{m}</head><body>{m}</body>", m = STYLES_MARKER);
        assert_eq!(
            place(html, STYLES_MARKER, "<style></style>", "</head>", false),
            "<head><style></style></head><body></body>"
        );
    }

    #[test]
    fn test_place_falls_back_to_anchor() {
        assert_eq!(
            place("<HEAD></HEAD>".into(), STYLES_MARKER, "S", "</head>", false),
            "<HEAD>S</HEAD>"
        );
        assert_eq!(
            place("<body><p></p></body>".into(), SCRIPTS_MARKER, "J", "</body>", true),
            "<body><p></p>J</body>"
        );
        assert_eq!(place("<p>".into(), SCRIPTS_MARKER, "J", "</body>", true), "<p>J");
        assert_eq!(place("<p>".into(), STYLES_MARKER, "S", "</head>", false), "S<p>");
    }

    #[test]
    fn test_live_reload_script_polls_endpoint() {
        let script = live_reload_script(750);
        assert!(script.starts_with("<script id=\"pagewright-live-reload\">"));
        assert!(script.contains("fetch(\"/__pagewright/reload\""));
        assert!(script.contains("}, 750);"));
    }

    #[test]
    fn test_empty_content_removes_marker() {
        let html = format!("<head>{}</head>", STYLES_MARKER);
        assert_eq!(place(html, STYLES_MARKER, "", "</head>", false), "<head></head>");
        assert_eq!(place("<head></head>".into(), STYLES_MARKER, "", "</head>", false), "<head></head>");
    }
}

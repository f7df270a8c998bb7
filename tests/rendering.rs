//! End-to-end page rendering against a theme on disk.

use std::fs;
use std::sync::Arc;

use pagewright::config::{Mode, RouteDefinition, ScriptMode};
use pagewright::render::{render_page, PageError, RenderError};
use pagewright::theme::LocateError;

mod common;

use common::{occurrences, CountingCompiler, ThemeFixture, WORK_BLOCK};

#[test]
fn test_resolves_routes_to_templates_and_layouts() {
    let fixture = ThemeFixture::new();
    let site = fixture.site(Mode::Production);

    let home = render_page(&site, "/").unwrap();
    assert_eq!(home.route, "home");
    assert!(home.html.contains("<h1>Home</h1>"));
    assert!(home.html.contains("<body class=\"route-home\">"));

    let work = render_page(&site, "/WORK?tab=all").unwrap();
    assert_eq!(work.route, "work");
    assert!(work.html.contains("<main class=\"layout1\">"));

    let project = render_page(&site, "/work/acme/").unwrap();
    assert_eq!(project.route, "project");
    assert!(project.html.contains("<h1>Project acme</h1>"));
}

#[test]
fn test_unknown_path_has_no_route() {
    let fixture = ThemeFixture::new();
    let site = fixture.site(Mode::Production);

    assert!(matches!(
        render_page(&site, "/nowhere/at/all"),
        Err(PageError::NoRoute(path)) if path == "/nowhere/at/all"
    ));
}

#[test]
fn test_repeated_component_emits_assets_once() {
    let fixture = ThemeFixture::new();
    let site = fixture.site(Mode::Production);

    let page = render_page(&site, "/work/").unwrap();
    let html = &page.html;

    assert_eq!(occurrences(html, "<article class=\"work-block\">"), 4);
    for title in ["Alpha", "Beta", "Gamma", "Delta"] {
        assert!(html.contains(&format!("<h2>{}</h2>", title)), "missing {title}");
    }

    assert_eq!(occurrences(html, "<style id=\"pagewright-components\">"), 1);
    assert_eq!(occurrences(html, ".work-block h2"), 1);
    assert!(html.contains("color: #c33;"));
    assert_eq!(occurrences(html, "<script id=\"pagewright-components\">"), 1);
    assert_eq!(occurrences(html, "el.dataset.ready"), 1);

    // styles land in the head, scripts before the end of the body
    let head_end = html.find("</head>").unwrap();
    assert!(html.find("<style id=\"pagewright-components\">").unwrap() < head_end);
    let last_block = html.rfind("<article").unwrap();
    assert!(html.find("<script id=\"pagewright-components\">").unwrap() > last_block);

    // the raw blocks never reach the page
    assert!(!html.contains("$accent"));
    assert!(!html.contains("<template>"));
    assert!(!html.contains("pagewright:styles"));
    assert!(!html.contains("pagewright:scripts"));
}

#[test]
fn test_each_request_starts_with_empty_dedup_state() {
    let fixture = ThemeFixture::new();
    let site = fixture.site(Mode::Production);

    let first = render_page(&site, "/work/").unwrap();
    let second = render_page(&site, "/work/").unwrap();
    assert_eq!(occurrences(&second.html, ".work-block h2"), 1);
    assert_eq!(occurrences(&second.html, "el.dataset.ready"), 1);
    assert_eq!(first.html, second.html);
}

#[test]
fn test_compiles_once_until_source_changes() {
    let fixture = ThemeFixture::new();
    let spy = Arc::new(CountingCompiler::default());
    let site = fixture.site_with(&fixture.config(), Mode::Production, spy.clone());

    let original = render_page(&site, "/work/").unwrap().html;
    assert_eq!(spy.calls(), 1);
    render_page(&site, "/work/").unwrap();
    render_page(&site, "/work/").unwrap();
    assert_eq!(spy.calls(), 1);

    fixture.write(
        "theme/components/work-block.html",
        &WORK_BLOCK.replace("#c33", "#00f"),
    );
    let changed = render_page(&site, "/work/").unwrap().html;
    assert_eq!(spy.calls(), 2);
    assert!(changed.contains("color: #00f;"));
    assert!(!changed.contains("#c33"));

    fixture.write("theme/components/work-block.html", WORK_BLOCK);
    let reverted = render_page(&site, "/work/").unwrap().html;
    assert_eq!(spy.calls(), 3);
    assert_eq!(reverted, original);
}

#[test]
fn test_compiled_styles_survive_a_restart() {
    let fixture = ThemeFixture::new();
    let config = fixture.config();

    let first = Arc::new(CountingCompiler::default());
    let site = fixture.site_with(&config, Mode::Production, first.clone());
    let before = render_page(&site, "/work/").unwrap().html;
    assert_eq!(first.calls(), 1);
    assert!(config.styles.cache_path.exists());

    let second = Arc::new(CountingCompiler::default());
    let restarted = fixture.site_with(&config, Mode::Production, second.clone());
    let after = render_page(&restarted, "/work/").unwrap().html;
    assert_eq!(second.calls(), 0);
    assert_eq!(before, after);
}

#[test]
fn test_mode_change_invalidates_cached_styles() {
    let fixture = ThemeFixture::new();
    let config = fixture.config();
    let spy = Arc::new(CountingCompiler::default());

    let production = fixture.site_with(&config, Mode::Production, spy.clone());
    render_page(&production, "/work/").unwrap();
    let debug = fixture.site_with(&config, Mode::Debug, spy.clone());
    let html = render_page(&debug, "/work/").unwrap().html;

    assert_eq!(spy.calls(), 2);
    assert!(html.contains("/* line "));
    assert!(html.contains("components/work-block */"));
}

#[test]
fn test_missing_template_and_layout_are_errors() {
    let fixture = ThemeFixture::new();
    let site = fixture.site(Mode::Production);

    match render_page(&site, "/ghost") {
        Err(PageError::Render(RenderError::Locate(e @ LocateError::TemplateNotFound(_)))) => {
            assert_eq!(e.to_string(), "The file for the template ghost does not exist");
        }
        other => panic!("unexpected result: {:?}", other.map(|p| p.route)),
    }

    match render_page(&site, "/nolayout") {
        Err(PageError::Render(RenderError::Locate(e @ LocateError::LayoutNotFound(_)))) => {
            assert_eq!(e.to_string(), "The file for the layout missing does not exist");
        }
        other => panic!("unexpected result: {:?}", other.map(|p| p.route)),
    }
}

#[test]
fn test_traversal_outside_theme_is_rejected() {
    let fixture = ThemeFixture::new();
    let site = fixture.site(Mode::Production);

    assert!(matches!(
        render_page(&site, "/escape"),
        Err(PageError::Render(RenderError::Locate(
            LocateError::PathTraversalRejected { .. }
        )))
    ));

    fixture.write(
        "theme/templates/sneaky.html",
        "<p>{{ component(name=\"../../../outside\") }}</p>\n",
    );
    let mut config = fixture.config();
    config.routes.push(RouteDefinition::new("sneaky", "/sneaky"));
    let site = fixture.site_with(&config, Mode::Production, Arc::new(pagewright::styles::ScssCompiler));

    let page = render_page(&site, "/sneaky").unwrap();
    assert!(page.html.contains("<p></p>"));
    assert!(!page.html.contains("secret"));
}

#[test]
fn test_missing_component_renders_empty() {
    let fixture = ThemeFixture::new();
    fixture.write(
        "theme/templates/home.html",
        "<h1>Home</h1><div>{{ component(name=\"nope\") }}</div>\n",
    );
    let site = fixture.site(Mode::Production);

    let page = render_page(&site, "/").unwrap();
    assert!(page.html.contains("<h1>Home</h1><div></div>"));
}

#[test]
fn test_nested_components_collect_every_style_once() {
    let fixture = ThemeFixture::new();
    fixture.write(
        "theme/components/badge.html",
        "<style>\n.badge { color: red; }\n</style><span class=\"badge\">{{ label }}</span>",
    );
    fixture.write(
        "theme/components/card.html",
        "<style>\n.card { padding: 4px; }\n</style>\
         <div class=\"card\">{{ component(name=\"badge\", label=title) }}</div>",
    );
    fixture.write(
        "theme/templates/home.html",
        "{{ component(name=\"card\", title=\"one\") }}\n\
         {{ component(name=\"card\", title=\"two\") }}\n\
         {{ component(name=\"badge\", label=\"solo\") }}\n",
    );
    let site = fixture.site(Mode::Production);

    let html = render_page(&site, "/").unwrap().html;
    assert!(html.contains("<div class=\"card\"><span class=\"badge\">one</span></div>"));
    assert!(html.contains("<div class=\"card\"><span class=\"badge\">two</span></div>"));
    assert!(html.contains("<span class=\"badge\">solo</span>"));
    assert_eq!(occurrences(&html, ".badge {"), 1);
    assert_eq!(occurrences(&html, ".card {"), 1);
}

#[test]
fn test_component_props_from_map_and_arguments() {
    let fixture = ThemeFixture::new();
    fixture.write("theme/components/tag.html", "<i>{{ slug }}</i>");
    fixture.write(
        "theme/templates/project.html",
        "{{ component(name=\"tag\", props=route.params) }}\
         {{ component(name=\"tag\", props=route.params, slug=\"override\") }}\n",
    );
    let site = fixture.site(Mode::Production);

    let html = render_page(&site, "/work/acme").unwrap().html;
    assert!(html.contains("<i>acme</i><i>override</i>"));
}

#[test]
fn test_compile_failure_depends_on_mode() {
    let fixture = ThemeFixture::new();
    fixture.write(
        "theme/components/broken.html",
        "<b>x</b>\n<style>\n.broken { color: $nope; }\n</style>\n",
    );
    fixture.write(
        "theme/templates/home.html",
        "{{ component(name=\"broken\") }}\n",
    );

    let production = fixture.site(Mode::Production);
    let html = render_page(&production, "/").unwrap().html;
    assert!(html.contains(".broken { color: $nope; }"));
    assert!(html.contains("<b>x</b>"));

    let debug = fixture.site(Mode::Debug);
    assert!(matches!(
        render_page(&debug, "/"),
        Err(PageError::Render(RenderError::Style(_)))
    ));
}

#[test]
fn test_child_theme_overrides_parent() {
    let fixture = ThemeFixture::new();
    fixture.write("child/templates/home.html", "<h1>Child Home</h1>\n");
    let mut config = fixture.config();
    config.theme.child_root = Some(fixture.path("child"));
    let site = fixture.site_with(&config, Mode::Production, Arc::new(pagewright::styles::ScssCompiler));

    let html = render_page(&site, "/").unwrap().html;
    assert!(html.contains("<h1>Child Home</h1>"));
    // layouts still come from the parent
    assert!(html.contains("<body class=\"route-home\">"));
}

#[test]
fn test_script_file_mode_writes_assets() {
    let fixture = ThemeFixture::new();
    let mut config = fixture.config();
    config.assets.scripts = ScriptMode::File;
    let site = fixture.site_with(&config, Mode::Production, Arc::new(pagewright::styles::ScssCompiler));

    let html = render_page(&site, "/work/").unwrap().html;
    assert_eq!(
        occurrences(&html, "<script src=\"/_pagewright/components/work-block.js?ver="),
        1
    );
    assert!(!html.contains("el.dataset.ready"));

    let written = fs::read_to_string(fixture.path("dist/components/work-block.js")).unwrap();
    assert!(written.contains("el.dataset.ready"));
}

#[test]
fn test_site_stylesheet_is_linked() {
    let fixture = ThemeFixture::new();
    fixture.write("theme/styles/vars.scss", "$ink: #222;\n");
    fixture.write("theme/styles/site.scss", "body { color: $ink; }\n");
    let mut config = fixture.config();
    config.styles.prelude = vec!["styles/vars.scss".into()];
    config.styles.site = vec!["styles/site.scss".into()];
    let site = fixture.site_with(&config, Mode::Production, Arc::new(pagewright::styles::ScssCompiler));

    let html = render_page(&site, "/").unwrap().html;
    assert!(html.contains(
        "<link rel=\"stylesheet\" id=\"pagewright-site-css\" href=\"/_pagewright/site.css?ver="
    ));
    assert_eq!(
        fs::read_to_string(fixture.path("dist/site.css")).unwrap(),
        "body {\n  color: #222;\n}\n"
    );
}

#[test]
fn test_raw_fragments_dedup_by_content() {
    let fixture = ThemeFixture::new();
    fixture.write(
        "theme/templates/home.html",
        "{% set promo = \"<style>.promo { color: blue; }</style><em>sale</em>\" %}\
         {{ fragment(html=promo) }}{{ fragment(html=promo) }}\
         {{ fragment(html=\"<style>.other { color: green; }</style><b>new</b>\") }}\n",
    );
    let site = fixture.site(Mode::Production);

    let html = render_page(&site, "/").unwrap().html;
    assert!(html.contains("<em>sale</em><em>sale</em><b>new</b>"));
    assert_eq!(occurrences(&html, ".promo {"), 1);
    assert_eq!(occurrences(&html, ".other {"), 1);
}

#[test]
fn test_envelope_styles_extracted_whether_nested_or_not() {
    let fixture = ThemeFixture::new();
    fixture.write(
        "theme/components/inner.html",
        "<template><div class=\"in\"><style>.raw-in { color: red; }</style></div></template>",
    );
    fixture.write(
        "theme/components/outer.html",
        "<section>{{ component(name=\"inner\") }}</section>",
    );
    fixture.write(
        "theme/templates/home.html",
        "{{ component(name=\"inner\") }}\n{{ component(name=\"outer\") }}\n",
    );
    let site = fixture.site(Mode::Production);

    let html = render_page(&site, "/").unwrap().html;
    assert!(html.contains("<div class=\"in\"></div>\n<section><div class=\"in\"></div></section>"));
    assert!(!html.contains("<style>.raw-in"));
    assert_eq!(occurrences(&html, ".raw-in {"), 1);
}

#[test]
fn test_locator_memo_is_per_request() {
    let fixture = ThemeFixture::new();
    fixture.write(
        "theme/templates/home.html",
        "<ul>{{ component(name=\"late\") }}{{ component(name=\"late\") }}</ul>\n",
    );
    let site = fixture.site(Mode::Production);

    let first = render_page(&site, "/").unwrap();
    assert!(first.html.contains("<ul></ul>"));
    // template, layout, and one memoized miss for both calls
    assert_eq!(first.probes, 3);

    fixture.write("theme/components/late.html", "<li>late</li>");
    let second = render_page(&site, "/").unwrap();
    assert!(second.html.contains("<ul><li>late</li><li>late</li></ul>"));
    assert_eq!(second.probes, 3);
}

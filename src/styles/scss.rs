//! A small SCSS-subset compiler.
//!
//! Supported input:
//! - nested style rules, `&` parent references, comma selector lists
//! - `$variables` with block scope and `!default`
//! - `#{...}` interpolation in selectors, properties, values and at-rule params
//! - `@media`, `@supports`, `@layer` and `@container` bubbling out of rules
//! - `@mixin` / `@include` with positional, named and default arguments
//! - `//` and `/* */` comments (dropped from the output)
//!
//! Any other at-rule with a block (`@font-face`, `@keyframes`, ...) and any
//! blockless at-rule (`@import`, `@charset`) passes through. Control flow,
//! functions, `@use` and `@extend` are reported as errors.
//!
//! Output uses the expanded style: one declaration per line, two-space
//! indentation, a blank line between sibling blocks.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

const MAX_INCLUDE_DEPTH: usize = 64;

/// A compile failure with the 1-based line it was detected on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScssError {
    pub line: usize,
    pub message: String,
}

impl ScssError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for ScssError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ScssError {}

type Result<T> = std::result::Result<T, ScssError>;

/// Output switches.
#[derive(Debug, Clone, Default)]
pub struct Output<'a> {
    /// Emit `/* line N, source */` before each block.
    pub line_comments: Option<&'a str>,
}

/// Compile SCSS text to plain CSS.
pub fn compile(source: &str, output: &Output<'_>) -> Result<String> {
    let nodes = Parser::new(source).parse_stylesheet()?;
    let mut evaluator = Evaluator::default();
    evaluator.eval_body(&nodes, &Ctx::root())?;
    Ok(write_css(&evaluator.items, output))
}

// ---------------------------------------------------------------------------
// Syntax tree

#[derive(Debug)]
enum Node {
    Decl {
        property: String,
        value: String,
        line: usize,
    },
    Var {
        name: String,
        value: String,
        default: bool,
        line: usize,
    },
    Rule {
        selector: String,
        children: Vec<Node>,
        line: usize,
    },
    AtBlock {
        name: String,
        params: String,
        children: Vec<Node>,
        line: usize,
    },
    AtStmt {
        name: String,
        params: String,
        line: usize,
    },
    Mixin(Rc<MixinDef>),
    Include {
        name: String,
        args: Vec<String>,
        line: usize,
    },
}

#[derive(Debug)]
struct MixinDef {
    name: String,
    params: Vec<(String, Option<String>)>,
    body: Vec<Node>,
}

// ---------------------------------------------------------------------------
// Parser

struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

enum Terminator {
    Semicolon,
    OpenBrace,
    CloseBrace,
    Eof,
}

impl Parser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn parse_stylesheet(&mut self) -> Result<Vec<Node>> {
        self.parse_block(None)
    }

    /// Parse statements until the matching `}` (when `open_line` is set) or EOF.
    fn parse_block(&mut self, open_line: Option<usize>) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                None => {
                    return match open_line {
                        Some(line) => Err(ScssError::new(line, "unclosed block, expected '}'")),
                        None => Ok(nodes),
                    };
                }
                Some('}') => {
                    if open_line.is_none() {
                        return Err(ScssError::new(self.line, "unexpected '}'"));
                    }
                    self.bump();
                    return Ok(nodes);
                }
                Some(_) => {}
            }

            let line = self.line;
            let (text, terminator) = self.read_statement()?;
            let text = text.trim().to_string();

            match terminator {
                Terminator::OpenBrace => {
                    self.bump();
                    let children = self.parse_block(Some(line))?;
                    nodes.push(self.block_node(text, children, line)?);
                }
                Terminator::Semicolon => {
                    self.bump();
                    if let Some(node) = statement_node(&text, line)? {
                        nodes.push(node);
                    }
                }
                Terminator::CloseBrace | Terminator::Eof => {
                    if let Some(node) = statement_node(&text, line)? {
                        nodes.push(node);
                    }
                }
            }
        }
    }

    fn block_node(&self, prelude: String, children: Vec<Node>, line: usize) -> Result<Node> {
        if prelude.is_empty() {
            return Err(ScssError::new(line, "expected selector before '{'"));
        }
        let Some(at) = prelude.strip_prefix('@') else {
            return Ok(Node::Rule {
                selector: prelude,
                children,
                line,
            });
        };

        let (name, params) = split_at_rule(at);
        match name.as_str() {
            "mixin" => {
                let (mixin_name, params) = parse_signature(&params, line)?;
                let params = params
                    .into_iter()
                    .map(|p| parse_param(&p, line))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Node::Mixin(Rc::new(MixinDef {
                    name: mixin_name,
                    params,
                    body: children,
                })))
            }
            "include" => Err(ScssError::new(
                line,
                "@include with a content block is not supported",
            )),
            n if is_unsupported(n) => Err(ScssError::new(line, format!("@{} is not supported", n))),
            _ => Ok(Node::AtBlock {
                name,
                params,
                children,
                line,
            }),
        }
    }

    /// Skip whitespace and comments between statements.
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => self.skip_line_comment(),
                (Some('/'), Some('*')) => self.skip_block_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        let line = self.line;
        self.bump();
        self.bump();
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some('*'), Some('/')) => {
                    self.bump();
                    self.bump();
                    return Ok(());
                }
                (Some(_), _) => {
                    self.bump();
                }
                (None, _) => return Err(ScssError::new(line, "unclosed comment")),
            }
        }
    }

    /// Read raw statement text up to `;`, `{` or `}` at nesting depth zero.
    /// The terminator itself is not consumed.
    fn read_statement(&mut self) -> Result<(String, Terminator)> {
        let mut text = String::new();
        let mut parens = 0usize;
        let mut quote: Option<char> = None;

        while let Some(c) = self.peek() {
            if let Some(q) = quote {
                text.push(c);
                self.bump();
                if c == '\\' {
                    if let Some(escaped) = self.bump() {
                        text.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
                continue;
            }

            match c {
                '"' | '\'' => {
                    quote = Some(c);
                    text.push(c);
                    self.bump();
                }
                '#' if self.peek_at(1) == Some('{') => {
                    let line = self.line;
                    while let Some(ic) = self.bump() {
                        text.push(ic);
                        if ic == '}' {
                            break;
                        }
                    }
                    if !text.ends_with('}') {
                        return Err(ScssError::new(line, "unclosed interpolation"));
                    }
                }
                '/' if self.peek_at(1) == Some('*') => self.skip_block_comment()?,
                '/' if self.peek_at(1) == Some('/') && parens == 0 => self.skip_line_comment(),
                '(' => {
                    parens += 1;
                    text.push(c);
                    self.bump();
                }
                ')' => {
                    parens = parens.saturating_sub(1);
                    text.push(c);
                    self.bump();
                }
                ';' if parens == 0 => return Ok((text, Terminator::Semicolon)),
                '{' if parens == 0 => return Ok((text, Terminator::OpenBrace)),
                '}' if parens == 0 => return Ok((text, Terminator::CloseBrace)),
                _ => {
                    text.push(c);
                    self.bump();
                }
            }
        }

        if quote.is_some() {
            return Err(ScssError::new(self.line, "unterminated string"));
        }
        Ok((text, Terminator::Eof))
    }
}

fn is_unsupported(name: &str) -> bool {
    matches!(
        name,
        "use" | "forward" | "extend" | "content" | "function" | "return" | "if" | "else"
            | "each" | "for" | "while" | "at-root"
    )
}

/// Build a node from a statement terminated by `;` or the end of a block.
fn statement_node(text: &str, line: usize) -> Result<Option<Node>> {
    if text.is_empty() {
        return Ok(None);
    }

    if let Some(rest) = text.strip_prefix('$') {
        let (name, value) = rest
            .split_once(':')
            .ok_or_else(|| ScssError::new(line, format!("expected ':' after ${}", rest.trim())))?;
        let name = name.trim();
        if name.is_empty() || !name.chars().all(is_ident_char) {
            return Err(ScssError::new(line, format!("invalid variable name ${}", name)));
        }
        let mut value = value.trim().to_string();
        let mut default = false;
        loop {
            if let Some(v) = value.strip_suffix("!default") {
                default = true;
                value = v.trim_end().to_string();
            } else if let Some(v) = value.strip_suffix("!global") {
                value = v.trim_end().to_string();
            } else {
                break;
            }
        }
        if value.is_empty() {
            return Err(ScssError::new(line, format!("expected a value for ${}", name)));
        }
        return Ok(Some(Node::Var {
            name: name.to_string(),
            value,
            default,
            line,
        }));
    }

    if let Some(at) = text.strip_prefix('@') {
        let (name, params) = split_at_rule(at);
        return match name.as_str() {
            "include" => {
                let (mixin, args) = parse_signature(&params, line)?;
                Ok(Some(Node::Include {
                    name: mixin,
                    args,
                    line,
                }))
            }
            "mixin" => Err(ScssError::new(line, "@mixin requires a block")),
            "error" => Err(ScssError::new(line, params.trim_matches(['"', '\'']).to_string())),
            "debug" | "warn" => Ok(None),
            n if is_unsupported(n) => Err(ScssError::new(line, format!("@{} is not supported", n))),
            _ => Ok(Some(Node::AtStmt { name, params, line })),
        };
    }

    let (property, value) = text
        .split_once(':')
        .ok_or_else(|| ScssError::new(line, format!("expected a declaration, found '{}'", text)))?;
    let property = property.trim();
    let value = value.trim();
    if property.is_empty() {
        return Err(ScssError::new(line, "declaration is missing a property name"));
    }
    if value.is_empty() {
        return Err(ScssError::new(line, format!("expected a value for '{}'", property)));
    }
    Ok(Some(Node::Decl {
        property: property.to_string(),
        value: value.to_string(),
        line,
    }))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// `media screen and (x)` → (`media`, `screen and (x)`).
fn split_at_rule(text: &str) -> (String, String) {
    let end = text
        .find(|c: char| c.is_whitespace() || c == '(' || c == '"' || c == '\'')
        .unwrap_or(text.len());
    (text[..end].to_string(), text[end..].trim().to_string())
}

/// `name($a, $b: 1px)` → (`name`, [`$a`, `$b: 1px`]).
fn parse_signature(text: &str, line: usize) -> Result<(String, Vec<String>)> {
    let text = text.trim();
    let Some(open) = text.find('(') else {
        if text.is_empty() || !text.chars().all(is_ident_char) {
            return Err(ScssError::new(line, format!("invalid mixin name '{}'", text)));
        }
        return Ok((text.to_string(), Vec::new()));
    };
    let name = text[..open].trim();
    let inner = text[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| ScssError::new(line, format!("expected ')' in '{}'", text)))?;
    if name.is_empty() || !name.chars().all(is_ident_char) {
        return Err(ScssError::new(line, format!("invalid mixin name '{}'", name)));
    }
    let args = split_top_level(inner, ',')
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();
    Ok((name.to_string(), args))
}

fn parse_param(text: &str, line: usize) -> Result<(String, Option<String>)> {
    let rest = text
        .strip_prefix('$')
        .ok_or_else(|| ScssError::new(line, format!("expected a $parameter, found '{}'", text)))?;
    Ok(match rest.split_once(':') {
        Some((name, default)) => (name.trim().to_string(), Some(default.trim().to_string())),
        None => (rest.trim().to_string(), None),
    })
}

/// Split on `sep` outside parentheses, brackets and quotes.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                c if c == sep && depth == 0 => {
                    parts.push(&text[start..i]);
                    start = i + c.len_utf8();
                }
                _ => {}
            },
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Collapse whitespace runs outside quotes into single spaces.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut pending_space = false;

    for c in text.trim().chars() {
        if quote.is_none() && c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        match quote {
            Some(q) if c == q => quote = None,
            None if c == '"' || c == '\'' => quote = Some(c),
            _ => {}
        }
        out.push(c);
    }
    out
}

// ---------------------------------------------------------------------------
// Evaluation

#[derive(Debug)]
enum Item {
    Block {
        wrappers: Vec<String>,
        selectors: Vec<String>,
        decls: Vec<(String, String)>,
        line: usize,
    },
    Statement {
        wrappers: Vec<String>,
        text: String,
    },
}

impl Item {
    fn wrappers(&self) -> &[String] {
        match self {
            Item::Block { wrappers, .. } | Item::Statement { wrappers, .. } => wrappers,
        }
    }
}

#[derive(Debug, Clone)]
struct Ctx {
    selectors: Vec<String>,
    wrappers: Vec<String>,
    /// Item receiving declarations at this level.
    target: Option<usize>,
}

impl Ctx {
    fn root() -> Self {
        Self {
            selectors: Vec::new(),
            wrappers: Vec::new(),
            target: None,
        }
    }
}

#[derive(Default)]
struct Frame {
    vars: HashMap<String, String>,
    mixins: HashMap<String, Rc<MixinDef>>,
}

#[derive(Default)]
struct Evaluator {
    frames: Vec<Frame>,
    items: Vec<Item>,
    include_depth: usize,
}

impl Evaluator {
    fn eval_body(&mut self, nodes: &[Node], ctx: &Ctx) -> Result<()> {
        self.frames.push(Frame::default());
        let result = nodes.iter().try_for_each(|node| self.eval_node(node, ctx));
        self.frames.pop();
        result
    }

    fn eval_node(&mut self, node: &Node, ctx: &Ctx) -> Result<()> {
        match node {
            Node::Var {
                name,
                value,
                default,
                line,
            } => {
                if *default && self.lookup_var(name).is_some() {
                    return Ok(());
                }
                let value = collapse_whitespace(&self.substitute(value, *line)?);
                self.current_frame().vars.insert(name.clone(), value);
                Ok(())
            }
            Node::Decl {
                property,
                value,
                line,
            } => {
                let target = ctx.target.ok_or_else(|| {
                    ScssError::new(*line, "declarations may only be used within style rules")
                })?;
                let property = collapse_whitespace(&self.interpolate(property, *line)?);
                let value = collapse_whitespace(&self.substitute(value, *line)?);
                if let Some(Item::Block { decls, .. }) = self.items.get_mut(target) {
                    decls.push((property, value));
                }
                Ok(())
            }
            Node::Rule {
                selector,
                children,
                line,
            } => {
                let text = self.interpolate(selector, *line)?;
                let selectors = resolve_selectors(&ctx.selectors, &text, *line)?;
                let target = self.push_block(ctx.wrappers.clone(), selectors.clone(), *line);
                let inner = Ctx {
                    selectors,
                    wrappers: ctx.wrappers.clone(),
                    target: Some(target),
                };
                self.eval_body(children, &inner)
            }
            Node::AtBlock {
                name,
                params,
                children,
                line,
            } => {
                let params = collapse_whitespace(&self.substitute(params, *line)?);
                if matches!(name.as_str(), "media" | "supports" | "layer" | "container") {
                    let mut wrappers = ctx.wrappers.clone();
                    let merge_prefix = format!("@{} ", name);
                    match wrappers.last_mut() {
                        Some(last) if name == "media" && last.starts_with(&merge_prefix) => {
                            last.push_str(" and ");
                            last.push_str(&params);
                        }
                        _ => wrappers.push(at_prelude(name, &params)),
                    }
                    let target = if ctx.selectors.is_empty() {
                        None
                    } else {
                        Some(self.push_block(wrappers.clone(), ctx.selectors.clone(), *line))
                    };
                    let inner = Ctx {
                        selectors: ctx.selectors.clone(),
                        wrappers,
                        target,
                    };
                    self.eval_body(children, &inner)
                } else {
                    let mut wrappers = ctx.wrappers.clone();
                    wrappers.push(at_prelude(name, &params));
                    let target = self.push_block(wrappers.clone(), Vec::new(), *line);
                    let inner = Ctx {
                        selectors: Vec::new(),
                        wrappers,
                        target: Some(target),
                    };
                    self.eval_body(children, &inner)
                }
            }
            Node::AtStmt { name, params, line } => {
                let params = collapse_whitespace(&self.substitute(params, *line)?);
                self.items.push(Item::Statement {
                    wrappers: ctx.wrappers.clone(),
                    text: at_prelude(name, &params),
                });
                Ok(())
            }
            Node::Mixin(def) => {
                self.current_frame()
                    .mixins
                    .insert(def.name.clone(), def.clone());
                Ok(())
            }
            Node::Include { name, args, line } => self.include(name, args, ctx, *line),
        }
    }

    fn include(&mut self, name: &str, args: &[String], ctx: &Ctx, line: usize) -> Result<()> {
        let def = self
            .frames
            .iter()
            .rev()
            .find_map(|f| f.mixins.get(name).cloned())
            .ok_or_else(|| ScssError::new(line, format!("undefined mixin '{}'", name)))?;

        if self.include_depth >= MAX_INCLUDE_DEPTH {
            return Err(ScssError::new(line, format!("mixin '{}' nests too deeply", name)));
        }

        let mut positional = Vec::new();
        let mut named = HashMap::new();
        for arg in args {
            match arg.strip_prefix('$').and_then(|r| r.split_once(':')) {
                Some((key, v)) => {
                    let value = self.substitute(v.trim(), line)?;
                    named.insert(key.trim().to_string(), value);
                }
                None => positional.push(self.substitute(arg.trim(), line)?),
            }
        }
        if positional.len() > def.params.len() {
            return Err(ScssError::new(
                line,
                format!(
                    "mixin '{}' takes {} arguments, {} given",
                    name,
                    def.params.len(),
                    positional.len()
                ),
            ));
        }

        self.frames.push(Frame::default());
        self.include_depth += 1;
        let result = (|| {
            for (i, (param, default)) in def.params.iter().enumerate() {
                let value = if let Some(v) = named.remove(param) {
                    v
                } else if let Some(v) = positional.get(i) {
                    v.clone()
                } else if let Some(d) = default {
                    self.substitute(d, line)?
                } else {
                    return Err(ScssError::new(
                        line,
                        format!("missing argument ${} for mixin '{}'", param, name),
                    ));
                };
                self.current_frame()
                    .vars
                    .insert(param.clone(), collapse_whitespace(&value));
            }
            if let Some(extra) = named.keys().next() {
                return Err(ScssError::new(
                    line,
                    format!("mixin '{}' has no parameter ${}", name, extra),
                ));
            }
            def.body
                .iter()
                .try_for_each(|node| self.eval_node(node, ctx))
        })();
        self.include_depth -= 1;
        self.frames.pop();
        result
    }

    fn push_block(&mut self, wrappers: Vec<String>, selectors: Vec<String>, line: usize) -> usize {
        self.items.push(Item::Block {
            wrappers,
            selectors,
            decls: Vec::new(),
            line,
        });
        self.items.len() - 1
    }

    fn current_frame(&mut self) -> &mut Frame {
        if self.frames.is_empty() {
            self.frames.push(Frame::default());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn lookup_var(&self, name: &str) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.vars.get(name))
            .map(String::as_str)
    }

    /// Replace `#{...}` only. Used for selectors and property names.
    fn interpolate(&self, text: &str, line: usize) -> Result<String> {
        self.expand(text, line, false)
    }

    /// Replace `#{...}` and bare `$variables`. Used for values.
    fn substitute(&self, text: &str, line: usize) -> Result<String> {
        self.expand(text, line, true)
    }

    fn expand(&self, text: &str, line: usize, variables: bool) -> Result<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut quote: Option<char> = None;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c == '#' && chars.get(i + 1) == Some(&'{') {
                let close = chars[i + 2..]
                    .iter()
                    .position(|&c| c == '}')
                    .map(|p| p + i + 2)
                    .ok_or_else(|| ScssError::new(line, "unclosed interpolation"))?;
                let inner: String = chars[i + 2..close].iter().collect();
                let value = self.substitute(inner.trim(), line)?;
                out.push_str(unquote(value.trim()));
                i = close + 1;
                continue;
            }

            match quote {
                Some(q) => {
                    if c == q {
                        quote = None;
                    }
                    out.push(c);
                    i += 1;
                }
                None if c == '"' || c == '\'' => {
                    quote = Some(c);
                    out.push(c);
                    i += 1;
                }
                None if variables
                    && c == '$'
                    && chars
                        .get(i + 1)
                        .is_some_and(|n| n.is_alphabetic() || *n == '_' || *n == '-') =>
                {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && is_ident_char(chars[end]) {
                        end += 1;
                    }
                    let name: String = chars[start..end].iter().collect();
                    let value = self
                        .lookup_var(&name)
                        .ok_or_else(|| ScssError::new(line, format!("undefined variable ${}", name)))?;
                    out.push_str(value);
                    i = end;
                }
                None => {
                    out.push(c);
                    i += 1;
                }
            }
        }

        Ok(out)
    }
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn at_prelude(name: &str, params: &str) -> String {
    if params.is_empty() {
        format!("@{}", name)
    } else {
        format!("@{} {}", name, params)
    }
}

/// Combine a nested selector list with its parents.
fn resolve_selectors(parents: &[String], text: &str, line: usize) -> Result<Vec<String>> {
    let children: Vec<String> = split_top_level(text, ',')
        .into_iter()
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
        .collect();
    if children.is_empty() {
        return Err(ScssError::new(line, "expected selector"));
    }

    if parents.is_empty() {
        if children.iter().any(|c| c.contains('&')) {
            return Err(ScssError::new(
                line,
                "top-level selectors may not contain the parent selector '&'",
            ));
        }
        return Ok(children);
    }

    let mut resolved = Vec::with_capacity(parents.len() * children.len());
    for parent in parents {
        for child in &children {
            if child.contains('&') {
                resolved.push(child.replace('&', parent));
            } else {
                resolved.push(format!("{} {}", parent, child));
            }
        }
    }
    Ok(resolved)
}

// ---------------------------------------------------------------------------
// Output

fn write_css(items: &[Item], output: &Output<'_>) -> String {
    let mut css = String::new();
    let mut open: Vec<String> = Vec::new();
    // Whether the current nesting level already holds a child.
    let mut has_sibling: Vec<bool> = vec![false];

    for item in items {
        if matches!(item, Item::Block { decls, .. } if decls.is_empty()) {
            continue;
        }

        let wrappers = item.wrappers();
        let common = open
            .iter()
            .zip(wrappers)
            .take_while(|(a, b)| a == b)
            .count();

        while open.len() > common {
            open.pop();
            has_sibling.pop();
            css.push_str(&"  ".repeat(open.len()));
            css.push_str("}\n");
        }

        for wrapper in &wrappers[common..] {
            let depth = open.len();
            separate(&mut css, &mut has_sibling);
            css.push_str(&"  ".repeat(depth));
            css.push_str(wrapper);
            css.push_str(" {\n");
            open.push(wrapper.clone());
            has_sibling.push(false);
        }

        let depth = open.len();
        match item {
            Item::Statement { text, .. } => {
                separate(&mut css, &mut has_sibling);
                css.push_str(&"  ".repeat(depth));
                css.push_str(text);
                css.push_str(";\n");
            }
            Item::Block {
                selectors,
                decls,
                line,
                ..
            } => {
                if selectors.is_empty() {
                    // Declarations that belong to the enclosing at-rule.
                    for (property, value) in decls {
                        css.push_str(&"  ".repeat(depth));
                        css.push_str(&format!("{}: {};\n", property, value));
                    }
                    if let Some(flag) = has_sibling.last_mut() {
                        *flag = true;
                    }
                    continue;
                }
                separate(&mut css, &mut has_sibling);
                let indent = "  ".repeat(depth);
                if let Some(source) = output.line_comments {
                    css.push_str(&format!("{}/* line {}, {} */\n", indent, line, source));
                }
                css.push_str(&indent);
                css.push_str(&selectors.join(&format!(",\n{}", indent)));
                css.push_str(" {\n");
                for (property, value) in decls {
                    css.push_str(&format!("{}  {}: {};\n", indent, property, value));
                }
                css.push_str(&indent);
                css.push_str("}\n");
            }
        }
    }

    while !open.is_empty() {
        open.pop();
        css.push_str(&"  ".repeat(open.len()));
        css.push_str("}\n");
    }

    css
}

fn separate(css: &mut String, has_sibling: &mut [bool]) {
    if let Some(flag) = has_sibling.last_mut() {
        if *flag {
            css.push('\n');
        }
        *flag = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn css(source: &str) -> String {
        compile(source, &Output::default()).unwrap()
    }

    #[test]
    fn test_nested_rules_flatten() {
        let out = css(
            "body {\n  .work-block {\n    border: 1px solid #000;\n  }\n}\n\
             .work-block {\n  h2 {\n    &.title {\n      font-weight: 700;\n      color: red;\n    }\n  }\n}\n",
        );
        assert_eq!(
            out,
            "body .work-block {\n  border: 1px solid #000;\n}\n\n\
             .work-block h2.title {\n  font-weight: 700;\n  color: red;\n}\n"
        );
    }

    #[test]
    fn test_parent_declarations_come_first() {
        let out = css(".a { .b { x: 1; } y: 2; }");
        assert_eq!(out, ".a {\n  y: 2;\n}\n\n.a .b {\n  x: 1;\n}\n");
    }

    #[test]
    fn test_selector_lists_multiply() {
        let out = css(".a, .b { .c, &:hover { color: red } }");
        assert_eq!(
            out,
            ".a .c,\n.a:hover,\n.b .c,\n.b:hover {\n  color: red;\n}\n"
        );
    }

    #[test]
    fn test_variables_and_scope() {
        let out = css(
            "$gap: 4px;\n$gap: 8px !default;\n.a { $gap: 2px; margin: $gap; }\n.b { padding: $gap $gap; }",
        );
        assert_eq!(out, ".a {\n  margin: 2px;\n}\n\n.b {\n  padding: 4px 4px;\n}\n");
    }

    #[test]
    fn test_undefined_variable_reports_line() {
        let err = compile(".a {\n  color: $nope;\n}", &Output::default()).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("$nope"));
    }

    #[test]
    fn test_interpolation() {
        let out = css("$name: \"card\";\n.#{$name}-title { width: calc(100% - #{$name}); }");
        assert_eq!(out, ".card-title {\n  width: calc(100% - card);\n}\n");
    }

    #[test]
    fn test_media_bubbles_out_of_rule() {
        let out = css(".a { color: red; @media (min-width: 10px) { color: blue; .b { x: 1 } } }");
        assert_eq!(
            out,
            ".a {\n  color: red;\n}\n\n@media (min-width: 10px) {\n  .a {\n    color: blue;\n  }\n\n  .a .b {\n    x: 1;\n  }\n}\n"
        );
    }

    #[test]
    fn test_nested_media_merges() {
        let out = css("@media screen { .a { @media (min-width: 1px) { x: 1 } } }");
        assert_eq!(
            out,
            "@media screen and (min-width: 1px) {\n  .a {\n    x: 1;\n  }\n}\n"
        );
    }

    #[test]
    fn test_passthrough_at_rules() {
        let out = css(
            "@charset \"utf-8\";\n@font-face { font-family: X; src: url(a.woff); }\n@keyframes spin { from { a: 0 } to { a: 1 } }",
        );
        assert_eq!(
            out,
            "@charset \"utf-8\";\n\n@font-face {\n  font-family: X;\n  src: url(a.woff);\n}\n\n@keyframes spin {\n  from {\n    a: 0;\n  }\n\n  to {\n    a: 1;\n  }\n}\n"
        );
    }

    #[test]
    fn test_mixins() {
        let out = css(
            "@mixin box($w, $c: red) { width: $w; color: $c; }\n.a { @include box(1px); }\n.b { @include box(2px, $c: blue); }",
        );
        assert_eq!(
            out,
            ".a {\n  width: 1px;\n  color: red;\n}\n\n.b {\n  width: 2px;\n  color: blue;\n}\n"
        );
    }

    #[test]
    fn test_mixin_errors() {
        assert!(compile(".a { @include nope; }", &Output::default()).is_err());
        assert!(compile("@mixin m($a) { x: $a; } .a { @include m; }", &Output::default()).is_err());
        assert!(compile("@mixin m { .a { @include m; } } @include m;", &Output::default()).is_err());
    }

    #[test]
    fn test_comments_and_urls() {
        let out = css("// note\n.a { /* inline */ background: url(http://x/y.png); // trailing\n }");
        assert_eq!(out, ".a {\n  background: url(http://x/y.png);\n}\n");
    }

    #[test]
    fn test_syntax_errors() {
        assert!(compile(".a { color: red;", &Output::default()).is_err());
        assert!(compile(".a { }\n}", &Output::default()).is_err());
        assert!(compile(".a { color }", &Output::default()).is_err());
        assert!(compile("color: red;", &Output::default()).is_err());
        assert!(compile("& .a { x: 1 }", &Output::default()).is_err());
        assert!(compile("@use 'x';", &Output::default()).is_err());
    }

    #[test]
    fn test_line_comments() {
        let out = compile(
            "\n\n.a {\n  x: 1;\n}",
            &Output {
                line_comments: Some("components/card.html"),
            },
        )
        .unwrap();
        assert_eq!(out, "/* line 3, components/card.html */\n.a {\n  x: 1;\n}\n");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(css(""), "");
        assert_eq!(css("$only: vars;"), "");
    }

    #[test]
    fn test_attribute_selector_dollar_is_literal() {
        let out = css("a[href$=\".pdf\"] { x: 1 }");
        assert_eq!(out, "a[href$=\".pdf\"] {\n  x: 1;\n}\n");
    }
}

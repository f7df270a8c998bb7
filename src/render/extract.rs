//! Structural extraction of `<style>`, `<script>` and `<template>` blocks.
//!
//! One left-to-right pass over rendered component output. Nested components
//! have already been extracted by the time their output reaches an outer
//! component, so only blocks written directly in this component remain.
//!
//! Grammar (tag names ASCII case-insensitive, no nesting):
//! ```text
//! output   = { text | style | script | template }
//! style    = "<style" attrs ">" raw "</style" ws ">"
//! script   = "<script" attrs ">" raw "</script" ws ">"
//! template = "<template" attrs ">" raw "</template" ws ">"
//! ```
//! A single `<template>` surrounded only by whitespace, styles and scripts
//! is an envelope: its content is the visible body, and styles and scripts
//! inside it are extracted like any others. Otherwise templates stay in the
//! body untouched. Scripts with a `src` attribute or a non
//! JavaScript `type` stay in the body. An opening tag without a matching
//! close is plain text.

/// An extracted block and the 1-based line its content starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub text: String,
    pub line: usize,
}

/// Body with metadata blocks removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub body: String,
    pub styles: Vec<Block>,
    pub scripts: Vec<Block>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Style,
    Script,
    Template,
}

impl Tag {
    fn name(self) -> &'static str {
        match self {
            Tag::Style => "style",
            Tag::Script => "script",
            Tag::Template => "template",
        }
    }
}

enum Segment<'a> {
    Text(&'a str),
    Style(Block),
    Script(Block),
    Template {
        inner_start: usize,
        inner_end: usize,
        raw: &'a str,
    },
}

/// Split `html` into body, styles and scripts.
pub fn extract(html: &str) -> Extracted {
    let lower = html.to_ascii_lowercase();
    let segments = scan(html, &lower, 0, html.len(), true);

    let templates = segments
        .iter()
        .filter(|s| matches!(s, Segment::Template { .. }))
        .count();
    let envelope = templates == 1
        && segments.iter().all(|s| match s {
            Segment::Text(text) => text.trim().is_empty(),
            _ => true,
        });

    let mut out = Extracted::default();
    for segment in segments {
        match segment {
            Segment::Template {
                inner_start,
                inner_end,
                ..
            } if envelope => {
                // blocks written inside the envelope are metadata too
                for inner in scan(html, &lower, inner_start, inner_end, false) {
                    out.push(inner);
                }
            }
            Segment::Text(_) if envelope => {}
            segment => out.push(segment),
        }
    }
    out
}

impl Extracted {
    fn push(&mut self, segment: Segment<'_>) {
        match segment {
            Segment::Text(text) => self.body.push_str(text),
            Segment::Style(block) => self.styles.push(block),
            Segment::Script(block) => self.scripts.push(block),
            Segment::Template { raw, .. } => self.body.push_str(raw),
        }
    }
}

/// Segment `html[from..to]`. Line numbers are relative to all of `html`.
fn scan<'a>(
    html: &'a str,
    lower: &str,
    from: usize,
    to: usize,
    templates: bool,
) -> Vec<Segment<'a>> {
    let tags: &[Tag] = if templates {
        &[Tag::Style, Tag::Script, Tag::Template]
    } else {
        &[Tag::Style, Tag::Script]
    };
    let mut segments = Vec::new();
    let mut text_start = from;
    let mut cursor = from;

    while let Some(offset) = html[cursor..to].find('<') {
        let pos = cursor + offset;
        let Some(tag) = tags
            .iter()
            .copied()
            .find(|t| opens_tag(&lower[..to], pos, t.name()))
        else {
            cursor = pos + 1;
            continue;
        };
        let Some(open_end) = open_tag_end(&html[..to], pos) else {
            cursor = pos + 1;
            continue;
        };
        let Some((close_start, close_end)) = find_close(&lower[..to], open_end, tag.name())
        else {
            cursor = pos + 1;
            continue;
        };

        let segment = match tag {
            Tag::Style => Segment::Style(Block {
                text: html[open_end..close_start].to_string(),
                line: line_at(html, open_end),
            }),
            Tag::Script if is_inline_javascript(&html[pos..open_end]) => Segment::Script(Block {
                text: html[open_end..close_start].to_string(),
                line: line_at(html, open_end),
            }),
            Tag::Script => {
                // external or non-JS script: part of the body
                cursor = close_end;
                continue;
            }
            Tag::Template => Segment::Template {
                inner_start: open_end,
                inner_end: close_start,
                raw: &html[pos..close_end],
            },
        };

        if text_start < pos {
            segments.push(Segment::Text(&html[text_start..pos]));
        }
        segments.push(segment);
        text_start = close_end;
        cursor = close_end;
    }
    if text_start < to {
        segments.push(Segment::Text(&html[text_start..to]));
    }
    segments
}

/// `<name` at `pos`, followed by whitespace, `>` or `/`.
fn opens_tag(lower: &str, pos: usize, name: &str) -> bool {
    let bytes = lower.as_bytes();
    let start = pos + 1;
    let end = start + name.len();
    bytes.get(pos) == Some(&b'<')
        && bytes.get(start..end) == Some(name.as_bytes())
        && matches!(bytes.get(end), Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/')
}

/// Index just past the `>` closing the tag opened at `pos`.
fn open_tag_end(html: &str, pos: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in html.as_bytes().iter().enumerate().skip(pos + 1) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(i + 1),
            None => {}
        }
    }
    None
}

/// Locate `</name ws>` at or after `from`; returns (start, end) byte indices.
fn find_close(lower: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let needle = format!("</{}", name);
    let bytes = lower.as_bytes();
    let mut search = from;

    while let Some(offset) = lower[search..].find(&needle) {
        let start = search + offset;
        let mut i = start + needle.len();
        while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
            i += 1;
        }
        if bytes.get(i) == Some(&b'>') {
            return Some((start, i + 1));
        }
        search = start + needle.len();
    }
    None
}

fn line_at(html: &str, index: usize) -> usize {
    1 + html[..index].bytes().filter(|&b| b == b'\n').count()
}

/// Inline classic or module-less JavaScript: no `src`, JS or missing `type`.
fn is_inline_javascript(open_tag: &str) -> bool {
    let attrs = attributes(open_tag);
    if attrs.iter().any(|(name, _)| name == "src") {
        return false;
    }
    match attrs.iter().find(|(name, _)| name == "type") {
        None => true,
        Some((_, value)) => matches!(
            value.as_deref().map(str::trim).map(str::to_ascii_lowercase).as_deref(),
            None | Some("") | Some("text/javascript") | Some("application/javascript")
        ),
    }
}

/// Attribute names (lowercased) and values of an opening tag.
fn attributes(open_tag: &str) -> Vec<(String, Option<String>)> {
    let inner = open_tag
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim_end_matches('/');
    let mut chars = inner.char_indices().peekable();

    // skip the tag name
    while let Some((_, c)) = chars.peek() {
        if c.is_whitespace() {
            break;
        }
        chars.next();
    }

    let mut attrs = Vec::new();
    loop {
        while chars.peek().is_some_and(|(_, c)| c.is_whitespace()) {
            chars.next();
        }
        let Some(&(start, _)) = chars.peek() else {
            break;
        };
        let mut end = inner.len();
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() || c == '=' {
                end = i;
                break;
            }
            chars.next();
        }
        let name = inner[start..end].to_ascii_lowercase();

        while chars.peek().is_some_and(|(_, c)| c.is_whitespace()) {
            chars.next();
        }
        let mut value = None;
        if chars.peek().is_some_and(|(_, c)| *c == '=') {
            chars.next();
            while chars.peek().is_some_and(|(_, c)| c.is_whitespace()) {
                chars.next();
            }
            let mut v = String::new();
            match chars.peek().map(|(_, c)| *c) {
                Some(q @ ('"' | '\'')) => {
                    chars.next();
                    for (_, c) in chars.by_ref() {
                        if c == q {
                            break;
                        }
                        v.push(c);
                    }
                }
                _ => {
                    while let Some(&(_, c)) = chars.peek() {
                        if c.is_whitespace() {
                            break;
                        }
                        v.push(c);
                        chars.next();
                    }
                }
            }
            value = Some(v);
        }
        if !name.is_empty() {
            attrs.push((name, value));
        }
    }
    attrs
}

//! Text and markup views of an element sub-tree.
//!
//! Both views skip `script`/`style` sub-trees. The markup view rewrites every
//! `img` `src` to an absolute URL as it serializes, so the document itself is
//! never mutated.

use scraper::{ElementRef, Node};
use url::Url;

const STRIPPED: &[&str] = &["script", "style"];
const VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

fn is_stripped(el: &ElementRef<'_>) -> bool {
    STRIPPED.contains(&el.value().name())
}

/// Concatenate every text node under `el`, each trimmed, with no separator.
pub fn plain_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(el, "", &mut out);
    out
}

/// Like [`plain_text`], but text nodes are joined with one space.
pub fn spaced_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(el, " ", &mut out);
    out
}

fn collect_text(el: ElementRef<'_>, sep: &str, out: &mut String) {
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if !is_stripped(&child_el) {
                collect_text(child_el, sep, out);
            }
        } else if let Node::Text(text) = child.value() {
            let t = text.trim();
            if !t.is_empty() {
                if !out.is_empty() {
                    out.push_str(sep);
                }
                out.push_str(t);
            }
        }
    }
}

/// Inner markup of `el` with image sources made absolute against `base`.
pub fn inner_markup(el: ElementRef<'_>, base: &Url) -> String {
    let mut out = String::new();
    write_children(el, base, &mut out);
    out.trim().to_string()
}

fn write_children(el: ElementRef<'_>, base: &Url, out: &mut String) {
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if !is_stripped(&child_el) {
                write_element(child_el, base, out);
            }
        } else if let Node::Text(text) = child.value() {
            out.push_str(&escape(text, false));
        }
    }
}

fn write_element(el: ElementRef<'_>, base: &Url, out: &mut String) {
    let v = el.value();
    let name = v.name();
    out.push('<');
    out.push_str(name);
    for (key, value) in v.attrs() {
        let value = if name == "img" && key == "src" {
            absolutize(base, value)
        } else {
            value.to_string()
        };
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(&value, true));
        out.push('"');
    }
    out.push('>');
    if VOID.contains(&name) {
        return;
    }
    write_children(el, base, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Resolve `src` against `base`; unresolvable values are kept as written.
pub fn absolutize(base: &Url, src: &str) -> String {
    match base.join(src.trim()) {
        Ok(u) => u.to_string(),
        Err(e) => {
            tracing::debug!("keeping unresolvable image src {src:?}: {e}");
            src.to_string()
        }
    }
}

fn escape(s: &str, attr: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

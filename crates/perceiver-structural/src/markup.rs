//! Lenient HTML tokenizer producing a [`DomTree`].
//!
//! Handles the markup a captured page usually contains: void elements, unclosed
//! tags, comments, doctype, raw-text `script`/`style` bodies and the common
//! character references. It is not a conforming HTML5 parser.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{normalize_space, DomNode, DomTree};

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("attribute pattern is valid")
});

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

pub fn parse_markup(markup: &str) -> DomTree {
    let mut builder = TreeBuilder::default();
    let mut rest = markup;

    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            builder.text(rest);
            break;
        };
        if lt > 0 {
            builder.text(&rest[..lt]);
        }
        rest = &rest[lt..];

        if let Some(after) = rest.strip_prefix("<!--") {
            rest = match after.find("-->") {
                Some(end) => &after[end + 3..],
                None => "",
            };
            continue;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            rest = match rest.find('>') {
                Some(end) => &rest[end + 1..],
                None => "",
            };
            continue;
        }

        let Some(end) = find_tag_end(rest) else {
            builder.text(rest);
            break;
        };
        let inner = &rest[1..end];
        rest = &rest[end + 1..];

        if let Some(name) = inner.strip_prefix('/') {
            builder.close(&name.trim().to_ascii_lowercase());
            continue;
        }

        let Some((tag, attributes, self_closing)) = parse_open_tag(inner) else {
            builder.text("<");
            builder.text(inner);
            builder.text(">");
            continue;
        };

        if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
            builder.open(tag.clone(), attributes, true);
            let closing = format!("</{tag}");
            let lower = rest.to_ascii_lowercase();
            let body_end = lower.find(&closing).unwrap_or(rest.len());
            rest = &rest[body_end..];
            if let Some(close_end) = rest.find('>') {
                rest = &rest[close_end + 1..];
            } else {
                rest = "";
            }
            builder.pop();
            continue;
        }

        let void = self_closing || VOID_ELEMENTS.contains(&tag.as_str());
        builder.open(tag, attributes, void);
    }

    builder.finish()
}

/// Index of the `>` closing the tag at the start of `input`, honoring quotes.
fn find_tag_end(input: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (index, ch) in input.char_indices().skip(1) {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == '>' => return Some(index),
            None if ch == '<' && index == 1 => return None,
            None => {}
        }
    }
    None
}

fn parse_open_tag(inner: &str) -> Option<(String, BTreeMap<String, String>, bool)> {
    let trimmed = inner.trim_end();
    let self_closing = trimmed.ends_with('/');
    let body = trimmed.trim_end_matches('/');

    let name_end = body
        .find(|ch: char| ch.is_whitespace())
        .unwrap_or(body.len());
    let tag = body[..name_end].to_ascii_lowercase();
    if tag.is_empty() || !tag.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-') {
        return None;
    }

    let mut attributes = BTreeMap::new();
    for capture in ATTRIBUTE.captures_iter(&body[name_end..]) {
        let name = capture[1].to_ascii_lowercase();
        let value = capture
            .get(2)
            .or_else(|| capture.get(3))
            .or_else(|| capture.get(4))
            .map(|m| decode_entities(m.as_str()))
            .unwrap_or_default();
        attributes.entry(name).or_insert(value);
    }
    Some((tag, attributes, self_closing))
}

pub(crate) fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let window = rest
            .char_indices()
            .nth(12)
            .map(|(index, _)| index)
            .unwrap_or(rest.len());
        let Some(semi) = rest[..window].find(';') else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" | "#39" => Some('\''),
            "nbsp" => Some(' '),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn hides_itself(tag: &str, attributes: &BTreeMap<String, String>) -> bool {
    if attributes.contains_key("hidden") {
        return true;
    }
    if attributes
        .get("aria-hidden")
        .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    {
        return true;
    }
    if tag == "input"
        && attributes
            .get("type")
            .is_some_and(|value| value.eq_ignore_ascii_case("hidden"))
    {
        return true;
    }
    if matches!(tag, "head" | "title" | "meta" | "script" | "style" | "template") {
        return true;
    }
    attributes.get("style").is_some_and(|style| {
        let compact: String = style
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        compact.contains("display:none") || compact.contains("visibility:hidden")
    })
}

#[derive(Default)]
struct TreeBuilder {
    nodes: Vec<DomNode>,
    own_text: Vec<String>,
    full_text: Vec<String>,
    stack: Vec<usize>,
}

impl TreeBuilder {
    fn open(&mut self, tag: String, attributes: BTreeMap<String, String>, void: bool) {
        let index = self.nodes.len();
        let parent = self.stack.last().copied();
        let parent_hidden = parent
            .and_then(|p| self.nodes.get(p))
            .map(|node| node.hidden)
            .unwrap_or(false);
        let hidden = parent_hidden || hides_itself(&tag, &attributes);

        self.nodes.push(DomNode {
            index,
            tag,
            attributes,
            own_text: String::new(),
            text: String::new(),
            parent,
            children: Vec::new(),
            hidden,
        });
        self.own_text.push(String::new());
        self.full_text.push(String::new());
        if let Some(parent) = parent {
            self.nodes[parent].children.push(index);
        }
        if !void {
            self.stack.push(index);
        }
    }

    fn text(&mut self, raw: &str) {
        if self.stack.is_empty() {
            return;
        }
        let decoded = decode_entities(raw);
        if let Some(&top) = self.stack.last() {
            self.own_text[top].push_str(&decoded);
        }
        for &open in &self.stack {
            self.full_text[open].push_str(&decoded);
        }
    }

    fn close(&mut self, tag: &str) {
        if let Some(position) = self
            .stack
            .iter()
            .rposition(|&index| self.nodes[index].tag == tag)
        {
            self.stack.truncate(position);
        }
    }

    fn pop(&mut self) {
        self.stack.pop();
    }

    fn finish(mut self) -> DomTree {
        for (index, node) in self.nodes.iter_mut().enumerate() {
            node.own_text = normalize_space(&self.own_text[index]);
            node.text = normalize_space(&self.full_text[index]);
        }
        DomTree { nodes: self.nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_tree_with_text() {
        let tree = parse_markup(
            r#"<!DOCTYPE html><html><body><form id="login">
                <label>User <b>name</b></label>
                <input type="text" name="username" placeholder="Username">
                <button type="submit" class="btn primary">Sign &amp; in</button>
            </form></body></html>"#,
        );
        let button = tree
            .nodes()
            .iter()
            .find(|node| node.tag == "button")
            .unwrap();
        assert_eq!(button.text, "Sign & in");
        assert!(button.has_class("primary"));
        let label = tree.nodes().iter().find(|node| node.tag == "label").unwrap();
        assert_eq!(label.text, "User name");
        assert_eq!(label.own_text, "User");
        let input = tree.nodes().iter().find(|node| node.tag == "input").unwrap();
        assert!(input.children.is_empty());
        assert_eq!(input.attr("placeholder"), Some("Username"));
        let form = tree.get(input.parent.unwrap()).unwrap();
        assert_eq!(form.id(), Some("login"));
    }

    #[test]
    fn skips_script_bodies_and_comments() {
        let tree = parse_markup(
            "<div><!-- <p>gone</p> --><script>if (a < b) { x('<p>') }</script><p>kept</p></div>",
        );
        assert!(tree.nodes().iter().all(|node| node.text != "gone"));
        let div = tree.get(0).unwrap();
        assert_eq!(div.text, "kept");
        assert_eq!(tree.nodes().iter().filter(|n| n.tag == "p").count(), 1);
    }

    #[test]
    fn hidden_state_is_inherited() {
        let tree = parse_markup(
            r#"<div style="display: none"><span>a</span></div><input type="hidden" name="csrf"><p hidden>b</p><p>c</p>"#,
        );
        let span = tree.nodes().iter().find(|n| n.tag == "span").unwrap();
        assert!(span.hidden);
        let csrf = tree.nodes().iter().find(|n| n.tag == "input").unwrap();
        assert!(csrf.hidden);
        let visible: Vec<_> = tree
            .nodes()
            .iter()
            .filter(|n| n.tag == "p" && !n.hidden)
            .collect();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].text, "c");
    }

    #[test]
    fn tolerates_unclosed_and_stray_tags() {
        let tree = parse_markup("<ul><li>one<li>two</ul></span><p>after");
        assert_eq!(tree.nodes().iter().filter(|n| n.tag == "li").count(), 2);
        let p = tree.nodes().iter().find(|n| n.tag == "p").unwrap();
        assert_eq!(p.text, "after");
    }

    #[test]
    fn decodes_numeric_references() {
        assert_eq!(decode_entities("a&#39;b&#x41;&unknown;"), "a'bA&unknown;");
    }

    #[test]
    fn unquoted_and_single_quoted_attributes() {
        let tree = parse_markup("<input type=email data-testid='email-field' disabled>");
        let input = tree.get(0).unwrap();
        assert_eq!(input.attr("type"), Some("email"));
        assert_eq!(input.attr("data-testid"), Some("email-field"));
        assert_eq!(input.attr("disabled"), Some(""));
    }
}

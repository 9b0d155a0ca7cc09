//! Markup → [`PageCatalog`].
//!
//! Every discovered element gets a locator that matches exactly that element in
//! the analyzed markup. Candidates are tried from most to least stable and the
//! positional `(//tag)[n]` form is the last resort.

use tracing::debug;

use crate::errors::PerceiverError;
use crate::markup::parse_markup;
use crate::model::{
    truncate_chars, DiscoveredElement, DomNode, DomTree, ElementCategory, Locator, PageCatalog,
    QueryMode,
};
use crate::query::{self, css_string, is_css_identifier, xpath_literal};

const MAX_TEXT_LOCATOR_CHARS: usize = 50;
const MAX_LABEL_CHARS: usize = 120;

pub trait PageAnalyzer: Send + Sync {
    fn analyze(&self, markup: &str) -> Result<PageCatalog, PerceiverError>;
}

#[derive(Debug, Clone, Default)]
pub struct MarkupAnalyzer {
    include_hidden: bool,
}

impl MarkupAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep elements that are hidden in the analyzed markup (marked `visible: false`).
    pub fn with_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    pub fn analyze_tree(&self, tree: &DomTree) -> PageCatalog {
        let mut elements = Vec::new();
        for node in tree.nodes() {
            if node.hidden && !self.include_hidden {
                continue;
            }
            let Some(category) = classify(node) else {
                continue;
            };
            elements.push(describe(tree, node, category));
        }
        debug!(elements = elements.len(), "markup analyzed");
        PageCatalog {
            title: tree.title().map(str::to_string),
            elements,
        }
    }
}

impl PageAnalyzer for MarkupAnalyzer {
    fn analyze(&self, markup: &str) -> Result<PageCatalog, PerceiverError> {
        if markup.trim().is_empty() {
            return Err(PerceiverError::DocumentUnavailable(
                "empty markup".to_string(),
            ));
        }
        Ok(self.analyze_tree(&parse_markup(markup)))
    }
}

pub fn classify(node: &DomNode) -> Option<ElementCategory> {
    let role = node.attr("role").map(str::to_ascii_lowercase);
    match node.tag.as_str() {
        "input" => {
            let kind = node
                .attr("type")
                .map(str::to_ascii_lowercase)
                .unwrap_or_else(|| "text".to_string());
            return match kind.as_str() {
                "hidden" => None,
                "password" => Some(ElementCategory::Password),
                "submit" | "button" | "reset" | "image" => Some(ElementCategory::Button),
                "checkbox" | "radio" => Some(ElementCategory::Toggle),
                _ => Some(ElementCategory::Input),
            };
        }
        "textarea" => return Some(ElementCategory::Input),
        "select" => return Some(ElementCategory::Select),
        "button" => return Some(ElementCategory::Button),
        "a" if node.attr("href").is_some() => return Some(ElementCategory::Link),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => return Some(ElementCategory::Heading),
        _ => {}
    }
    if role.as_deref() == Some("button") {
        return Some(ElementCategory::Button);
    }

    let markers = [node.id(), node.attr("class"), node.attr("data-testid")];
    let marked = |needle: &str| {
        markers
            .iter()
            .flatten()
            .any(|marker| marker.to_ascii_lowercase().contains(needle))
    };
    if marked("success") || role.as_deref() == Some("status") {
        return Some(ElementCategory::Success);
    }
    if marked("error") || marked("danger") || marked("invalid") || role.as_deref() == Some("alert")
    {
        return Some(ElementCategory::Error);
    }
    None
}

fn describe(tree: &DomTree, node: &DomNode, category: ElementCategory) -> DiscoveredElement {
    let non_empty = |name: &str| {
        node.attr(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    let text = Some(node.text.as_str())
        .filter(|text| !text.is_empty())
        .map(|text| truncate_chars(text, MAX_LABEL_CHARS));

    DiscoveredElement {
        category,
        tag: node.tag.clone(),
        id: node.id().map(str::to_string),
        name: non_empty("name"),
        input_type: non_empty("type").map(|kind| kind.to_ascii_lowercase()),
        text,
        placeholder: non_empty("placeholder"),
        aria_label: non_empty("aria-label"),
        test_id: non_empty("data-testid"),
        classes: node.classes().map(str::to_string).collect(),
        locator: unique_locator(tree, node),
        visible: !node.hidden,
    }
}

/// Most stable selector that matches `node` and nothing else.
pub fn unique_locator(tree: &DomTree, node: &DomNode) -> Locator {
    candidates(node)
        .into_iter()
        .find(|candidate| matches_only(tree, candidate, node.index))
        .unwrap_or_else(|| positional(tree, node))
}

fn candidates(node: &DomNode) -> Vec<Locator> {
    let tag = node.tag.as_str();
    let mut out = Vec::new();

    if let Some(id) = node.id() {
        if is_css_identifier(id) {
            out.push(Locator::css(format!("#{id}")));
        } else {
            out.push(Locator::css(format!("[id={}]", css_string(id))));
        }
    }
    for attr in ["data-testid", "name", "aria-label", "placeholder"] {
        if let Some(value) = node.attr(attr).filter(|value| !value.trim().is_empty()) {
            let prefix = if attr == "data-testid" { "" } else { tag };
            out.push(Locator::css(format!("{prefix}[{attr}={}]", css_string(value))));
        }
    }
    if !node.own_text.is_empty() && node.own_text.chars().count() < MAX_TEXT_LOCATOR_CHARS {
        out.push(Locator::xpath(format!(
            "//{tag}[normalize-space(text())={}]",
            xpath_literal(&node.own_text)
        )));
    }
    let classes: Vec<&str> = node.classes().filter(|class| is_css_identifier(class)).collect();
    if !classes.is_empty() {
        out.push(Locator::css(format!("{tag}.{}", classes.join("."))));
    }
    if let Some(kind) = node.attr("type").filter(|kind| is_css_identifier(kind)) {
        out.push(Locator::css(format!("{tag}[type={}]", css_string(kind))));
    }
    out
}

fn matches_only(tree: &DomTree, locator: &Locator, index: usize) -> bool {
    match query::select(tree, locator.mode, &locator.selector) {
        Ok(found) => found.len() == 1 && found[0] == index,
        Err(err) => {
            debug!(selector = %locator.selector, error = %err, "candidate locator rejected");
            false
        }
    }
}

fn positional(tree: &DomTree, node: &DomNode) -> Locator {
    let position = tree
        .nodes()
        .iter()
        .filter(|candidate| candidate.tag == node.tag && candidate.index <= node.index)
        .count();
    Locator {
        mode: QueryMode::XPath,
        selector: format!("(//{})[{position}]", node.tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN: &str = r#"<html><head><title>Sign in</title></head><body>
        <h1>Welcome</h1>
        <form>
          <input type="text" name="username" placeholder="Username">
          <input type="password" name="password">
          <input type="hidden" name="csrf">
          <input type="checkbox" id="remember">
          <button type="submit" class="btn btn-primary">Sign in</button>
          <button type="button" class="btn">Cancel</button>
        </form>
        <div class="flash flash-error" role="alert">Bad credentials</div>
        <div id="success-banner" style="display:none">Done</div>
        <a href="/help">Help</a>
        <li>one</li><li>one</li>
      </body></html>"#;

    fn catalog() -> PageCatalog {
        MarkupAnalyzer::new().analyze(LOGIN).unwrap()
    }

    #[test]
    fn classifies_interactive_and_message_elements() {
        let catalog = catalog();
        assert_eq!(catalog.title.as_deref(), Some("Sign in"));
        assert_eq!(catalog.by_category(ElementCategory::Input).count(), 1);
        assert_eq!(catalog.by_category(ElementCategory::Password).count(), 1);
        assert_eq!(catalog.by_category(ElementCategory::Toggle).count(), 1);
        assert_eq!(catalog.by_category(ElementCategory::Button).count(), 2);
        assert_eq!(catalog.by_category(ElementCategory::Heading).count(), 1);
        assert_eq!(catalog.by_category(ElementCategory::Link).count(), 1);
        assert_eq!(catalog.by_category(ElementCategory::Error).count(), 1);
        assert_eq!(catalog.by_category(ElementCategory::Success).count(), 0);
    }

    #[test]
    fn hidden_elements_are_opt_in() {
        let catalog = MarkupAnalyzer::new().with_hidden(true).analyze(LOGIN).unwrap();
        let banner = catalog.first(ElementCategory::Success).unwrap();
        assert!(!banner.visible);
        assert_eq!(banner.locator.selector, "#success-banner");
    }

    #[test]
    fn locators_are_unique_and_prefer_stable_attributes() {
        let catalog = catalog();
        let username = catalog.first(ElementCategory::Input).unwrap();
        assert_eq!(username.locator, Locator::css(r#"input[name="username"]"#));

        let remember = catalog.first(ElementCategory::Toggle).unwrap();
        assert_eq!(remember.locator, Locator::css("#remember"));

        let submit = catalog.first(ElementCategory::Button).unwrap();
        assert_eq!(
            submit.locator,
            Locator::xpath("//button[normalize-space(text())='Sign in']")
        );

        let tree = parse_markup(LOGIN);
        for element in &catalog.elements {
            let found = query::select(&tree, element.locator.mode, &element.locator.selector)
                .unwrap();
            assert_eq!(found.len(), 1, "{} is not unique", element.locator);
        }
    }

    #[test]
    fn falls_back_to_positional_locator() {
        let tree = parse_markup("<div><li>one</li><li>one</li></div>");
        let second = tree.nodes().iter().filter(|n| n.tag == "li").nth(1).unwrap();
        assert_eq!(unique_locator(&tree, second), Locator::xpath("(//li)[2]"));
    }

    #[test]
    fn empty_markup_is_an_error() {
        assert!(matches!(
            MarkupAnalyzer::new().analyze("   "),
            Err(PerceiverError::DocumentUnavailable(_))
        ));
    }
}

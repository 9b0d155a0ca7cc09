use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a selector string is evaluated against a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Css,
    XPath,
}

impl QueryMode {
    pub fn name(&self) -> &'static str {
        match self {
            QueryMode::Css => "css",
            QueryMode::XPath => "xpath",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A selector together with the query dialect it is written in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub mode: QueryMode,
    pub selector: String,
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            mode: QueryMode::Css,
            selector: selector.into(),
        }
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Self {
            mode: QueryMode::XPath,
            selector: selector.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mode, self.selector)
    }
}

/// Opaque reference to an element inside one document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    pub node_id: String,
    pub tag: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl ElementHandle {
    pub fn new(node_id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            tag: tag.into(),
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.is_empty() {
            self.text = Some(text);
        }
        self
    }
}

#[derive(Clone, Debug)]
pub struct DomNode {
    pub index: usize,
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    /// Text of the node's own text children, whitespace-normalized.
    pub own_text: String,
    /// Full text content of the subtree, whitespace-normalized.
    pub text: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub hidden: bool,
}

impl DomNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|value| value.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id").filter(|id| !id.is_empty())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|candidate| candidate == class)
    }
}

/// Parsed document, nodes stored in document order.
#[derive(Clone, Debug, Default)]
pub struct DomTree {
    pub(crate) nodes: Vec<DomNode>,
}

impl DomTree {
    pub fn nodes(&self) -> &[DomNode] {
        &self.nodes
    }

    pub fn get(&self, index: usize) -> Option<&DomNode> {
        self.nodes.get(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> impl Iterator<Item = &DomNode> {
        self.nodes.iter().filter(|node| node.parent.is_none())
    }

    /// Descendants of `index` in document order, excluding the node itself.
    pub fn descendants(&self, index: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = match self.nodes.get(index) {
            Some(node) => node.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(node) = self.nodes.get(current) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    pub fn title(&self) -> Option<&str> {
        self.nodes
            .iter()
            .find(|node| node.tag == "title")
            .map(|node| node.text.as_str())
            .filter(|title| !title.is_empty())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementCategory {
    Input,
    Password,
    Toggle,
    Select,
    Button,
    Link,
    Heading,
    Success,
    Error,
    Other,
}

impl ElementCategory {
    pub fn name(&self) -> &'static str {
        match self {
            ElementCategory::Input => "input",
            ElementCategory::Password => "password",
            ElementCategory::Toggle => "toggle",
            ElementCategory::Select => "select",
            ElementCategory::Button => "button",
            ElementCategory::Link => "link",
            ElementCategory::Heading => "heading",
            ElementCategory::Success => "success",
            ElementCategory::Error => "error",
            ElementCategory::Other => "other",
        }
    }

    pub fn is_message(&self) -> bool {
        matches!(self, ElementCategory::Success | ElementCategory::Error)
    }
}

impl fmt::Display for ElementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An element the analyzer considers worth addressing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscoveredElement {
    pub category: ElementCategory,
    pub tag: String,
    pub id: Option<String>,
    pub name: Option<String>,
    pub input_type: Option<String>,
    pub text: Option<String>,
    pub placeholder: Option<String>,
    pub aria_label: Option<String>,
    pub test_id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    pub locator: Locator,
    pub visible: bool,
}

impl DiscoveredElement {
    /// Best human-readable label for prompts and naming.
    pub fn label(&self) -> Option<&str> {
        self.aria_label
            .as_deref()
            .or(self.text.as_deref())
            .or(self.placeholder.as_deref())
            .or(self.name.as_deref())
            .or(self.id.as_deref())
    }

    pub fn summary_line(&self) -> String {
        let mut line = format!("- {} <{}", self.category, self.tag);
        if let Some(kind) = &self.input_type {
            line.push_str(&format!(" type={kind}"));
        }
        line.push('>');
        if let Some(label) = self.label() {
            line.push_str(&format!(" \"{}\"", truncate_chars(label, 40)));
        }
        line.push_str(&format!(" -> {}", self.locator.selector));
        line
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PageCatalog {
    pub title: Option<String>,
    pub elements: Vec<DiscoveredElement>,
}

impl PageCatalog {
    pub fn by_category(
        &self,
        category: ElementCategory,
    ) -> impl Iterator<Item = &DiscoveredElement> {
        self.elements
            .iter()
            .filter(move |element| element.category == category)
    }

    pub fn first(&self, category: ElementCategory) -> Option<&DiscoveredElement> {
        self.by_category(category).next()
    }

    pub fn inventory(&self, limit: usize) -> Vec<&DiscoveredElement> {
        self.elements
            .iter()
            .filter(|element| element.visible)
            .take(limit)
            .collect()
    }

    /// Capped, line-per-element listing fed to the suggestion prompt.
    pub fn inventory_summary(&self, limit: usize) -> String {
        let lines: Vec<String> = self
            .inventory(limit)
            .into_iter()
            .map(|element| element.summary_line())
            .collect();
        if lines.is_empty() {
            "(no discoverable elements)".to_string()
        } else {
            lines.join("\n")
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

pub(crate) fn truncate_chars(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let mut out: String = value.chars().take(max).collect();
        out.push('…');
        out
    }
}

pub(crate) fn normalize_space(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

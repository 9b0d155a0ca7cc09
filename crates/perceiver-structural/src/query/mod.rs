//! Selector evaluation against a parsed [`DomTree`].
//!
//! Two dialects are understood, picked by [`QueryMode`] rather than by looking at
//! the selector text:
//! - CSS: type, universal, `#id`, `.class` and attribute selectors (`=`, `*=`, `^=`,
//!   `$=`, `~=`, `|=`, optional `i` flag), descendant and child combinators, and
//!   selector lists.
//! - XPath: absolute location paths built from `/` and `//` steps with name tests
//!   and predicates using `and`/`or`/`not()`, `=`/`!=`, `@attr`, `text()`, `.`,
//!   `contains()`, `starts-with()`, `normalize-space()`, `concat()`,
//!   `translate()`, `position()`, `last()` and numeric positions, plus a
//!   parenthesized path followed by a position.
//!
//! Anything else is reported as [`PerceiverError::UnsupportedSelector`].

mod css;
mod xpath;

use crate::errors::PerceiverError;
use crate::model::{DomTree, QueryMode};

/// Indices of matching nodes, in document order.
pub fn select(tree: &DomTree, mode: QueryMode, selector: &str) -> Result<Vec<usize>, PerceiverError> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Err(PerceiverError::invalid_selector(selector, "empty selector"));
    }
    match mode {
        QueryMode::Css => css::select(tree, trimmed),
        QueryMode::XPath => xpath::select(tree, trimmed),
    }
}

/// Checks that `selector` parses in the given dialect without evaluating it.
pub fn validate(mode: QueryMode, selector: &str) -> Result<(), PerceiverError> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Err(PerceiverError::invalid_selector(selector, "empty selector"));
    }
    match mode {
        QueryMode::Css => css::parse(trimmed).map(|_| ()),
        QueryMode::XPath => xpath::parse(trimmed).map(|_| ()),
    }
}

/// Double-quoted CSS string with `"` and `\` escaped.
pub fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// XPath string literal for `value`; falls back to `concat()` when both quote kinds occur.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts: Vec<String> = value
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// True when `value` can be written as a bare CSS identifier.
pub fn is_css_identifier(value: &str) -> bool {
    match value.chars().next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        Some('-') => {}
        _ => return false,
    }
    value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        && value != "-"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_markup;

    const PAGE: &str = r#"
        <html><body>
          <h1 class="title main">Welcome back</h1>
          <form id="login-form">
            <input id="username" type="text" placeholder="Username" aria-label="User name">
            <input type="password" name="password" data-testid="password">
            <button type="submit" class="btn btn-primary">Sign in</button>
          </form>
          <ul><li>one</li><li>two</li></ul>
          <ul><li>three</li></ul>
          <p class="flash error">Invalid   credentials</p>
        </body></html>
    "#;

    fn tags(tree: &DomTree, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .map(|&i| tree.get(i).unwrap().tag.clone())
            .collect()
    }

    fn texts(tree: &DomTree, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .map(|&i| tree.get(i).unwrap().text.clone())
            .collect()
    }

    #[test]
    fn css_id_class_and_attributes() {
        let tree = parse_markup(PAGE);
        assert_eq!(tags(&tree, &select(&tree, QueryMode::Css, "#username").unwrap()), ["input"]);
        assert_eq!(
            tags(&tree, &select(&tree, QueryMode::Css, "button.btn.btn-primary").unwrap()),
            ["button"]
        );
        assert_eq!(
            select(&tree, QueryMode::Css, r#"[data-testid="password"]"#)
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            select(&tree, QueryMode::Css, r#"input[placeholder^='User']"#)
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            select(&tree, QueryMode::Css, r#"[aria-label="user NAME" i]"#)
                .unwrap()
                .len(),
            1
        );
        assert!(select(&tree, QueryMode::Css, "#missing").unwrap().is_empty());
    }

    #[test]
    fn css_combinators_and_lists() {
        let tree = parse_markup(PAGE);
        assert_eq!(select(&tree, QueryMode::Css, "form > input").unwrap().len(), 2);
        assert_eq!(select(&tree, QueryMode::Css, "body li").unwrap().len(), 3);
        assert_eq!(select(&tree, QueryMode::Css, "form>li").unwrap().len(), 0);
        assert_eq!(
            tags(&tree, &select(&tree, QueryMode::Css, "h1, button").unwrap()),
            ["h1", "button"]
        );
    }

    #[test]
    fn css_rejects_malformed_and_unsupported() {
        let tree = parse_markup(PAGE);
        assert!(matches!(
            select(&tree, QueryMode::Css, "[data-testid=\"x\""),
            Err(PerceiverError::InvalidSelector { .. })
        ));
        assert!(matches!(
            select(&tree, QueryMode::Css, "li:first-child"),
            Err(PerceiverError::UnsupportedSelector { .. })
        ));
        assert!(select(&tree, QueryMode::Css, "h1 ,").is_err());
        assert!(select(&tree, QueryMode::Css, "//button").is_err());
    }

    #[test]
    fn xpath_text_and_attribute_predicates() {
        let tree = parse_markup(PAGE);
        let found = select(&tree, QueryMode::XPath, "//*[normalize-space(text())='Sign in']").unwrap();
        assert_eq!(tags(&tree, &found), ["button"]);

        let found = select(
            &tree,
            QueryMode::XPath,
            "//input[@type='text' and @placeholder='Username']",
        )
        .unwrap();
        assert_eq!(found.len(), 1);

        let found = select(
            &tree,
            QueryMode::XPath,
            "//*[contains(normalize-space(text()), 'Invalid cred')]",
        )
        .unwrap();
        assert_eq!(tags(&tree, &found), ["p"]);

        let found = select(&tree, QueryMode::XPath, "//*[contains(@class, 'error')]").unwrap();
        assert_eq!(found.len(), 1);

        let found = select(&tree, QueryMode::XPath, "//input[not(@id)]").unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn xpath_paths_and_positions() {
        let tree = parse_markup(PAGE);
        let first_items = select(&tree, QueryMode::XPath, "//ul/li[1]").unwrap();
        assert_eq!(texts(&tree, &first_items), ["one", "three"]);

        let second = select(&tree, QueryMode::XPath, "(//li)[2]").unwrap();
        assert_eq!(texts(&tree, &second), ["two"]);

        let last = select(&tree, QueryMode::XPath, "//ul[last()]/li").unwrap();
        assert_eq!(texts(&tree, &last), ["three"]);

        let nested = select(&tree, QueryMode::XPath, "//form//button[@type=\"submit\"]").unwrap();
        assert_eq!(nested.len(), 1);

        let out_of_range = select(&tree, QueryMode::XPath, "(//li)[9]").unwrap();
        assert!(out_of_range.is_empty());
    }

    #[test]
    fn xpath_case_folding_with_translate() {
        let tree = parse_markup(PAGE);
        let found = select(
            &tree,
            QueryMode::XPath,
            "//*[contains(translate(text(), 'ABCDEFGHIJKLMNOPQRSTUVWXYZ', 'abcdefghijklmnopqrstuvwxyz'), 'welcome')]",
        )
        .unwrap();
        assert_eq!(tags(&tree, &found), ["h1"]);
    }

    #[test]
    fn quoting_helpers_round_trip_through_the_evaluator() {
        let tree = parse_markup(r#"<p title='say "hi"'>It's here</p>"#);
        let css = format!("[title={}]", css_string(r#"say "hi""#));
        assert_eq!(select(&tree, QueryMode::Css, &css).unwrap().len(), 1);

        let xpath = format!("//p[text()={}]", xpath_literal("It's here"));
        assert_eq!(select(&tree, QueryMode::XPath, &xpath).unwrap().len(), 1);

        assert_eq!(
            xpath_literal(r#"a'b"c"#),
            r#"concat('a', "'", 'b"c')"#
        );
        assert!(is_css_identifier("login-form"));
        assert!(!is_css_identifier("1st"));
        assert!(!is_css_identifier("a b"));
    }

    #[test]
    fn xpath_rejects_malformed_and_unsupported() {
        let tree = parse_markup(PAGE);
        assert!(matches!(
            select(&tree, QueryMode::XPath, "//button[@type='submit'"),
            Err(PerceiverError::InvalidSelector { .. })
        ));
        assert!(matches!(
            select(&tree, QueryMode::XPath, "//button/following-sibling::p"),
            Err(PerceiverError::UnsupportedSelector { .. })
        ));
        assert!(select(&tree, QueryMode::XPath, "#username").is_err());
        assert!(validate(QueryMode::XPath, "//a[@href]").is_ok());
        assert!(validate(QueryMode::Css, "").is_err());
    }
}

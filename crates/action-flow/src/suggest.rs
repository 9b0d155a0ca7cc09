//! Prompting the backend for a replacement selector

use once_cell::sync::Lazy;
use regex::Regex;
use selector_registry::validate_selector;

use crate::types::HealingContext;

static SELECTOR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^\s*selector:\s*(.+?)\s*$").expect("valid pattern"));

pub fn healing_prompt(context: &HealingContext, inventory: &str) -> String {
    let target = context
        .failed_element_ref
        .as_deref()
        .unwrap_or("(unnamed element)");
    format!(
        "A UI test step failed because its element selector no longer works.\n\
         Step: {step}\n\
         Page: {page}\n\
         Element: {target}\n\
         Error ({kind}): {error}\n\
         \n\
         Elements currently on the page:\n\
         {inventory}\n\
         \n\
         Answer with exactly one line in the form\n\
         SELECTOR: <css or xpath selector>",
        step = context.step_text,
        page = context.page_name,
        kind = context.error_kind,
        error = context.error_message,
    )
}

/// Selector from a `SELECTOR: <value>` reply, if well formed
pub fn parse_selector_reply(reply: &str) -> Option<String> {
    let captures = SELECTOR_LINE.captures(reply)?;
    let raw = captures.get(1)?.as_str();
    let value = raw.trim_matches(|ch| ch == '`' || ch == '\'' || ch == '"').trim();
    // quoted attribute values legitimately end in a quote; keep those intact
    let value = if validate_selector(value).is_ok() {
        value
    } else {
        raw.trim_matches('`').trim()
    };
    validate_selector(value).ok().map(str::to_string)
}

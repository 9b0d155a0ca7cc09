//! Keyword heuristics mapping step text to a catalog element

use perceiver_structural::{DiscoveredElement, ElementCategory, PageCatalog};

/// A catalog element picked by keyword, with the rule that picked it
#[derive(Debug, Clone)]
pub struct HeuristicMatch<'a> {
    pub element: &'a DiscoveredElement,
    pub rule: &'static str,
}

/// First rule whose keywords occur in `step_text` and that finds a visible element
pub fn heuristic_match<'a>(step_text: &str, catalog: &'a PageCatalog) -> Option<HeuristicMatch<'a>> {
    let step = step_text.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|word| step.contains(word));
    let visible = |category: ElementCategory| catalog.by_category(category).filter(|e| e.visible);

    if mentions(&["username", "email"]) {
        let wants_email = step.contains("email");
        let mut inputs = visible(ElementCategory::Input).filter(|element| {
            matches!(
                element.input_type.as_deref(),
                None | Some("text") | Some("email")
            )
        });
        let picked = if wants_email {
            let candidates: Vec<_> = inputs.collect();
            candidates
                .iter()
                .find(|element| element.input_type.as_deref() == Some("email"))
                .or_else(|| candidates.first())
                .copied()
        } else {
            inputs.next()
        };
        if let Some(element) = picked {
            return Some(HeuristicMatch {
                element,
                rule: "text input for username/email step",
            });
        }
    }

    if mentions(&["password"]) {
        if let Some(element) = visible(ElementCategory::Password).next() {
            return Some(HeuristicMatch {
                element,
                rule: "password input for password step",
            });
        }
    }

    if mentions(&["button", "click"]) {
        if let Some(element) = visible(ElementCategory::Button).next() {
            return Some(HeuristicMatch {
                element,
                rule: "button for click step",
            });
        }
    }

    if mentions(&["heading", "title"]) {
        if let Some(element) = visible(ElementCategory::Heading).next() {
            return Some(HeuristicMatch {
                element,
                rule: "first heading for heading step",
            });
        }
    }

    if mentions(&["message", "error", "text"]) {
        let preferred = if step.contains("error") {
            visible(ElementCategory::Error).next()
        } else if step.contains("success") {
            visible(ElementCategory::Success).next()
        } else {
            None
        };
        let element = preferred.or_else(|| {
            catalog
                .elements
                .iter()
                .find(|element| element.visible && element.category.is_message())
        });
        if let Some(element) = element {
            return Some(HeuristicMatch {
                element,
                rule: "message region for message step",
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use perceiver_structural::{MarkupAnalyzer, PageAnalyzer};

    const PAGE: &str = r#"<html><body>
        <h1>Welcome</h1>
        <form>
          <input type="text" name="user">
          <input type="email" name="mail">
          <input type="password" name="pw">
          <input type="submit" value="Sign in">
        </form>
        <div class="alert alert-success">Saved</div>
        <div class="error-message">Wrong password</div>
    </body></html>"#;

    fn catalog() -> PageCatalog {
        MarkupAnalyzer::new().analyze(PAGE).unwrap()
    }

    fn picked(step: &str) -> Option<String> {
        let catalog = catalog();
        heuristic_match(step, &catalog).map(|m| m.element.locator.selector.clone())
    }

    #[test]
    fn maps_keywords_to_categories() {
        let catalog = catalog();
        let user = heuristic_match("I type my username", &catalog).unwrap();
        assert_eq!(user.element.name.as_deref(), Some("user"));
        let mail = heuristic_match("I enter my email", &catalog).unwrap();
        assert_eq!(mail.element.name.as_deref(), Some("mail"));
        let pw = heuristic_match("I enter the password", &catalog).unwrap();
        assert_eq!(pw.element.category, ElementCategory::Password);
        let submit = heuristic_match("I click sign in", &catalog).unwrap();
        assert_eq!(submit.element.category, ElementCategory::Button);
        let heading = heuristic_match("the page title is shown", &catalog).unwrap();
        assert_eq!(heading.element.tag, "h1");
    }

    #[test]
    fn message_steps_prefer_matching_tone() {
        let catalog = catalog();
        let error = heuristic_match("an error is displayed", &catalog).unwrap();
        assert_eq!(error.element.category, ElementCategory::Error);
        let success = heuristic_match("a success message appears", &catalog).unwrap();
        assert_eq!(success.element.category, ElementCategory::Success);
    }

    #[test]
    fn unrelated_steps_match_nothing() {
        assert!(picked("I wait for the spinner").is_none());
        let empty = PageCatalog::default();
        assert!(heuristic_match("I click the button", &empty).is_none());
    }
}

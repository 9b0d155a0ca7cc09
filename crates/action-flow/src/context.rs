//! Scenario-scoped healing state

use std::collections::HashSet;

use tracing::debug;

/// Healing bookkeeping for one scenario. Create one at scenario start and
/// pass it to every guarded step of that scenario.
#[derive(Debug, Default, Clone)]
pub struct ScenarioContext {
    name: String,
    heal_requests: u32,
    regenerated_pages: HashSet<String>,
}

impl ScenarioContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start a new scenario, dropping every guard from the previous one
    pub fn reset(&mut self, name: impl Into<String>) {
        debug!(
            previous = %self.name,
            heals = self.heal_requests,
            regenerated = self.regenerated_pages.len(),
            "scenario healing state reset"
        );
        self.name = name.into();
        self.heal_requests = 0;
        self.regenerated_pages.clear();
    }

    /// Count a heal request and return its 1-based number
    pub fn begin_heal(&mut self) -> u32 {
        self.heal_requests += 1;
        self.heal_requests
    }

    pub fn healing_attempted(&self) -> bool {
        self.heal_requests > 0
    }

    pub fn heal_requests(&self) -> u32 {
        self.heal_requests
    }

    /// Record a page re-scan; false when the page was already regenerated
    pub fn mark_regenerated(&mut self, page: &str) -> bool {
        self.regenerated_pages.insert(page.to_string())
    }

    pub fn was_regenerated(&self, page: &str) -> bool {
        self.regenerated_pages.contains(page)
    }
}

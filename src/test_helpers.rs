#![cfg(test)]

use std::sync::Arc;

use crate::platform::{GroupHandle, InMemoryPlatform, TabId};
use crate::reconciler::Reconciler;
use crate::rules::{Rule, RuleSet};
use crate::storage::{InMemoryStore, StateStore};

/// Engine wired to in-memory collaborators, with a few lookup shortcuts.
pub struct EngineHarness {
    pub platform: Arc<InMemoryPlatform>,
    pub store: Arc<InMemoryStore>,
    pub engine: Reconciler,
}

impl EngineHarness {
    /// Build a harness with `rules` already persisted, in order.
    pub async fn with_rules(rules: Vec<Rule>) -> Self {
        let platform = Arc::new(InMemoryPlatform::new());
        let store = Arc::new(InMemoryStore::new());

        let mut rule_set = RuleSet::new();
        for rule in rules {
            rule_set.insert(rule).expect("test rules must have unique names");
        }
        store.save_rules(&rule_set).await.expect("in-memory save");

        let engine = Reconciler::new(platform.clone(), store.clone());
        Self {
            platform,
            store,
            engine,
        }
    }

    /// Current group of a tab, if any.
    pub fn group_of(&self, id: TabId) -> Option<GroupHandle> {
        self.platform.tab(id).and_then(|tab| tab.group)
    }

    /// Live group whose title is `name`. Resolved groups always carry their
    /// rule name as title, so this is the test-side registry view.
    pub fn handle_for(&self, name: &str) -> Option<GroupHandle> {
        self.platform
            .groups()
            .into_iter()
            .find(|group| group.title == name)
            .map(|group| group.handle)
    }
}

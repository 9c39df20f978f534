//! Reconciliation passes: bringing group membership in line with the rules.
//!
//! Every entry point loads the rule list, settings, and group registry at the
//! start of the pass and works off that snapshot; any handle learned mid-pass
//! is persisted immediately. Rule order is significant (first match wins) and
//! tabs are processed in the host's enumeration order. Per-tab and per-group
//! platform failures are logged and skipped; a pass runs to completion no
//! matter what, and anything it leaves behind (a tab ungrouped, a stale
//! title) is repaired by the next pass.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::Result;
use crate::matcher;
use crate::platform::{Tab, TabId, TabPlatform};
use crate::registry::{GroupRegistry, GroupSpec};
use crate::rules::{GroupColor, Rule, RuleSet};
use crate::storage::StateStore;

/// Request sent by the rule-authoring surface, in its wire form:
/// `{"action": "applyRulesToAllTabs"}` and friends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum EngineRequest {
    ApplyRulesToAllTabs,
    #[serde(rename_all = "camelCase")]
    UpdateGroupColor {
        group_name: String,
        new_color: GroupColor,
    },
    #[serde(rename_all = "camelCase")]
    UngroupMismatchedTabs {
        group_name: String,
        new_pattern: String,
    },
}

/// Acknowledgment returned for every [`EngineRequest`]. The boundary does not
/// distinguish partial per-tab failures: once the pass has run to completion
/// it is a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

/// The engine: matcher + registry orchestrated against a platform and store.
pub struct Reconciler {
    platform: Arc<dyn TabPlatform>,
    store: Arc<dyn StateStore>,
}

impl Reconciler {
    pub fn new(platform: Arc<dyn TabPlatform>, store: Arc<dyn StateStore>) -> Self {
        Self { platform, store }
    }

    /// Dispatch one authoring-surface request. Always acks success once the
    /// underlying pass completes; failures have already been logged per tab
    /// or group and will self-heal on a later pass.
    pub async fn handle(&self, request: EngineRequest) -> Ack {
        let outcome = match request {
            EngineRequest::ApplyRulesToAllTabs => self.apply_rules_to_all_tabs().await,
            EngineRequest::UpdateGroupColor {
                group_name,
                new_color,
            } => self.update_group_color(&group_name, new_color).await,
            EngineRequest::UngroupMismatchedTabs {
                group_name,
                new_pattern,
            } => self.ungroup_mismatched_tabs(&group_name, &new_pattern).await,
        };
        if let Err(err) = outcome {
            warn!(%err, "reconciliation request failed; next pass will retry");
        }
        Ack { success: true }
    }

    /// Full reconciliation: evaluate every open tab against the rule list and
    /// realize the result with the minimal set of grouping operations.
    ///
    /// First match wins. Matched tabs are batched per rule; unmatched tabs go
    /// to the shared `"etc"` group when `group_unmatched` is on, otherwise
    /// any of them still sitting in a group is ungrouped.
    pub async fn apply_rules_to_all_tabs(&self) -> Result<()> {
        let rules = self.store.load_rules().await?;
        let settings = self.store.load_settings().await?;
        let mut registry = GroupRegistry::load(self.store.as_ref()).await?;
        let tabs = self.platform.list_tabs().await?;

        let mut matched: Vec<Vec<Tab>> = vec![Vec::new(); rules.len()];
        let mut unmatched: Vec<Tab> = Vec::new();
        for tab in tabs {
            match first_match(&rules, &tab.address) {
                Some(index) => matched[index].push(tab),
                None => unmatched.push(tab),
            }
        }

        for (rule, members) in rules.iter().zip(matched) {
            if members.is_empty() {
                continue;
            }
            debug!(rule = %rule.name, tabs = members.len(), "applying rule");
            if let Err(err) = registry
                .resolve(
                    self.platform.as_ref(),
                    self.store.as_ref(),
                    &GroupSpec::for_rule(rule),
                    &members,
                )
                .await
            {
                warn!(rule = %rule.name, %err, "could not realize group; leaving its tabs for the next pass");
            }
        }

        self.settle_unmatched(&mut registry, &settings, unmatched)
            .await;
        Ok(())
    }

    /// Incremental reconciliation for one tab whose address changed. Same
    /// rule evaluation as the full pass, applied immediately.
    pub async fn on_tab_navigated(&self, tab_id: TabId, address: &str) -> Result<()> {
        let rules = self.store.load_rules().await?;
        let settings = self.store.load_settings().await?;
        let mut registry = GroupRegistry::load(self.store.as_ref()).await?;

        let rule = first_match(&rules, address).and_then(|index| rules.get(index));

        // The tab can be gone by the time the event reaches us.
        let tab = self.platform.get_tab(tab_id).await?;

        match rule {
            Some(rule) => {
                debug!(rule = %rule.name, address, "tab matched rule");
                registry
                    .resolve(
                        self.platform.as_ref(),
                        self.store.as_ref(),
                        &GroupSpec::for_rule(rule),
                        std::slice::from_ref(&tab),
                    )
                    .await?;
            }
            None if settings.group_unmatched => {
                registry
                    .resolve(
                        self.platform.as_ref(),
                        self.store.as_ref(),
                        &GroupSpec::etc(),
                        std::slice::from_ref(&tab),
                    )
                    .await?;
            }
            None => {
                if tab.group.is_some() {
                    debug!(%tab_id, address, "address no longer matches any rule; ungrouping");
                    self.platform.ungroup_tabs(&[tab.id]).await?;
                }
            }
        }
        Ok(())
    }

    /// Recolor the group recorded for `group_name`, if any. No liveness probe:
    /// the recolor call itself failing on a stale handle is tolerated.
    pub async fn update_group_color(&self, group_name: &str, new_color: GroupColor) -> Result<()> {
        let registry = GroupRegistry::load(self.store.as_ref()).await?;
        let Some(handle) = registry.lookup(group_name) else {
            return Ok(());
        };
        match self
            .platform
            .update_group(handle, crate::platform::GroupUpdate::color(new_color))
            .await
        {
            Ok(()) => info!(group = group_name, color = %new_color, "updated group color"),
            Err(err) => warn!(group = group_name, %handle, %err, "could not update group color"),
        }
        Ok(())
    }

    /// Remove members of `group_name` whose address fails `new_pattern`.
    /// Members that still match are untouched, and no tab is added here; the
    /// follow-up full pass claims whatever the new pattern now covers.
    pub async fn ungroup_mismatched_tabs(&self, group_name: &str, new_pattern: &str) -> Result<()> {
        let registry = GroupRegistry::load(self.store.as_ref()).await?;
        let Some(handle) = registry.lookup(group_name) else {
            return Ok(());
        };

        let members = self.platform.tabs_in_group(handle).await?;
        let stray: Vec<TabId> = members
            .iter()
            .filter(|tab| !matcher::matches(&tab.address, new_pattern))
            .map(|tab| tab.id)
            .collect();
        if stray.is_empty() {
            return Ok(());
        }

        info!(group = group_name, tabs = stray.len(), "ungrouping tabs that no longer match");
        self.ungroup_isolated(&stray).await;
        Ok(())
    }

    /// Authoring orchestration for a saved rule, preserving the required
    /// ordering: a pattern change prunes the old group *before* the full pass
    /// reclaims tabs under the new pattern; a color-only change just recolors.
    pub async fn rule_saved(&self, previous: Option<&Rule>, current: &Rule) -> Result<()> {
        match previous {
            Some(old) => {
                if old.color != current.color {
                    self.update_group_color(&current.name, current.color).await?;
                }
                if old.pattern != current.pattern {
                    self.ungroup_mismatched_tabs(&current.name, &current.pattern)
                        .await?;
                    self.apply_rules_to_all_tabs().await?;
                }
            }
            None => self.apply_rules_to_all_tabs().await?,
        }
        Ok(())
    }

    /// Route tabs that matched no rule, per the `group_unmatched` setting.
    async fn settle_unmatched(
        &self,
        registry: &mut GroupRegistry,
        settings: &Settings,
        unmatched: Vec<Tab>,
    ) {
        if settings.group_unmatched {
            if unmatched.is_empty() {
                return;
            }
            debug!(tabs = unmatched.len(), "routing unmatched tabs to the etc group");
            if let Err(err) = registry
                .resolve(
                    self.platform.as_ref(),
                    self.store.as_ref(),
                    &GroupSpec::etc(),
                    &unmatched,
                )
                .await
            {
                warn!(%err, "could not realize the etc group");
            }
        } else {
            let grouped: Vec<TabId> = unmatched
                .iter()
                .filter(|tab| tab.group.is_some())
                .map(|tab| tab.id)
                .collect();
            if grouped.is_empty() {
                return;
            }
            debug!(tabs = grouped.len(), "ungrouping tabs that match no rule");
            self.ungroup_isolated(&grouped).await;
        }
    }

    /// Batched ungroup with a per-tab fallback, so one tab closed mid-pass
    /// cannot keep its batch siblings grouped.
    async fn ungroup_isolated(&self, ids: &[TabId]) {
        if let Err(err) = self.platform.ungroup_tabs(ids).await {
            warn!(%err, "batch ungroup failed; retrying tab by tab");
            for &id in ids {
                if let Err(err) = self.platform.ungroup_tabs(&[id]).await {
                    warn!(%id, %err, "could not ungroup tab; skipping");
                }
            }
        }
    }
}

/// Convenience view of the full rule evaluation for one address: the first
/// matching rule's index, if any.
pub fn first_match(rules: &RuleSet, address: &str) -> Option<usize> {
    rules
        .iter()
        .position(|rule| matcher::matches(address, &rule.pattern))
}

//! Name-to-handle registry for engine-managed tab groups.
//!
//! The registry is the sole owner of handle lifecycle decisions. A recorded
//! handle proves nothing: the user may have closed every member tab since it
//! was written, destroying the group. [`GroupRegistry::resolve`] therefore
//! probes the handle first and branches on an explicit
//! [`HandleState`]: reuse the live group, or create a fresh one and persist
//! the replacement handle immediately. Stale entries are never deleted, only
//! overwritten on next use; replacement is idempotent so the map never leaks
//! meaningfully.

use tracing::{debug, info, warn};

use crate::error::{CorralError, Result};
use crate::platform::{GroupHandle, GroupUpdate, Tab, TabId, TabPlatform};
use crate::rules::{GroupColor, Rule};
use crate::storage::{GroupMap, StateStore};

/// Reserved group name that collects tabs matching no rule.
pub const ETC_GROUP: &str = "etc";

/// Outcome of probing a recorded handle against the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// The handle still resolves to a live group.
    Live(GroupHandle),
    /// No handle recorded, or the recorded one no longer resolves.
    StaleOrMissing,
}

/// What a resolved group should look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub name: String,
    pub title: String,
    pub color: GroupColor,
}

impl GroupSpec {
    pub fn for_rule(rule: &Rule) -> Self {
        Self {
            name: rule.name.clone(),
            title: rule.name.clone(),
            color: rule.color,
        }
    }

    /// The shared group for unmatched tabs.
    pub fn etc() -> Self {
        Self {
            name: ETC_GROUP.to_string(),
            title: ETC_GROUP.to_string(),
            color: GroupColor::Grey,
        }
    }
}

/// The persistent group map, loaded for one pass.
#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    map: GroupMap,
}

impl GroupRegistry {
    /// Read the persisted map at pass start.
    pub async fn load(store: &dyn StateStore) -> Result<Self> {
        Ok(Self {
            map: store.load_group_map().await?,
        })
    }

    /// Last-known handle for `name`, without a liveness probe. Used where a
    /// failed follow-up call is cheap and tolerated (recoloring).
    pub fn lookup(&self, name: &str) -> Option<GroupHandle> {
        self.map.get(name).copied()
    }

    /// Probe the recorded handle for `name` against the platform. A failed
    /// lookup is expected control flow, not an error.
    pub async fn probe(&self, platform: &dyn TabPlatform, name: &str) -> HandleState {
        match self.map.get(name) {
            Some(&handle) => match platform.get_group(handle).await {
                Ok(_) => HandleState::Live(handle),
                Err(_) => {
                    debug!(group = name, %handle, "recorded handle is stale");
                    HandleState::StaleOrMissing
                }
            },
            None => HandleState::StaleOrMissing,
        }
    }

    /// Route `candidates` into the group named by `spec`, creating or
    /// repairing the group as needed, and return its handle.
    ///
    /// Live groups only receive candidates not already inside them, so an
    /// unchanged pass issues no membership operations. A replacement handle
    /// is persisted before this returns. Title and color are reapplied
    /// unconditionally afterwards; a failure there is logged and tolerated,
    /// the next pass repairs the drift.
    pub async fn resolve(
        &mut self,
        platform: &dyn TabPlatform,
        store: &dyn StateStore,
        spec: &GroupSpec,
        candidates: &[Tab],
    ) -> Result<GroupHandle> {
        let handle = match self.probe(platform, &spec.name).await {
            HandleState::Live(handle) => {
                let stray: Vec<TabId> = candidates
                    .iter()
                    .filter(|tab| tab.group != Some(handle))
                    .map(|tab| tab.id)
                    .collect();
                if !stray.is_empty() {
                    debug!(group = %spec.name, %handle, tabs = stray.len(), "adding tabs to existing group");
                    if let Err(err) = platform.group_tabs(&stray, Some(handle)).await {
                        warn!(group = %spec.name, %handle, %err, "batch add failed; retrying tab by tab");
                        add_tabs_individually(platform, handle, &stray).await;
                    }
                }
                handle
            }
            HandleState::StaleOrMissing => {
                if candidates.is_empty() {
                    return Err(CorralError::EmptyGroupSeed {
                        name: spec.name.clone(),
                    });
                }
                info!(group = %spec.name, tabs = candidates.len(), "creating new group");
                let ids: Vec<TabId> = candidates.iter().map(|tab| tab.id).collect();
                let handle = match platform.group_tabs(&ids, None).await {
                    Ok(handle) => handle,
                    Err(err) => {
                        warn!(group = %spec.name, %err, "batch create failed; grouping tab by tab");
                        seed_group_individually(platform, spec, &ids).await?
                    }
                };
                self.map.insert(spec.name.clone(), handle);
                store.save_group_map(&self.map).await?;
                handle
            }
        };

        if let Err(err) = platform
            .update_group(handle, GroupUpdate::appearance(&spec.title, spec.color))
            .await
        {
            warn!(group = %spec.name, %handle, %err, "could not update group title/color");
        }
        Ok(handle)
    }
}

/// Add `ids` to `handle` one call per tab. A tab closed since it was listed
/// fails its own call only; siblings still land in the group.
async fn add_tabs_individually(platform: &dyn TabPlatform, handle: GroupHandle, ids: &[TabId]) {
    for &id in ids {
        if let Err(err) = platform.group_tabs(&[id], Some(handle)).await {
            warn!(%id, %handle, %err, "could not add tab to group; skipping");
        }
    }
}

/// Create the group tab by tab: the first tab that can still be grouped seeds
/// it, the rest are added to the seeded handle. Errors only when every
/// candidate has gone away.
async fn seed_group_individually(
    platform: &dyn TabPlatform,
    spec: &GroupSpec,
    ids: &[TabId],
) -> Result<GroupHandle> {
    let mut seeded: Option<GroupHandle> = None;
    for &id in ids {
        let attempt = match seeded {
            None => platform.group_tabs(&[id], None).await,
            Some(handle) => platform.group_tabs(&[id], Some(handle)).await,
        };
        match attempt {
            Ok(handle) => seeded = Some(handle),
            Err(err) => warn!(%id, group = %spec.name, %err, "could not group tab; skipping"),
        }
    }
    seeded.ok_or_else(|| CorralError::PlatformOp {
        op: "group_tabs",
        detail: format!("no live tab left to seed group \"{}\"", spec.name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{InMemoryPlatform, PlatformOp};
    use crate::storage::{InMemoryStore, StateStore};
    use pretty_assertions::assert_eq;

    fn spec(name: &str, color: GroupColor) -> GroupSpec {
        GroupSpec {
            name: name.to_string(),
            title: name.to_string(),
            color,
        }
    }

    fn candidate(platform: &InMemoryPlatform, address: &str) -> Tab {
        let id = platform.open_tab(address);
        platform.tab(id).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_creates_and_persists_on_first_use() {
        let platform = InMemoryPlatform::new();
        let store = InMemoryStore::new();
        let tab = candidate(&platform, "https://work.example/");

        let mut registry = GroupRegistry::load(&store).await.unwrap();
        let handle = registry
            .resolve(&platform, &store, &spec("work", GroupColor::Cyan), &[tab.clone()])
            .await
            .unwrap();

        assert_eq!(platform.members(handle), vec![tab.id]);
        let info = platform.group(handle).unwrap();
        assert_eq!(info.title, "work");
        assert_eq!(info.color, GroupColor::Cyan);
        assert_eq!(
            store.load_group_map().await.unwrap().get("work"),
            Some(&handle)
        );
    }

    #[tokio::test]
    async fn test_resolve_reuses_live_group_and_skips_settled_members() {
        let platform = InMemoryPlatform::new();
        let store = InMemoryStore::new();
        let tab = candidate(&platform, "https://work.example/");

        let mut registry = GroupRegistry::load(&store).await.unwrap();
        let the_spec = spec("work", GroupColor::Cyan);
        let handle = registry
            .resolve(&platform, &store, &the_spec, &[tab.clone()])
            .await
            .unwrap();

        platform.take_ops();
        let settled = platform.tab(tab.id).unwrap();
        let again = registry
            .resolve(&platform, &store, &the_spec, &[settled])
            .await
            .unwrap();

        assert_eq!(again, handle);
        // Appearance reapplication only; membership untouched.
        assert!(platform.ops().iter().all(|op| !op.changes_membership()));
    }

    #[tokio::test]
    async fn test_resolve_replaces_stale_handle_transparently() {
        let platform = InMemoryPlatform::new();
        let store = InMemoryStore::new();
        let tab = candidate(&platform, "https://work.example/");

        let mut registry = GroupRegistry::load(&store).await.unwrap();
        let the_spec = spec("work", GroupColor::Cyan);
        let old = registry
            .resolve(&platform, &store, &the_spec, &[tab.clone()])
            .await
            .unwrap();

        // User closes the group behind the engine's back.
        platform.destroy_group(old);

        let orphan = platform.tab(tab.id).unwrap();
        let mut registry = GroupRegistry::load(&store).await.unwrap();
        let fresh = registry
            .resolve(&platform, &store, &the_spec, &[orphan])
            .await
            .unwrap();

        assert_ne!(fresh, old);
        assert_eq!(platform.members(fresh), vec![tab.id]);
        assert_eq!(
            store.load_group_map().await.unwrap().get("work"),
            Some(&fresh)
        );
    }

    #[tokio::test]
    async fn test_resolve_refuses_to_create_empty_group() {
        let platform = InMemoryPlatform::new();
        let store = InMemoryStore::new();
        let mut registry = GroupRegistry::load(&store).await.unwrap();

        let err = registry
            .resolve(&platform, &store, &spec("work", GroupColor::Cyan), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CorralError::EmptyGroupSeed { .. }));
        assert!(platform.ops().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_creates_group_despite_closed_candidate() {
        let platform = InMemoryPlatform::new();
        let store = InMemoryStore::new();
        let gone = candidate(&platform, "https://work.example/a");
        let kept = candidate(&platform, "https://work.example/b");
        platform.close_tab(gone.id);

        let mut registry = GroupRegistry::load(&store).await.unwrap();
        let handle = registry
            .resolve(
                &platform,
                &store,
                &spec("work", GroupColor::Cyan),
                &[gone, kept.clone()],
            )
            .await
            .unwrap();

        // The surviving sibling still gets grouped and the handle persisted.
        assert_eq!(platform.members(handle), vec![kept.id]);
        assert_eq!(
            store.load_group_map().await.unwrap().get("work"),
            Some(&handle)
        );
    }

    #[tokio::test]
    async fn test_resolve_adds_surviving_siblings_to_live_group() {
        let platform = InMemoryPlatform::new();
        let store = InMemoryStore::new();
        let anchor = candidate(&platform, "https://work.example/");

        let mut registry = GroupRegistry::load(&store).await.unwrap();
        let the_spec = spec("work", GroupColor::Cyan);
        let handle = registry
            .resolve(&platform, &store, &the_spec, &[anchor.clone()])
            .await
            .unwrap();

        let gone = candidate(&platform, "https://work.example/a");
        let kept = candidate(&platform, "https://work.example/b");
        platform.close_tab(gone.id);

        let settled = platform.tab(anchor.id).unwrap();
        registry
            .resolve(&platform, &store, &the_spec, &[settled, gone, kept.clone()])
            .await
            .unwrap();

        let mut members = platform.members(handle);
        members.sort_by_key(|id| id.0);
        let mut expected = vec![anchor.id, kept.id];
        expected.sort_by_key(|id| id.0);
        assert_eq!(members, expected);
    }

    #[tokio::test]
    async fn test_resolve_errors_when_every_candidate_is_gone() {
        let platform = InMemoryPlatform::new();
        let store = InMemoryStore::new();
        let tab = candidate(&platform, "https://work.example/");
        platform.close_tab(tab.id);

        let mut registry = GroupRegistry::load(&store).await.unwrap();
        let err = registry
            .resolve(&platform, &store, &spec("work", GroupColor::Cyan), &[tab])
            .await
            .unwrap_err();

        assert!(matches!(err, CorralError::PlatformOp { .. }));
        assert!(store.load_group_map().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_probe_distinguishes_live_from_stale() {
        let platform = InMemoryPlatform::new();
        let store = InMemoryStore::new();
        let tab = candidate(&platform, "https://work.example/");

        let mut registry = GroupRegistry::load(&store).await.unwrap();
        let handle = registry
            .resolve(&platform, &store, &spec("work", GroupColor::Cyan), &[tab])
            .await
            .unwrap();

        assert_eq!(
            registry.probe(&platform, "work").await,
            HandleState::Live(handle)
        );
        assert_eq!(
            registry.probe(&platform, "unknown").await,
            HandleState::StaleOrMissing
        );

        platform.destroy_group(handle);
        assert_eq!(
            registry.probe(&platform, "work").await,
            HandleState::StaleOrMissing
        );
    }

    #[tokio::test]
    async fn test_moves_candidate_out_of_wrong_group() {
        let platform = InMemoryPlatform::new();
        let store = InMemoryStore::new();
        let tab = candidate(&platform, "https://work.example/");
        let wrong = platform.group_tabs(&[tab.id], None).await.unwrap();

        let mut registry = GroupRegistry::load(&store).await.unwrap();
        let mislaid = platform.tab(tab.id).unwrap();
        let right = registry
            .resolve(&platform, &store, &spec("work", GroupColor::Cyan), &[mislaid])
            .await
            .unwrap();

        assert_ne!(right, wrong);
        assert_eq!(platform.members(right), vec![tab.id]);
        assert!(platform.members(wrong).is_empty());
        assert!(platform
            .ops()
            .iter()
            .any(|op| matches!(op, PlatformOp::CreateGroup { .. })));
    }
}

//! In-memory [`TabPlatform`] adapter.
//!
//! Backs the engine with plain maps instead of a browser. Used by the test
//! suite and by embedders that want to dry-run a rule set; the mutation log
//! lets callers assert exactly which grouping operations a pass issued, which
//! is how the idempotency and minimal-operation properties are checked.
//!
//! The inherent methods (`open_tab`, `navigate`, `close_tab`,
//! `destroy_group`) simulate the user acting outside the engine: navigating,
//! closing tabs, or dissolving a group behind a recorded handle.

use parking_lot::RwLock;

use async_trait::async_trait;

use crate::error::{CorralError, Result};
use crate::platform::{GroupHandle, GroupInfo, GroupUpdate, Tab, TabId, TabPlatform};
use crate::rules::GroupColor;

/// One mutating platform call, as recorded by the log. Probes and
/// enumerations are not recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformOp {
    CreateGroup {
        group: GroupHandle,
        tabs: Vec<TabId>,
    },
    AddToGroup {
        group: GroupHandle,
        tabs: Vec<TabId>,
    },
    Ungroup {
        tabs: Vec<TabId>,
    },
    UpdateGroup {
        group: GroupHandle,
        update: GroupUpdate,
    },
}

impl PlatformOp {
    /// True for operations that change membership or create groups, as
    /// opposed to appearance touch-ups.
    pub fn changes_membership(&self) -> bool {
        matches!(
            self,
            PlatformOp::CreateGroup { .. } | PlatformOp::AddToGroup { .. } | PlatformOp::Ungroup { .. }
        )
    }
}

#[derive(Debug, Default)]
struct PlatformState {
    tabs: Vec<Tab>,
    groups: Vec<GroupInfo>,
    next_tab: u64,
    next_group: u64,
    ops: Vec<PlatformOp>,
}

impl PlatformState {
    fn tab_mut(&mut self, id: TabId) -> Result<&mut Tab> {
        self.tabs
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(CorralError::TabNotFound { id })
    }

    fn group_mut(&mut self, handle: GroupHandle) -> Result<&mut GroupInfo> {
        self.groups
            .iter_mut()
            .find(|g| g.handle == handle)
            .ok_or(CorralError::GroupNotFound { handle })
    }
}

/// Map-backed tab platform with a mutation log.
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    state: RwLock<PlatformState>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new ungrouped tab at `address`.
    pub fn open_tab(&self, address: impl Into<String>) -> TabId {
        let mut state = self.state.write();
        state.next_tab += 1;
        let id = TabId(state.next_tab);
        state.tabs.push(Tab {
            id,
            address: address.into(),
            group: None,
        });
        id
    }

    /// Point an existing tab at a new address. Group membership is untouched;
    /// reacting to the change is the engine's job.
    pub fn navigate(&self, id: TabId, address: impl Into<String>) {
        if let Ok(tab) = self.state.write().tab_mut(id) {
            tab.address = address.into();
        }
    }

    /// Close a tab. Does not dissolve its group even if it was the last
    /// member; use [`destroy_group`](Self::destroy_group) for that.
    pub fn close_tab(&self, id: TabId) {
        self.state.write().tabs.retain(|t| t.id != id);
    }

    /// Dissolve a group as the host would when the user closes it: the
    /// handle dies and surviving members are left ungrouped.
    pub fn destroy_group(&self, handle: GroupHandle) {
        let mut state = self.state.write();
        state.groups.retain(|g| g.handle != handle);
        for tab in state.tabs.iter_mut().filter(|t| t.group == Some(handle)) {
            tab.group = None;
        }
    }

    /// Snapshot of one tab, if still open.
    pub fn tab(&self, id: TabId) -> Option<Tab> {
        self.state.read().tabs.iter().find(|t| t.id == id).cloned()
    }

    /// Snapshot of one group, if live.
    pub fn group(&self, handle: GroupHandle) -> Option<GroupInfo> {
        self.state
            .read()
            .groups
            .iter()
            .find(|g| g.handle == handle)
            .cloned()
    }

    /// Snapshot of all live groups.
    pub fn groups(&self) -> Vec<GroupInfo> {
        self.state.read().groups.clone()
    }

    /// Member ids of a group, in tab order.
    pub fn members(&self, handle: GroupHandle) -> Vec<TabId> {
        self.state
            .read()
            .tabs
            .iter()
            .filter(|t| t.group == Some(handle))
            .map(|t| t.id)
            .collect()
    }

    /// All mutating operations issued so far, oldest first.
    pub fn ops(&self) -> Vec<PlatformOp> {
        self.state.read().ops.clone()
    }

    /// Drain the mutation log, returning what was in it.
    pub fn take_ops(&self) -> Vec<PlatformOp> {
        std::mem::take(&mut self.state.write().ops)
    }
}

#[async_trait]
impl TabPlatform for InMemoryPlatform {
    async fn list_tabs(&self) -> Result<Vec<Tab>> {
        Ok(self.state.read().tabs.clone())
    }

    async fn tabs_in_group(&self, group: GroupHandle) -> Result<Vec<Tab>> {
        Ok(self
            .state
            .read()
            .tabs
            .iter()
            .filter(|t| t.group == Some(group))
            .cloned()
            .collect())
    }

    async fn get_tab(&self, id: TabId) -> Result<Tab> {
        self.state
            .read()
            .tabs
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(CorralError::TabNotFound { id })
    }

    async fn group_tabs(&self, tabs: &[TabId], group: Option<GroupHandle>) -> Result<GroupHandle> {
        let mut state = self.state.write();

        // Validate up front so a bad id doesn't leave a half-applied move.
        for &id in tabs {
            if !state.tabs.iter().any(|t| t.id == id) {
                return Err(CorralError::TabNotFound { id });
            }
        }

        let handle = match group {
            Some(handle) => {
                state.group_mut(handle)?;
                state.ops.push(PlatformOp::AddToGroup {
                    group: handle,
                    tabs: tabs.to_vec(),
                });
                handle
            }
            None => {
                state.next_group += 1;
                let handle = GroupHandle(state.next_group);
                state.groups.push(GroupInfo {
                    handle,
                    title: String::new(),
                    color: GroupColor::default(),
                });
                state.ops.push(PlatformOp::CreateGroup {
                    group: handle,
                    tabs: tabs.to_vec(),
                });
                handle
            }
        };

        for &id in tabs {
            state.tab_mut(id)?.group = Some(handle);
        }
        Ok(handle)
    }

    async fn ungroup_tabs(&self, tabs: &[TabId]) -> Result<()> {
        let mut state = self.state.write();
        for &id in tabs {
            if !state.tabs.iter().any(|t| t.id == id) {
                return Err(CorralError::TabNotFound { id });
            }
        }
        for &id in tabs {
            state.tab_mut(id)?.group = None;
        }
        state.ops.push(PlatformOp::Ungroup {
            tabs: tabs.to_vec(),
        });
        Ok(())
    }

    async fn get_group(&self, group: GroupHandle) -> Result<GroupInfo> {
        self.state
            .read()
            .groups
            .iter()
            .find(|g| g.handle == group)
            .cloned()
            .ok_or(CorralError::GroupNotFound { handle: group })
    }

    async fn update_group(&self, group: GroupHandle, update: GroupUpdate) -> Result<()> {
        let mut state = self.state.write();
        let info = state.group_mut(group)?;
        if let Some(title) = &update.title {
            info.title = title.clone();
        }
        if let Some(color) = update.color {
            info.color = color;
        }
        state.ops.push(PlatformOp::UpdateGroup { group, update });
        Ok(())
    }
}

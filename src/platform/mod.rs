//! Abstraction over the host platform's tab inventory and grouping API.
//!
//! The engine never talks to a browser directly; it drives a [`TabPlatform`]
//! implementation. Per-host adapters (and the in-memory one in
//! [`memory`]) implement the handful of operations the reconciler needs:
//! enumerate tabs, move tabs in and out of groups, and look up or restyle a
//! group. Group handles are opaque and may go stale at any time behind the
//! engine's back; `get_group` failing on a recorded handle is expected
//! control flow, not an error condition worth reporting.

pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::rules::GroupColor;

pub use memory::{InMemoryPlatform, PlatformOp};

/// Host-assigned tab identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab:{}", self.0)
    }
}

/// Opaque handle to a host-managed tab group.
///
/// A recorded handle carries no liveness guarantee: the user can close every
/// member tab and the host will destroy the group without telling us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupHandle(pub u64);

impl fmt::Display for GroupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group:{}", self.0)
    }
}

/// Read-only view of one tab as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: TabId,
    pub address: String,
    /// Current group membership; `None` when ungrouped.
    pub group: Option<GroupHandle>,
}

/// Read-only view of one live group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub handle: GroupHandle,
    pub title: String,
    pub color: GroupColor,
}

/// Partial update to a group's appearance. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupUpdate {
    pub title: Option<String>,
    pub color: Option<GroupColor>,
}

impl GroupUpdate {
    /// Retitle and recolor in one call.
    pub fn appearance(title: impl Into<String>, color: GroupColor) -> Self {
        Self {
            title: Some(title.into()),
            color: Some(color),
        }
    }

    /// Recolor only; membership and title are unaffected.
    pub fn color(color: GroupColor) -> Self {
        Self {
            title: None,
            color: Some(color),
        }
    }
}

/// The grouping operations the reconciler consumes.
///
/// Every method is a potential suspension point; implementations must
/// tolerate tabs closing and groups vanishing between calls. Individual
/// failures are surfaced per call and the reconciler decides whether to skip
/// or propagate.
#[async_trait]
pub trait TabPlatform: Send + Sync {
    /// Enumerate all open tabs, in the host's order.
    async fn list_tabs(&self) -> Result<Vec<Tab>>;

    /// Enumerate the current members of a group. Unknown or dead handles
    /// yield an empty list, mirroring a filtered query rather than a lookup.
    async fn tabs_in_group(&self, group: GroupHandle) -> Result<Vec<Tab>>;

    /// Fetch one tab by id. Fails if the tab has been closed.
    async fn get_tab(&self, id: TabId) -> Result<Tab>;

    /// Add tabs to `group`, or create a fresh group seeded with them when
    /// `group` is `None`. Returns the (possibly new) handle. A tab already in
    /// another group is moved.
    async fn group_tabs(&self, tabs: &[TabId], group: Option<GroupHandle>) -> Result<GroupHandle>;

    /// Remove tabs from whatever group they are in.
    async fn ungroup_tabs(&self, tabs: &[TabId]) -> Result<()>;

    /// Look up a group by handle. Failing here is how staleness is detected.
    async fn get_group(&self, group: GroupHandle) -> Result<GroupInfo>;

    /// Apply a title/color update to a live group.
    async fn update_group(&self, group: GroupHandle, update: GroupUpdate) -> Result<()>;
}

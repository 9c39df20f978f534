//! Corral - rule-based tab grouping engine
//!
//! This crate implements the matching-and-reconciliation core of a tab
//! grouper: wildcard rules are compiled into matchers, every open tab is
//! assigned to the group of the first rule its address matches, and group
//! membership is reconciled whenever tabs navigate or rules change. The host
//! browser sits behind the [`platform::TabPlatform`] trait, persisted state
//! behind [`storage::StateStore`], so one engine serves any host family with
//! a thin adapter.
//!
//! The engine is deliberately forgiving: group handles can die behind its
//! back, tabs can close mid-pass, and individual platform calls can fail.
//! None of that aborts a pass; every pass reapplies titles and colors and
//! recreates missing groups, so state converges instead of erroring out.

pub mod config;
pub mod error;
pub mod matcher;
pub mod platform;
pub mod reconciler;
pub mod registry;
pub mod rules;
pub mod storage;

#[cfg(test)]
pub mod test_helpers;

pub use config::Settings;
pub use error::{CorralError, Result};
pub use platform::{
    GroupHandle, GroupInfo, GroupUpdate, InMemoryPlatform, Tab, TabId, TabPlatform,
};
pub use reconciler::{Ack, EngineRequest, Reconciler};
pub use registry::{GroupRegistry, GroupSpec, HandleState, ETC_GROUP};
pub use rules::{GroupColor, Rule, RuleSet};
pub use storage::{GroupMap, InMemoryStore, JsonFileStore, StateStore};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        Ack, CorralError, EngineRequest, GroupColor, GroupHandle, Reconciler, Result, Rule,
        RuleSet, Settings, StateStore, Tab, TabId, TabPlatform, ETC_GROUP,
    };
}

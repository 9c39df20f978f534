//! Persistent engine state.
//!
//! The engine keeps three things across sessions: the rule list, the
//! name-to-handle group map, and the settings. [`StateStore`] abstracts over
//! where they live; each pass reads what it needs at the start and persists
//! mutations immediately, so a concurrently triggered pass sees the freshest
//! value on its next read (last write wins, no transactional isolation).
//!
//! The group map deliberately never shrinks: a stale entry is harmless and
//! gets revalidated or overwritten the next time its name is resolved.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Settings;
use crate::error::{CorralError, Result};
use crate::platform::GroupHandle;
use crate::rules::RuleSet;

/// Name-to-handle map for groups the engine has created.
pub type GroupMap = HashMap<String, GroupHandle>;

/// Typed access to the persisted keys (`groups`, `groupMap`,
/// `groupUnmatched`).
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_rules(&self) -> Result<RuleSet>;
    async fn save_rules(&self, rules: &RuleSet) -> Result<()>;

    async fn load_group_map(&self) -> Result<GroupMap>;
    async fn save_group_map(&self, map: &GroupMap) -> Result<()>;

    async fn load_settings(&self) -> Result<Settings>;
    async fn save_settings(&self, settings: &Settings) -> Result<()>;
}

fn default_group_unmatched() -> bool {
    true
}

/// On-disk / in-memory document shape, matching the original storage keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredState {
    groups: RuleSet,
    group_map: GroupMap,
    #[serde(default = "default_group_unmatched")]
    group_unmatched: bool,
}

impl Default for StoredState {
    fn default() -> Self {
        Self {
            groups: RuleSet::default(),
            group_map: GroupMap::default(),
            group_unmatched: true,
        }
    }
}

/// Volatile store for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoredState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn load_rules(&self) -> Result<RuleSet> {
        Ok(self.state.read().groups.clone())
    }

    async fn save_rules(&self, rules: &RuleSet) -> Result<()> {
        self.state.write().groups = rules.clone();
        Ok(())
    }

    async fn load_group_map(&self) -> Result<GroupMap> {
        Ok(self.state.read().group_map.clone())
    }

    async fn save_group_map(&self, map: &GroupMap) -> Result<()> {
        self.state.write().group_map = map.clone();
        Ok(())
    }

    async fn load_settings(&self) -> Result<Settings> {
        Ok(Settings {
            group_unmatched: self.state.read().group_unmatched,
        })
    }

    async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.state.write().group_unmatched = settings.group_unmatched;
        Ok(())
    }
}

/// Single-file JSON store.
///
/// The whole document is read on every load and rewritten on every save;
/// the state is small and this keeps the last-write-wins semantics obvious.
/// A missing file yields defaults. Writes go through a sibling temp file and
/// a rename so a crash mid-write can't leave a torn document.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StoredState> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file yet; starting from defaults");
                return Ok(StoredState::default());
            }
            Err(err) => {
                return Err(CorralError::StorageRead {
                    path: self.path.clone(),
                    cause: err,
                });
            }
        };
        serde_json::from_str(&raw).map_err(|err| CorralError::StorageFormat {
            path: self.path.clone(),
            cause: err,
        })
    }

    async fn save(&self, state: &StoredState) -> Result<()> {
        let raw = serde_json::to_string_pretty(state).map_err(|err| CorralError::StorageFormat {
            path: self.path.clone(),
            cause: err,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw)
            .await
            .map_err(|cause| CorralError::StorageWrite {
                path: self.path.clone(),
                cause,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|cause| CorralError::StorageWrite {
                path: self.path.clone(),
                cause,
            })
    }

    async fn update<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut StoredState),
    {
        let mut state = self.load().await?;
        apply(&mut state);
        self.save(&state).await
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load_rules(&self) -> Result<RuleSet> {
        Ok(self.load().await?.groups)
    }

    async fn save_rules(&self, rules: &RuleSet) -> Result<()> {
        self.update(|state| state.groups = rules.clone()).await
    }

    async fn load_group_map(&self) -> Result<GroupMap> {
        Ok(self.load().await?.group_map)
    }

    async fn save_group_map(&self, map: &GroupMap) -> Result<()> {
        self.update(|state| state.group_map = map.clone()).await
    }

    async fn load_settings(&self) -> Result<Settings> {
        Ok(Settings {
            group_unmatched: self.load().await?.group_unmatched,
        })
    }

    async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.update(|state| state.group_unmatched = settings.group_unmatched)
            .await
    }
}

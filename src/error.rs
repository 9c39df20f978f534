//! Error types for the grouping engine.
//!
//! Nothing in this crate is fatal: stale group handles and per-tab platform
//! failures are expected control flow, logged and skipped so a pass never
//! aborts. The variants here cover the cases that *do* surface to a caller.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::platform::{GroupHandle, TabId};

#[derive(Error, Diagnostic, Debug)]
pub enum CorralError {
    #[error("Failed to read state from {}", path.display())]
    #[diagnostic(
        code(corral::storage_read),
        help("Check that the state file exists and is readable")
    )]
    StorageRead {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    #[error("Failed to write state to {}", path.display())]
    #[diagnostic(
        code(corral::storage_write),
        help("Check permissions and free space for the state directory")
    )]
    StorageWrite {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    #[error("State file {} is not valid JSON", path.display())]
    #[diagnostic(
        code(corral::storage_format),
        help("Repair or delete the file; a missing file starts from defaults")
    )]
    StorageFormat {
        path: PathBuf,
        #[source]
        cause: serde_json::Error,
    },

    #[error("No tab with id {id}")]
    #[diagnostic(
        code(corral::tab_not_found),
        help("The tab may have been closed while a pass was running")
    )]
    TabNotFound { id: TabId },

    #[error("No live tab group for handle {handle}")]
    #[diagnostic(
        code(corral::group_not_found),
        help("Stale handles are expected; the registry recreates the group on next use")
    )]
    GroupNotFound { handle: GroupHandle },

    #[error("Tab group operation '{op}' failed: {detail}")]
    #[diagnostic(code(corral::platform_op))]
    PlatformOp { op: &'static str, detail: String },

    #[error("A rule named \"{name}\" already exists")]
    #[diagnostic(
        code(corral::duplicate_rule),
        help("Rule names are compared case-insensitively; pick a different name")
    )]
    DuplicateRuleName { name: String },

    #[error("No rule at index {index}")]
    #[diagnostic(code(corral::rule_index))]
    RuleIndexOutOfRange { index: usize },

    #[error("Refusing to create empty group \"{name}\"")]
    #[diagnostic(
        code(corral::empty_group),
        help("Groups are only created when at least one tab needs them")
    )]
    EmptyGroupSeed { name: String },
}

pub type Result<T> = std::result::Result<T, CorralError>;

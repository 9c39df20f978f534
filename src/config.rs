//! Engine settings persisted alongside the rule list.

use serde::{Deserialize, Serialize};

/// User-toggled behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Collect tabs that match no rule into the shared `"etc"` group. When
    /// false, unmatched tabs are instead removed from whatever group they
    /// currently sit in.
    pub group_unmatched: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            group_unmatched: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_unmatched_defaults_to_true() {
        assert!(Settings::default().group_unmatched);

        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert!(settings.group_unmatched);

        let settings: Settings = serde_json::from_str(r#"{"groupUnmatched":false}"#).unwrap();
        assert!(!settings.group_unmatched);
    }
}

//! User-authored grouping rules.
//!
//! A [`Rule`] maps a wildcard pattern to a named, colored tab group. Rules are
//! authored through [`RuleSet`], which enforces case-insensitive name
//! uniqueness at write time; the reconciler itself assumes names are already
//! unique and only ever reads a rule list for the duration of one pass.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CorralError, Result};

/// Colors supported by the host platform's tab group API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupColor {
    #[default]
    Blue,
    Yellow,
    Red,
    Green,
    Purple,
    Orange,
    Pink,
    Cyan,
    #[serde(alias = "gray")]
    Grey,
}

impl GroupColor {
    /// Palette in the order it is offered to the user.
    pub const ALL: [GroupColor; 9] = [
        GroupColor::Blue,
        GroupColor::Yellow,
        GroupColor::Red,
        GroupColor::Green,
        GroupColor::Purple,
        GroupColor::Orange,
        GroupColor::Pink,
        GroupColor::Cyan,
        GroupColor::Grey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupColor::Blue => "blue",
            GroupColor::Yellow => "yellow",
            GroupColor::Red => "red",
            GroupColor::Green => "green",
            GroupColor::Purple => "purple",
            GroupColor::Orange => "orange",
            GroupColor::Pink => "pink",
            GroupColor::Cyan => "cyan",
            GroupColor::Grey => "grey",
        }
    }
}

impl fmt::Display for GroupColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pattern-to-group mapping.
///
/// Immutable once handed to the reconciler for a pass; edits go through
/// [`RuleSet`] and trigger targeted reconciliation via
/// [`Reconciler::rule_saved`](crate::reconciler::Reconciler::rule_saved).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub color: GroupColor,
}

impl Rule {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>, color: GroupColor) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            color,
        }
    }
}

/// Ordered rule list. Order is significant: the reconciler evaluates rules
/// first to last and the first match wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    /// Append a rule, rejecting duplicate names (case-insensitive).
    pub fn insert(&mut self, rule: Rule) -> Result<()> {
        if self.name_taken(&rule.name, None) {
            return Err(CorralError::DuplicateRuleName { name: rule.name });
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Replace the rule at `index`, returning the previous value.
    ///
    /// The new rule may keep the old name; any *other* rule holding the name
    /// is a duplicate.
    pub fn update(&mut self, index: usize, rule: Rule) -> Result<Rule> {
        if index >= self.rules.len() {
            return Err(CorralError::RuleIndexOutOfRange { index });
        }
        if self.name_taken(&rule.name, Some(index)) {
            return Err(CorralError::DuplicateRuleName { name: rule.name });
        }
        Ok(std::mem::replace(&mut self.rules[index], rule))
    }

    pub fn remove(&mut self, index: usize) -> Result<Rule> {
        if index >= self.rules.len() {
            return Err(CorralError::RuleIndexOutOfRange { index });
        }
        Ok(self.rules.remove(index))
    }

    /// First palette color not used by any rule, if one remains. The authoring
    /// form preselects this when adding a rule.
    pub fn first_unused_color(&self) -> Option<GroupColor> {
        GroupColor::ALL
            .into_iter()
            .find(|color| !self.rules.iter().any(|r| r.color == *color))
    }

    fn name_taken(&self, name: &str, skip: Option<usize>) -> bool {
        self.rules
            .iter()
            .enumerate()
            .any(|(i, r)| Some(i) != skip && r.name.eq_ignore_ascii_case(name))
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<T: IntoIterator<Item = Rule>>(iter: T) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

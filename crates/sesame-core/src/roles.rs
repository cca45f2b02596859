//! Normalized role name sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A set of lowercase, trimmed role names. Ordering is alphabetical and duplicates collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Normalize a role name. Blank names normalize to `None`.
    pub fn normalize(name: &str) -> Option<String> {
        let name = name.trim().to_lowercase();
        (!name.is_empty()).then_some(name)
    }

    /// Insert a role name, returning `true` if it was not present.
    pub fn insert(&mut self, name: &str) -> bool {
        match Self::normalize(name) {
            Some(name) => self.0.insert(name),
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        Self::normalize(name).is_some_and(|name| self.0.contains(&name))
    }

    /// Roles in `self` that `held` lacks, in alphabetical order.
    pub fn missing_from(&self, held: &RoleSet) -> Vec<String> {
        self.0.difference(&held.0).cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = RoleSet::new();
        for name in iter {
            set.insert(name.as_ref());
        }
        set
    }
}

impl<'a> IntoIterator for &'a RoleSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

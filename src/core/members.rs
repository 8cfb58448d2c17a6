//! Ordered member-name collection

use crate::error::{ArchiveError, Result};
use ahash::AHashSet;
use serde::Serialize;
use std::path::{Component, Path};

/// Check that `name` stays inside the directory it is resolved against
///
/// Absolute names and names with a `..` component fail with `UnsafePath`.
/// Create, append and update apply the same rule as extract, so every
/// archive this crate writes can be unpacked again.
pub fn relative_member_path(name: &str) -> Result<&Path> {
    let path = Path::new(name);
    let safe = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe {
        return Err(ArchiveError::UnsafePath(name.to_string()));
    }
    Ok(path)
}

/// Member names in insertion order, with constant-time membership
///
/// Duplicates are kept: an archive that was updated lists a name once per
/// occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MemberNameSet {
    names: Vec<String>,
    #[serde(skip)]
    index: AHashSet<String>,
}

impl MemberNameSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<S: Into<String>>(&mut self, name: S) {
        let name = name.into();
        self.index.insert(name.clone());
        self.names.push(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains(name)
    }

    /// True if every name here also appears in `other`
    pub fn is_subset_of(&self, other: &MemberNameSet) -> bool {
        self.first_missing_from(other).is_none()
    }

    /// First name (in order) absent from `other`
    pub fn first_missing_from(&self, other: &MemberNameSet) -> Option<&str> {
        self.names
            .iter()
            .find(|name| !other.contains(name))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.names.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.names
    }
}

impl<S: Into<String>> FromIterator<S> for MemberNameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = MemberNameSet::new();
        for name in iter {
            set.push(name);
        }
        set
    }
}

impl<S: Into<String>> Extend<S> for MemberNameSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for name in iter {
            self.push(name);
        }
    }
}

impl<'a> IntoIterator for &'a MemberNameSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.iter()
    }
}

impl IntoIterator for MemberNameSet {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.into_iter()
    }
}

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::catalog::PermissionMap;
use crate::error::{DescriptorError, Result};

/// One trustee and the rights granted to it on a single object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControlEntry<R> {
    pub trustee: String,
    pub rights: R,
}

/// Trustee to granted rights, in the order trustees first appeared.
///
/// A trustee missing from the table has no permissions; lookups never fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControlTable<R> {
    entries: Vec<AccessControlEntry<R>>,
}

impl<R> Default for AccessControlTable<R> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<R> AccessControlTable<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `rights` for `trustee`, folding them into an existing entry with `merge`.
    pub fn merge_with<F>(&mut self, trustee: &str, rights: R, merge: F) -> Result<()>
    where
        F: FnOnce(&mut R, R) -> Result<()>,
    {
        if trustee.is_empty() {
            return Err(DescriptorError::MalformedEntry(
                "entry has an empty trustee".to_string(),
            ));
        }

        match self.entries.iter_mut().find(|e| e.trustee == trustee) {
            Some(entry) => merge(&mut entry.rights, rights),
            None => {
                self.entries.push(AccessControlEntry {
                    trustee: trustee.to_string(),
                    rights,
                });
                Ok(())
            }
        }
    }

    pub fn get(&self, trustee: &str) -> Option<&R> {
        self.entries
            .iter()
            .find(|e| e.trustee == trustee)
            .map(|e| &e.rights)
    }

    pub fn trustees(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.trustee.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccessControlEntry<R>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Permission maps for every trustee of an object, in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionReport {
    entries: Vec<(String, PermissionMap)>,
}

impl PermissionReport {
    pub fn push(&mut self, trustee: String, permissions: PermissionMap) {
        self.entries.push((trustee, permissions));
    }

    pub fn get(&self, trustee: &str) -> Option<&PermissionMap> {
        self.entries
            .iter()
            .find(|(t, _)| t == trustee)
            .map(|(_, permissions)| permissions)
    }

    pub fn contains(&self, trustee: &str) -> bool {
        self.get(trustee).is_some()
    }

    pub fn trustees(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PermissionMap)> {
        self.entries.iter().map(|(t, p)| (t.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for PermissionReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (trustee, permissions) in &self.entries {
            map.serialize_entry(trustee, permissions)?;
        }
        map.end()
    }
}

/// Trailing component of a `DOMAIN\name` identity.
pub fn short_name(identity: &str) -> &str {
    identity.rsplit('\\').next().unwrap_or(identity)
}

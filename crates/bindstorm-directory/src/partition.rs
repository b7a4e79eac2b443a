//! In-memory partition
//!
//! A single storage subtree rooted at a suffix DN. Entries are keyed by
//! normalised DN in an ordered map; writers go through the admin session,
//! readers are the per-connection sessions.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::dn::Dn;
use crate::entry::Entry;
use crate::error::PartitionError;

/// Search scope relative to a base entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Base,
    OneLevel,
    Subtree,
}

/// In-memory partition.
#[derive(Debug)]
pub struct Partition {
    id: String,
    suffix: Dn,
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl Partition {
    pub fn new(id: impl Into<String>, suffix: Dn) -> Self {
        Self {
            id: id.into(),
            suffix,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn suffix(&self) -> &Dn {
        &self.suffix
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Add an entry.
    ///
    /// The entry must sit at or below the suffix, must carry `objectClass`,
    /// and (unless it is the suffix entry) its parent must already exist.
    /// Missing RDN values are added to the stored entry.
    pub fn add(&self, mut entry: Entry) -> Result<(), PartitionError> {
        let dn = entry.dn().clone();

        if !dn.is_descendant_of(&self.suffix) {
            return Err(PartitionError::OutsideSuffix {
                dn: dn.to_string(),
                suffix: self.suffix.to_string(),
            });
        }

        if !entry.has_attribute("objectClass") {
            return Err(PartitionError::MissingObjectClass { dn: dn.to_string() });
        }

        entry.add_rdn_values();

        let mut entries = self.entries.write();
        if entries.contains_key(dn.normalized()) {
            return Err(PartitionError::AlreadyExists { dn: dn.to_string() });
        }

        if dn != self.suffix {
            let has_parent = dn
                .parent()
                .is_some_and(|parent| entries.contains_key(parent.normalized()));
            if !has_parent {
                return Err(PartitionError::NoSuchParent { dn: dn.to_string() });
            }
        }

        debug!(partition = %self.id, dn = %dn, "Entry added");
        entries.insert(dn.normalized().to_string(), entry);
        Ok(())
    }

    /// Fetch a copy of an entry.
    pub fn lookup(&self, dn: &Dn) -> Option<Entry> {
        self.entries.read().get(dn.normalized()).cloned()
    }

    /// Entries within `scope` of `base` accepted by `filter`.
    ///
    /// Returns `None` when the base entry does not exist.
    pub fn search<F>(&self, base: &Dn, scope: SearchScope, filter: F) -> Option<Vec<Entry>>
    where
        F: Fn(&Entry) -> bool,
    {
        let entries = self.entries.read();
        let base_entry = entries.get(base.normalized())?;

        let found = match scope {
            SearchScope::Base => {
                if filter(base_entry) {
                    vec![base_entry.clone()]
                } else {
                    Vec::new()
                }
            }
            SearchScope::OneLevel => entries
                .values()
                .filter(|e| e.dn().is_child_of(base) && filter(e))
                .cloned()
                .collect(),
            SearchScope::Subtree => entries
                .values()
                .filter(|e| e.dn().is_descendant_of(base) && filter(e))
                .cloned()
                .collect(),
        };

        Some(found)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

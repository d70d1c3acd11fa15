//! Per-zone record container with a suffix-searchable name index.
//!
//! Names are kept relative to the store's base domain (static zone entries
//! may also be fully qualified). Alongside the name → records map, every name
//! ever assigned is registered once in a trie keyed by its labels in reverse
//! order, so a lookup only visits names that share the query's suffix.

use std::collections::BTreeMap;

use crate::matching::matches;
use crate::record::ResourceRecord;

/// Records for one base domain.
#[derive(Debug, Clone)]
pub struct RecordStore {
    base: String,
    records: BTreeMap<String, Vec<ResourceRecord>>,
    index: SuffixNode,
}

impl PartialEq for RecordStore {
    fn eq(&self, other: &Self) -> bool {
        // The index is derived from the key set.
        self.base == other.base && self.records == other.records
    }
}

impl Eq for RecordStore {}

impl RecordStore {
    /// Create an empty store for `base`.
    pub fn new(base: &str) -> Self {
        Self {
            base: normalize(base),
            records: BTreeMap::new(),
            index: SuffixNode::default(),
        }
    }

    /// Base domain of this store.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Append `record` to the list at `name`.
    pub fn add(&mut self, name: &str, record: ResourceRecord) {
        self.entry(name).push(record);
    }

    /// Replace the list at `name` wholesale.
    pub fn set(&mut self, name: &str, records: Vec<ResourceRecord>) {
        *self.entry(name) = records;
    }

    /// Append `record` only when `name` already holds at least one record.
    pub fn add_if(&mut self, name: &str, record: ResourceRecord) -> bool {
        match self.records.get_mut(&normalize(name)) {
            Some(existing) if !existing.is_empty() => {
                existing.push(record);
                true
            }
            _ => false,
        }
    }

    /// Drop `name` from both the map and the index.
    pub fn remove(&mut self, name: &str) -> Option<Vec<ResourceRecord>> {
        let name = normalize(name);
        let removed = self.records.remove(&name)?;
        self.index.unregister(&name);
        Some(removed)
    }

    /// Records stored under exactly `name`, without pattern matching.
    pub fn get(&self, name: &str) -> Option<&[ResourceRecord]> {
        self.records.get(&normalize(name)).map(Vec::as_slice)
    }

    /// Resolve a zone-relative query name.
    ///
    /// Candidates come from the suffix index for both the relative and the
    /// fully qualified form; the first one accepted by [`matches`] wins. At
    /// each label exact children are tried before wildcards, so specific
    /// names shadow wildcard patterns.
    pub fn lookup(&self, name: &str) -> Option<&[ResourceRecord]> {
        let host = normalize(name);
        let domain = if host.is_empty() {
            self.base.clone()
        } else {
            format!("{}.{}", host, self.base)
        };

        let mut candidates = Vec::new();
        self.index.candidates(&reversed_labels(&host), &mut candidates);
        self.index
            .candidates(&reversed_labels(&domain), &mut candidates);

        candidates
            .into_iter()
            .find(|pattern| matches(pattern, &domain, &host))
            .and_then(|pattern| self.records.get(pattern))
            .map(Vec::as_slice)
    }

    /// Number of distinct names, including names set to an empty list.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no names are stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total number of records across all names.
    pub fn record_count(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    /// Iterate names and their records in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ResourceRecord])> {
        self.records
            .iter()
            .map(|(name, records)| (name.as_str(), records.as_slice()))
    }

    fn entry(&mut self, name: &str) -> &mut Vec<ResourceRecord> {
        let name = normalize(name);
        if !self.records.contains_key(&name) {
            self.index.register(&name);
        }
        self.records.entry(name).or_default()
    }
}

fn normalize(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Labels of `name` from the root down, ignoring one trailing dot.
fn reversed_labels(name: &str) -> Vec<&str> {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() {
        return Vec::new();
    }
    name.rsplit('.').collect()
}

/// Trie node keyed by reversed labels.
#[derive(Debug, Clone, Default)]
struct SuffixNode {
    children: BTreeMap<String, SuffixNode>,
    names: Vec<String>,
}

impl SuffixNode {
    fn register(&mut self, name: &str) {
        let mut node = self;
        for label in reversed_labels(name) {
            node = node.children.entry(label.to_string()).or_default();
        }
        debug_assert!(!node.names.iter().any(|n| n == name));
        node.names.push(name.to_string());
    }

    fn unregister(&mut self, name: &str) {
        let mut node = self;
        for label in reversed_labels(name) {
            match node.children.get_mut(label) {
                Some(child) => node = child,
                None => return,
            }
        }
        node.names.retain(|n| n != name);
    }

    /// Collect names whose labels line up with `labels`, letting a stored
    /// `*` stand in for any one label.
    fn candidates<'a>(&'a self, labels: &[&str], out: &mut Vec<&'a str>) {
        match labels.split_first() {
            None => {
                for name in &self.names {
                    if !out.contains(&name.as_str()) {
                        out.push(name);
                    }
                }
            }
            Some((label, rest)) => {
                if let Some(child) = self.children.get(*label) {
                    child.candidates(rest, out);
                }
                if *label != "*" {
                    if let Some(child) = self.children.get("*") {
                        child.candidates(rest, out);
                    }
                }
            }
        }
    }
}

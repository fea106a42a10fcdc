//! Attribute usage and document count bookkeeping kept inside collection
//! metadata.
//!
//! Snapshots are computed purely and persisted with a compare-and-swap on
//! [`Collection::version`]. A stale snapshot is rejected with
//! [`Error::StorageConflict`]; nothing in here retries on its own.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::store::{Store, WriteBatch};
use crate::types::{Attribute, Collection, DataRecord};

/// Ids of attributes holding a non-null value.
#[must_use]
pub fn used_attribute_ids(data: &DataRecord) -> BTreeSet<String> {
    data.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, _)| k.clone())
        .collect()
}

/// Changes a single document mutation makes to its collection's ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageDelta {
    pub increment: BTreeSet<String>,
    pub decrement: BTreeSet<String>,
    /// Keys present without a value; registered with zero usage if unknown.
    pub register: BTreeSet<String>,
    pub documents: i64,
}

impl UsageDelta {
    #[must_use]
    pub fn created(data: &DataRecord) -> Self {
        Self {
            increment: used_attribute_ids(data),
            decrement: BTreeSet::new(),
            register: data.keys().cloned().collect(),
            documents: 1,
        }
    }

    #[must_use]
    pub fn deleted(data: &DataRecord) -> Self {
        Self {
            increment: BTreeSet::new(),
            decrement: used_attribute_ids(data),
            register: BTreeSet::new(),
            documents: -1,
        }
    }

    /// Delta between the data a document held and the data it holds now.
    #[must_use]
    pub fn changed(before: &DataRecord, after: &DataRecord) -> Self {
        let old = used_attribute_ids(before);
        let new = used_attribute_ids(after);
        Self {
            increment: new.difference(&old).cloned().collect(),
            decrement: old.difference(&new).cloned().collect(),
            register: after.keys().cloned().collect(),
            documents: 0,
        }
    }
}

/// Per-attribute tallies accumulated across a batch of documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageCounts {
    pub counts: BTreeMap<String, u64>,
    pub register: BTreeSet<String>,
    pub documents: i64,
}

impl UsageCounts {
    pub fn add_document(&mut self, data: &DataRecord) {
        for id in used_attribute_ids(data) {
            *self.counts.entry(id).or_insert(0) += 1;
        }
        self.register.extend(data.keys().cloned());
        self.documents += 1;
    }
}

/// Next collection snapshot: incremented ids gain one use (registered if
/// unknown), decremented ids lose one floored at zero.
#[must_use]
pub fn apply_delta(
    collection: &Collection,
    increment: &BTreeSet<String>,
    decrement: &BTreeSet<String>,
    document_count_delta: i64,
    now: DateTime<Utc>,
) -> Collection {
    let counts: BTreeMap<String, u64> = increment.iter().map(|id| (id.clone(), 1)).collect();
    let mut next = apply_counts(collection, &counts, document_count_delta, now);

    for attribute in next.attributes.iter_mut() {
        if decrement.contains(&attribute.id) {
            attribute.usage_count = attribute.usage_count.saturating_sub(1);
        }
    }
    next
}

/// Bulk variant of [`apply_delta`]: each attribute gains its supplied count
/// in one pass.
#[must_use]
pub fn apply_counts(
    collection: &Collection,
    counts: &BTreeMap<String, u64>,
    document_count_delta: i64,
    now: DateTime<Utc>,
) -> Collection {
    let mut next = collection.clone();

    for (id, count) in counts {
        match next.attributes.iter_mut().find(|a| &a.id == id) {
            Some(attribute) => attribute.usage_count = attribute.usage_count.saturating_add(*count),
            None => next.attributes.push(Attribute::discovered(id, *count)),
        }
    }

    next.documents_count = shift_count(collection.documents_count, document_count_delta);
    next.last_time_used = now;
    next.version = collection.version + 1;
    next
}

/// Registers ids not yet known to the collection with zero usage.
pub fn register_attributes(collection: &mut Collection, ids: &BTreeSet<String>) {
    for id in ids {
        if collection.attribute(id).is_none() {
            collection.attributes.push(Attribute::discovered(id, 0));
        }
    }
}

#[must_use]
pub fn apply_usage(collection: &Collection, delta: &UsageDelta, now: DateTime<Utc>) -> Collection {
    let mut next = apply_delta(
        collection,
        &delta.increment,
        &delta.decrement,
        delta.documents,
        now,
    );
    register_attributes(&mut next, &delta.register);
    next
}

#[must_use]
pub fn apply_usage_counts(
    collection: &Collection,
    counts: &UsageCounts,
    now: DateTime<Utc>,
) -> Collection {
    let mut next = apply_counts(collection, &counts.counts, counts.documents, now);
    register_attributes(&mut next, &counts.register);
    next
}

fn shift_count(count: u64, delta: i64) -> u64 {
    if delta.is_negative() {
        count.saturating_sub(delta.unsigned_abs())
    } else {
        count.saturating_add(delta as u64)
    }
}

/// Persists ledger snapshots through the store.
pub struct AttributeUsageLedger<'a> {
    store: &'a dyn Store,
}

impl<'a> AttributeUsageLedger<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Adds the CAS-guarded collection write for `next` to `batch`.
    pub fn stage(batch: &mut WriteBatch, current: &Collection, next: Collection) {
        batch.update_collection(next, current.version);
    }

    /// Applies `delta` on its own, without an accompanying document write.
    pub fn apply(&self, current: &Collection, delta: &UsageDelta) -> Result<Collection> {
        let next = apply_usage(current, delta, Utc::now());
        let mut batch = WriteBatch::new();
        Self::stage(&mut batch, current, next.clone());
        self.store.commit(&batch)?;
        Ok(next)
    }

    /// Bulk counterpart of [`apply`](Self::apply).
    pub fn apply_counts(&self, current: &Collection, counts: &UsageCounts) -> Result<Collection> {
        let next = apply_usage_counts(current, counts, Utc::now());
        let mut batch = WriteBatch::new();
        Self::stage(&mut batch, current, next.clone());
        self.store.commit(&batch)?;
        Ok(next)
    }
}

/// Re-runs `op` while it fails with [`Error::StorageConflict`], at most
/// `attempts` times in total. Each attempt must read fresh state itself.
pub fn retry_on_conflict<T, F>(attempts: usize, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 1;
    loop {
        match op() {
            Err(Error::StorageConflict(reason)) if attempt < attempts => {
                tracing::debug!(attempt, %reason, "retrying after storage conflict");
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Permissions, Value};

    fn collection(attributes: Vec<Attribute>, documents_count: u64) -> Collection {
        Collection {
            id: "c1".into(),
            project_id: "p1".into(),
            code: "c".into(),
            name: "C".into(),
            permissions: Permissions::default(),
            attributes,
            documents_count,
            last_time_used: Utc::now(),
            version: 3,
            created_at: Utc::now(),
        }
    }

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn record(pairs: &[(&str, Value)]) -> DataRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_increment_registers_unknown() {
        let c = collection(vec![Attribute::discovered("name", 2)], 2);
        let next = apply_delta(&c, &ids(&["name", "age"]), &BTreeSet::new(), 1, Utc::now());

        assert_eq!(next.attribute("name").unwrap().usage_count, 3);
        assert_eq!(next.attribute("age").unwrap().usage_count, 1);
        assert_eq!(next.documents_count, 3);
        assert_eq!(next.version, 4);
    }

    #[test]
    fn test_decrement_floors_at_zero() {
        let c = collection(vec![Attribute::discovered("name", 0)], 0);
        let next = apply_delta(&c, &BTreeSet::new(), &ids(&["name", "ghost"]), -1, Utc::now());

        assert_eq!(next.attribute("name").unwrap().usage_count, 0);
        assert!(next.attribute("ghost").is_none());
        assert_eq!(next.documents_count, 0);
    }

    #[test]
    fn test_zero_usage_attribute_is_kept() {
        let c = collection(vec![Attribute::discovered("name", 1)], 1);
        let next = apply_delta(&c, &BTreeSet::new(), &ids(&["name"]), -1, Utc::now());
        assert_eq!(next.attributes.len(), 1);
        assert_eq!(next.attributes[0].usage_count, 0);
    }

    #[test]
    fn test_apply_counts_bulk() {
        let c = collection(vec![Attribute::discovered("a", 1)], 1);
        let counts = BTreeMap::from([("a".to_string(), 4), ("b".to_string(), 2)]);
        let next = apply_counts(&c, &counts, 4, Utc::now());

        assert_eq!(next.attribute("a").unwrap().usage_count, 5);
        assert_eq!(next.attribute("b").unwrap().usage_count, 2);
        assert_eq!(next.documents_count, 5);
    }

    #[test]
    fn test_changed_delta() {
        let before = record(&[("a", Value::Int(1)), ("b", Value::Int(2))]);
        let after = record(&[("b", Value::Int(3)), ("c", Value::Int(4))]);
        let delta = UsageDelta::changed(&before, &after);

        assert_eq!(delta.increment, ids(&["c"]));
        assert_eq!(delta.decrement, ids(&["a"]));
        assert_eq!(delta.documents, 0);
    }

    #[test]
    fn test_null_values_register_without_usage() {
        let c = collection(Vec::new(), 0);
        let data = record(&[("a", Value::Int(1)), ("empty", Value::Null)]);
        let next = apply_usage(&c, &UsageDelta::created(&data), Utc::now());

        assert_eq!(next.attribute("a").unwrap().usage_count, 1);
        assert_eq!(next.attribute("empty").unwrap().usage_count, 0);
    }

    #[test]
    fn test_usage_counts_tally() {
        let mut counts = UsageCounts::default();
        counts.add_document(&record(&[("a", Value::Int(1))]));
        counts.add_document(&record(&[("a", Value::Int(2)), ("b", Value::Null)]));

        assert_eq!(counts.counts["a"], 2);
        assert!(!counts.counts.contains_key("b"));
        assert!(counts.register.contains("b"));
        assert_eq!(counts.documents, 2);
    }

    #[test]
    fn test_retry_on_conflict_stops_on_success() {
        let mut calls = 0;
        let result = retry_on_conflict(5, || {
            calls += 1;
            if calls < 3 {
                Err(Error::StorageConflict("stale".into()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_retry_on_conflict_surfaces_after_attempts() {
        let mut calls = 0;
        let result: Result<()> = retry_on_conflict(2, || {
            calls += 1;
            Err(Error::StorageConflict("stale".into()))
        });
        assert!(matches!(result, Err(Error::StorageConflict(_))));
        assert_eq!(calls, 2);
    }
}

//! Inverted indexes of records.
//!
//! An inverted index lists the records sharing a blocking key. Comparing
//! only pairs that share at least one key cuts the candidate set far below
//! the all-pairs quadratic, and [`Index::count_comparisons`] estimates the
//! cost of a blocking strategy before any comparison runs.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use ordered_float::NotNan;
use serde::Serialize;
use tracing::{info, warn};

use crate::compare::{Comparisons, RecordComparator, RecordPair};
use crate::record::Record;
use crate::{Error, Result};

/// A blocking key. Keys are hashable, ordered and non-empty; an empty text
/// or empty composite key signals a broken key function and fails the
/// insert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Text(String),
    Number(NotNan<f64>),
    Composite(Vec<Key>),
}

impl Key {
    /// Numeric key, or `None` for NaN input.
    #[must_use]
    pub fn number(value: f64) -> Option<Self> {
        NotNan::new(value).ok().map(Key::Number)
    }

    fn is_empty(&self) -> bool {
        match self {
            Key::Text(s) => s.is_empty(),
            Key::Number(_) => false,
            Key::Composite(keys) => keys.is_empty() || keys.iter().any(Key::is_empty),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Text(s) => write!(f, "{s}"),
            Key::Number(n) => write!(f, "{n}"),
            Key::Composite(keys) => {
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{key}")?;
                }
                Ok(())
            }
        }
    }
}

/// Computes the blocking keys for a record. A record may be emitted under
/// several keys, or none at all (in which case it lands in no bucket).
pub type KeyFn = Arc<dyn Fn(&Record) -> Vec<Key> + Send + Sync>;

/// Mapping from blocking key to the records that share it.
#[derive(Clone)]
pub struct Index {
    make_key: KeyFn,
    buckets: AHashMap<Key, Vec<Record>>,
}

impl Index {
    #[must_use]
    pub fn new(make_key: KeyFn) -> Self {
        Self {
            make_key,
            buckets: AHashMap::new(),
        }
    }

    /// Build an index over an initial record set.
    pub fn with_records(make_key: KeyFn, records: &[Record]) -> Result<Self> {
        let mut index = Self::new(make_key);
        for record in records {
            index.insert(record)?;
        }
        Ok(index)
    }

    /// Insert a record into the bucket of every key the key function
    /// yields. Returns the keys used. A record reached twice under the same
    /// key is stored once.
    pub fn insert(&mut self, record: &Record) -> Result<Vec<Key>> {
        let keys = (self.make_key)(record);
        for key in &keys {
            if key.is_empty() {
                return Err(Error::EmptyIndexKey(record.id().to_string()));
            }
            let bucket = self.buckets.entry(key.clone()).or_default();
            if !bucket.contains(record) {
                bucket.push(record.clone());
            }
        }
        Ok(keys)
    }

    /// Re-run the key function for diagnostics, without inserting.
    #[must_use]
    pub fn keys_for(&self, record: &Record) -> Vec<Key> {
        (self.make_key)(record)
    }

    /// Upper bound on the pairwise comparisons implied by this blocking:
    /// within one index, the sum of n*(n-1)/2 over buckets; against another
    /// index, the sum of bucket-size products over shared keys.
    ///
    /// Comparisons are cached across indexes, so the number of comparator
    /// invocations actually performed is generally lower. This is a sizing
    /// heuristic, not an exact promise.
    #[must_use]
    pub fn count_comparisons(&self, other: Option<&Index>) -> u64 {
        match other {
            None => self.count_within(),
            Some(other) if std::ptr::eq(self, other) => self.count_within(),
            Some(other) => self
                .buckets
                .iter()
                .filter_map(|(key, bucket)| {
                    other
                        .buckets
                        .get(key)
                        .map(|theirs| bucket.len() as u64 * theirs.len() as u64)
                })
                .sum(),
        }
    }

    fn count_within(&self) -> u64 {
        self.buckets
            .values()
            .map(|bucket| {
                let n = bucket.len() as u64;
                n * n.saturating_sub(1) / 2
            })
            .sum()
    }

    /// Compare every unordered pair of distinct records within each bucket,
    /// in canonical order, skipping pairs already in `cache`.
    pub fn compare_within(
        &self,
        comparator: &RecordComparator,
        cache: &mut Comparisons,
    ) -> Result<()> {
        for bucket in self.buckets.values() {
            if bucket.len() < 2 {
                continue;
            }
            let mut records: Vec<&Record> = bucket.iter().collect();
            records.sort();
            for j in 1..records.len() {
                for i in 0..j {
                    let (a, b) = (records[i], records[j]);
                    if a == b {
                        continue;
                    }
                    let pair = RecordPair::canonical(a, b);
                    if !cache.contains(&pair) {
                        let vector = comparator.compare(pair.left(), pair.right())?;
                        cache.insert(pair, vector);
                    }
                }
            }
        }
        Ok(())
    }

    /// Compare the cross product of bucket contents for every key present
    /// in both indexes, skipping pairs already in `cache`. Inserted pairs
    /// keep the (self, other) orientation.
    pub fn compare_against(
        &self,
        other: &Index,
        comparator: &RecordComparator,
        cache: &mut Comparisons,
    ) -> Result<()> {
        for (key, bucket) in &self.buckets {
            let Some(theirs) = other.buckets.get(key) else {
                continue;
            };
            for a in bucket {
                for b in theirs {
                    let pair = RecordPair::cross(a, b);
                    if !cache.contains(&pair) {
                        let vector = comparator.compare(a, b)?;
                        cache.insert(pair, vector);
                    }
                }
            }
        }
        Ok(())
    }

    /// Iterate over (key, bucket) entries.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &[Record])> {
        self.buckets.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Records sharing `key`, if any.
    #[must_use]
    pub fn bucket(&self, key: &Key) -> Option<&[Record]> {
        self.buckets.get(key).map(Vec::as_slice)
    }

    /// Number of buckets.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Bucket statistics, derived purely from bucket sizes.
    #[must_use]
    pub fn stats(&self) -> IndexStats {
        let blocks = self.buckets.len();
        let records: usize = self.buckets.values().map(Vec::len).sum();
        let largest = self.buckets.values().map(Vec::len).max().unwrap_or(0);
        let mean = if blocks == 0 {
            0.0
        } else {
            records as f64 / blocks as f64
        };
        IndexStats {
            records,
            blocks,
            largest,
            mean,
        }
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("blocks", &self.buckets.len())
            .finish_non_exhaustive()
    }
}

/// Bucket-size statistics for one index, used for blocking-strategy tuning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    /// Record slots across all buckets (a record in two buckets counts twice).
    pub records: usize,
    /// Number of buckets.
    pub blocks: usize,
    /// Size of the largest bucket.
    pub largest: usize,
    /// Mean bucket size.
    pub mean: f64,
}

/// An ordered collection of named indexes, all populated from the same
/// record stream in a single pass. Order drives deterministic reporting and
/// the positional pairing of [`RecordComparator::link`].
///
/// [`RecordComparator::link`]: crate::compare::RecordComparator::link
#[derive(Clone)]
pub struct Indices {
    entries: Vec<(String, Index)>,
}

impl Indices {
    #[must_use]
    pub fn new(entries: Vec<(String, Index)>) -> Self {
        Self { entries }
    }

    /// Build named indexes straight from key functions.
    #[must_use]
    pub fn from_strategy(strategy: Vec<(String, KeyFn)>) -> Self {
        Self {
            entries: strategy
                .into_iter()
                .map(|(name, make_key)| (name, Index::new(make_key)))
                .collect(),
        }
    }

    /// An empty copy sharing the same key functions, for indexing a second
    /// dataset with the same strategy.
    #[must_use]
    pub fn clone_strategy(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(name, index)| (name.clone(), Index::new(index.make_key.clone())))
                .collect(),
        }
    }

    /// Insert a record into every member index.
    pub fn insert(&mut self, record: &Record) -> Result<()> {
        for (_, index) in &mut self.entries {
            index.insert(record)?;
        }
        Ok(())
    }

    /// Insert a batch of records, each into every member index.
    pub fn insert_all(&mut self, records: &[Record]) -> Result<()> {
        for record in records {
            self.insert(record)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Index> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, index)| index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Index)> {
        self.entries.iter().map(|(n, i)| (n.as_str(), i))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Summed comparison estimate over member indexes (paired positionally
    /// when `other` is given). Pairs indexed by several members are counted
    /// once per member, so this overcounts versus the cached comparison set.
    #[must_use]
    pub fn count_comparisons(&self, other: Option<&Indices>) -> u64 {
        match other {
            None => self
                .entries
                .iter()
                .map(|(_, index)| index.count_comparisons(None))
                .sum(),
            Some(other) => self
                .entries
                .iter()
                .zip(&other.entries)
                .map(|((_, left), (_, right))| left.count_comparisons(Some(right)))
                .sum(),
        }
    }

    /// Per-index bucket statistics in declaration order.
    #[must_use]
    pub fn stats(&self) -> Vec<(String, IndexStats)> {
        self.entries
            .iter()
            .map(|(name, index)| (name.clone(), index.stats()))
            .collect()
    }

    /// Log bucket statistics and the comparison estimate for every index.
    pub fn log_stats(&self) {
        for (name, index) in &self.entries {
            if index.is_empty() {
                warn!("index {name}: empty");
                continue;
            }
            let stats = index.stats();
            info!(
                "index {name}: records={} blocks={} largest={} mean={:.2} comparisons<={}",
                stats.records,
                stats.blocks,
                stats.largest,
                stats.mean,
                index.count_comparisons(None)
            );
        }
    }
}

impl fmt::Debug for Indices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordSchema;

    fn records(rows: &[&[&str]]) -> Vec<Record> {
        let schema = Arc::new(RecordSchema::new(["id", "name", "age"]).unwrap());
        rows.iter()
            .map(|row| Record::new(schema.clone(), row.iter().copied()).unwrap())
            .collect()
    }

    fn first_letter() -> KeyFn {
        Arc::new(|record: &Record| {
            record
                .get(1)
                .and_then(|name| name.chars().next())
                .map(|c| vec![Key::Text(c.to_string())])
                .unwrap_or_default()
        })
    }

    #[test]
    fn test_insert_groups_by_key() {
        let recs = records(&[
            &["1", "Jon", "30"],
            &["2", "John", "30"],
            &["3", "Amy", "25"],
        ]);
        let index = Index::with_records(first_letter(), &recs).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.count_comparisons(None), 1);
    }

    #[test]
    fn test_empty_key_fails_insert() {
        let recs = records(&[&["1", "Jon", "30"]]);
        let make_key: KeyFn = Arc::new(|_| vec![Key::Text(String::new())]);
        let mut index = Index::new(make_key);
        let err = index.insert(&recs[0]).unwrap_err();
        assert!(matches!(err, Error::EmptyIndexKey(id) if id == "1"));
    }

    #[test]
    fn test_multi_key_record_stored_once_per_bucket() {
        let recs = records(&[&["1", "Jon", "30"]]);
        // Same key twice; the bucket must hold the record once.
        let make_key: KeyFn =
            Arc::new(|_| vec![Key::Text("J".to_string()), Key::Text("J".to_string())]);
        let mut index = Index::new(make_key);
        index.insert(&recs[0]).unwrap();
        assert_eq!(index.count_comparisons(None), 0);
    }

    #[test]
    fn test_count_comparisons_cross() {
        let left_recs = records(&[&["1", "Jon", "30"], &["2", "Jim", "31"]]);
        let right_recs = records(&[&["3", "Jan", "32"], &["4", "Amy", "25"]]);
        let left = Index::with_records(first_letter(), &left_recs).unwrap();
        let right = Index::with_records(first_letter(), &right_recs).unwrap();
        // "J" bucket: 2 x 1; "A" only on the right.
        assert_eq!(left.count_comparisons(Some(&right)), 2);
        // Self comparison falls back to the within count.
        assert_eq!(left.count_comparisons(Some(&left)), 1);
    }

    #[test]
    fn test_numeric_and_composite_keys() {
        assert_eq!(Key::number(4.5).unwrap().to_string(), "4.5");
        assert!(Key::number(f64::NAN).is_none());
        let composite = Key::Composite(vec![Key::from("a"), Key::from("b")]);
        assert_eq!(composite.to_string(), "a|b");
        assert!(Key::Composite(vec![]).is_empty());
        assert!(Key::Composite(vec![Key::from("")]).is_empty());
    }

    #[test]
    fn test_stats() {
        let recs = records(&[
            &["1", "Jon", "30"],
            &["2", "John", "30"],
            &["3", "Amy", "25"],
        ]);
        let index = Index::with_records(first_letter(), &recs).unwrap();
        let stats = index.stats();
        assert_eq!(stats.records, 3);
        assert_eq!(stats.blocks, 2);
        assert_eq!(stats.largest, 2);
        assert!((stats.mean - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_indices_single_pass_insert() {
        let recs = records(&[&["1", "Jon", "30"], &["2", "Jim", "30"]]);
        let age_key: KeyFn = Arc::new(|record: &Record| {
            record.get(2).map(|age| vec![Key::from(age)]).unwrap_or_default()
        });
        let mut indices = Indices::from_strategy(vec![
            ("name".to_string(), first_letter()),
            ("age".to_string(), age_key),
        ]);
        indices.insert_all(&recs).unwrap();
        assert_eq!(indices.len(), 2);
        assert_eq!(indices.get("name").unwrap().len(), 1);
        assert_eq!(indices.get("age").unwrap().len(), 1);
        // Both indexes block the same pair; the estimate counts it twice.
        assert_eq!(indices.count_comparisons(None), 2);
    }

    #[test]
    fn test_clone_strategy_is_empty() {
        let recs = records(&[&["1", "Jon", "30"]]);
        let mut indices = Indices::from_strategy(vec![("name".to_string(), first_letter())]);
        indices.insert_all(&recs).unwrap();
        let copy = indices.clone_strategy();
        assert!(copy.get("name").unwrap().is_empty());
    }
}

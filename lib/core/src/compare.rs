//! Record-pair comparison: vector assembly, pair ordering and the
//! comparison cache.
//!
//! A [`RecordComparator`] is an ordered set of named field comparators. It
//! turns a record pair into a fixed-shape [`SimilarityVector`] and drives
//! the pairing strategies: exhaustive all-pairs and inverted-index blocking,
//! for one dataset (dedupe) or two (link). Every strategy checks the
//! [`Comparisons`] cache before invoking the comparator, so a pair reached
//! through several blocking keys is evaluated at most once.

use std::fmt;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::field::FieldCompare;
use crate::index::Indices;
use crate::record::Record;
use crate::{Error, Result};

/// Immutable shape of the similarity vectors one comparator produces:
/// ordered component names with a name-to-position table built once.
#[derive(Debug, Clone)]
pub struct VectorSchema {
    names: Vec<String>,
    positions: AHashMap<String, usize>,
}

impl VectorSchema {
    fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::InvalidConfig(
                "record comparator has no field comparators".to_string(),
            ));
        }
        let mut positions = AHashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "empty comparator name at position {i}"
                )));
            }
            if positions.insert(name.clone(), i).is_some() {
                return Err(Error::InvalidConfig(format!(
                    "duplicate comparator name: {name}"
                )));
            }
        }
        Ok(Self { names, positions })
    }

    #[inline]
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    #[inline]
    #[must_use]
    pub fn arity(&self) -> usize {
        self.names.len()
    }
}

/// Fixed-arity, positional similarity scores for one record pair. `None`
/// marks a component where the pair could not be compared; it is never
/// conflated with 0.0.
#[derive(Clone, PartialEq)]
pub struct SimilarityVector {
    components: SmallVec<[Option<f64>; 8]>,
}

impl SimilarityVector {
    #[must_use]
    pub fn new<I>(components: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        Self {
            components: components.into_iter().collect(),
        }
    }

    #[inline]
    #[must_use]
    pub fn components(&self) -> &[Option<f64>] {
        &self.components
    }

    /// Component score, flattened: `None` for missing or out of range.
    #[inline]
    #[must_use]
    pub fn component(&self, position: usize) -> Option<f64> {
        self.components.get(position).copied().flatten()
    }

    #[inline]
    #[must_use]
    pub fn arity(&self) -> usize {
        self.components.len()
    }
}

impl std::ops::Index<usize> for SimilarityVector {
    type Output = Option<f64>;

    fn index(&self, position: usize) -> &Self::Output {
        &self.components[position]
    }
}

impl FromIterator<Option<f64>> for SimilarityVector {
    fn from_iter<I: IntoIterator<Item = Option<f64>>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Debug for SimilarityVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.components.iter()).finish()
    }
}

/// An ordered pair of compared records.
///
/// For self-linkage use [`RecordPair::canonical`], which orders the two
/// records by their total order (identifier first) so a pair is cached once
/// regardless of discovery order. For cross-linkage use
/// [`RecordPair::cross`], which keeps (left dataset, right dataset).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordPair {
    left: Record,
    right: Record,
}

impl RecordPair {
    #[must_use]
    pub fn canonical(a: &Record, b: &Record) -> Self {
        if a <= b {
            Self {
                left: a.clone(),
                right: b.clone(),
            }
        } else {
            Self {
                left: b.clone(),
                right: a.clone(),
            }
        }
    }

    #[must_use]
    pub fn cross(left: &Record, right: &Record) -> Self {
        Self {
            left: left.clone(),
            right: right.clone(),
        }
    }

    #[inline]
    #[must_use]
    pub fn left(&self) -> &Record {
        &self.left
    }

    #[inline]
    #[must_use]
    pub fn right(&self) -> &Record {
        &self.right
    }
}

/// The comparison cache: canonical record pair to similarity vector.
///
/// Grows monotonically during a matching run and is handed whole to the
/// classification layer. [`Comparisons::merge`] folds the output of
/// parallel workers together; duplicate pairs resolve last-writer-wins,
/// which is safe because every writer computes the same deterministic
/// vector for a given pair.
#[derive(Debug, Clone, Default)]
pub struct Comparisons {
    vectors: AHashMap<RecordPair, SimilarityVector>,
}

impl Comparisons {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, pair: &RecordPair) -> bool {
        self.vectors.contains_key(pair)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, pair: &RecordPair) -> Option<&SimilarityVector> {
        self.vectors.get(pair)
    }

    pub fn insert(&mut self, pair: RecordPair, vector: SimilarityVector) {
        self.vectors.insert(pair, vector);
    }

    /// Fold another cache into this one, last writer wins.
    pub fn merge(&mut self, other: Comparisons) {
        self.vectors.extend(other.vectors);
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecordPair, &SimilarityVector)> {
        self.vectors.iter()
    }

    pub fn pairs(&self) -> impl Iterator<Item = &RecordPair> {
        self.vectors.keys()
    }
}

impl<'a> IntoIterator for &'a Comparisons {
    type Item = (&'a RecordPair, &'a SimilarityVector);
    type IntoIter = std::collections::hash_map::Iter<'a, RecordPair, SimilarityVector>;

    fn into_iter(self) -> Self::IntoIter {
        self.vectors.iter()
    }
}

/// Ordered, named field comparators producing one similarity vector per
/// record pair, plus the pairing drivers.
pub struct RecordComparator {
    fields: Vec<(String, Box<dyn FieldCompare>)>,
    schema: Arc<VectorSchema>,
}

impl RecordComparator {
    /// Fix the vector shape from ordered `(name, comparator)` pairs. Names
    /// must be non-empty and unique.
    pub fn new(fields: Vec<(String, Box<dyn FieldCompare>)>) -> Result<Self> {
        let schema = VectorSchema::new(fields.iter().map(|(name, _)| name.clone()).collect())?;
        Ok(Self {
            fields,
            schema: Arc::new(schema),
        })
    }

    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Arc<VectorSchema> {
        &self.schema
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &dyn FieldCompare)> {
        self.fields
            .iter()
            .map(|(name, comparator)| (name.as_str(), comparator.as_ref()))
    }

    /// Compare one record pair on every field, in schema order.
    pub fn compare(&self, left: &Record, right: &Record) -> Result<SimilarityVector> {
        let mut components = SmallVec::with_capacity(self.fields.len());
        for (_, comparator) in &self.fields {
            components.push(comparator.compare(left, right)?);
        }
        Ok(SimilarityVector { components })
    }

    /// Every distinct unordered pair of one record set, canonical order.
    /// Quadratic; for small inputs and validation runs.
    pub fn dedupe_exhaustive(&self, records: &[Record]) -> Result<Comparisons> {
        let mut cache = Comparisons::new();
        for j in 1..records.len() {
            for i in 0..j {
                let (a, b) = (&records[i], &records[j]);
                if a == b {
                    continue;
                }
                let pair = RecordPair::canonical(a, b);
                if !cache.contains(&pair) {
                    let vector = self.compare(pair.left(), pair.right())?;
                    cache.insert(pair, vector);
                }
            }
        }
        Ok(cache)
    }

    /// Full cross product of two disjoint record sets.
    pub fn link_exhaustive(&self, left: &[Record], right: &[Record]) -> Result<Comparisons> {
        let mut cache = Comparisons::new();
        for a in left {
            for b in right {
                let pair = RecordPair::cross(a, b);
                if !cache.contains(&pair) {
                    let vector = self.compare(a, b)?;
                    cache.insert(pair, vector);
                }
            }
        }
        Ok(cache)
    }

    /// Indexed self-comparison: unordered pairs within each bucket of each
    /// index, deduplicated through the shared cache.
    pub fn dedupe(&self, indices: &Indices) -> Result<Comparisons> {
        let mut cache = Comparisons::new();
        for (_, index) in indices.iter() {
            index.compare_within(self, &mut cache)?;
        }
        Ok(cache)
    }

    /// Indexed dual-dataset comparison: bucket cross products for every key
    /// shared by positionally-paired indexes. The two collections must be
    /// distinct objects and structurally parallel.
    pub fn link(&self, left: &Indices, right: &Indices) -> Result<Comparisons> {
        self.check_linkable(left, right)?;
        let mut cache = Comparisons::new();
        for ((_, l), (_, r)) in left.iter().zip(right.iter()) {
            l.compare_against(r, self, &mut cache)?;
        }
        Ok(cache)
    }

    /// Parallel [`Self::dedupe`]: candidate pairs are enumerated and
    /// deduplicated first, then vectors are computed on the rayon pool and
    /// merged. The comparator still runs at most once per distinct pair.
    pub fn par_dedupe(&self, indices: &Indices) -> Result<Comparisons> {
        let mut seen = AHashSet::new();
        let mut pairs = Vec::new();
        for (_, index) in indices.iter() {
            for (_, bucket) in index.iter() {
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
                        if seen.insert(pair.clone()) {
                            pairs.push(pair);
                        }
                    }
                }
            }
        }
        self.compare_pairs(pairs)
    }

    /// Parallel [`Self::link`], same enumeration-then-compute split.
    pub fn par_link(&self, left: &Indices, right: &Indices) -> Result<Comparisons> {
        self.check_linkable(left, right)?;
        let mut seen = AHashSet::new();
        let mut pairs = Vec::new();
        for ((_, l), (_, r)) in left.iter().zip(right.iter()) {
            for (key, bucket) in l.iter() {
                let Some(theirs) = r.bucket(key) else {
                    continue;
                };
                for a in bucket {
                    for b in theirs {
                        let pair = RecordPair::cross(a, b);
                        if seen.insert(pair.clone()) {
                            pairs.push(pair);
                        }
                    }
                }
            }
        }
        self.compare_pairs(pairs)
    }

    fn check_linkable(&self, left: &Indices, right: &Indices) -> Result<()> {
        if std::ptr::eq(left, right) {
            return Err(Error::SameIndices);
        }
        if left.len() != right.len() {
            return Err(Error::StrategyMismatch {
                left: left.len(),
                right: right.len(),
            });
        }
        Ok(())
    }

    fn compare_pairs(&self, pairs: Vec<RecordPair>) -> Result<Comparisons> {
        let computed = pairs
            .into_par_iter()
            .map(|pair| {
                let vector = self.compare(pair.left(), pair.right())?;
                Ok((pair, vector))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut cache = Comparisons::new();
        for (pair, vector) in computed {
            cache.insert(pair, vector);
        }
        Ok(cache)
    }
}

impl fmt::Debug for RecordComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordComparator")
            .field("fields", &self.schema.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::field::{FieldSpec, ValueSim};
    use crate::index::{Key, KeyFn};
    use crate::record::RecordSchema;

    fn schema() -> Arc<RecordSchema> {
        Arc::new(RecordSchema::new(["id", "name", "age"]).unwrap())
    }

    fn records(rows: &[[&str; 3]]) -> Vec<Record> {
        rows.iter()
            .map(|row| Record::new(schema(), row.iter().copied()).unwrap())
            .collect()
    }

    fn exact(position: usize) -> Box<dyn FieldCompare> {
        Box::new(ValueSim::new(
            FieldSpec::Position(position),
            None,
            Arc::new(|a: &str, b: &str| Some(if a == b { 1.0 } else { 0.0 })),
        ))
    }

    fn comparator() -> RecordComparator {
        RecordComparator::new(vec![
            ("name".to_string(), exact(1)),
            ("age".to_string(), exact(2)),
        ])
        .unwrap()
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
    fn test_vector_shape_follows_field_order() {
        let comparator = comparator();
        assert_eq!(comparator.schema().names(), ["name", "age"]);
        assert_eq!(comparator.schema().position("age"), Some(1));
        let recs = records(&[["1", "Jon", "30"], ["2", "Jon", "31"]]);
        let vector = comparator.compare(&recs[0], &recs[1]).unwrap();
        assert_eq!(vector.components(), [Some(1.0), Some(0.0)]);
        assert_eq!(vector.component(0), Some(1.0));
        assert_eq!(vector[1], Some(0.0));
    }

    #[test]
    fn test_duplicate_field_names_rejected() {
        let result = RecordComparator::new(vec![
            ("name".to_string(), exact(1)),
            ("name".to_string(), exact(2)),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_dedupe_exhaustive_counts() {
        let recs = records(&[["1", "Jon", "30"], ["2", "John", "30"], ["3", "Amy", "25"]]);
        let comparisons = comparator().dedupe_exhaustive(&recs).unwrap();
        assert_eq!(comparisons.len(), 3);
        // Pairs are cached in canonical order.
        for (pair, _) in comparisons.iter() {
            assert!(pair.left() < pair.right());
        }
    }

    #[test]
    fn test_indexed_dedupe_single_shared_key() {
        let recs = records(&[["1", "Jon", "30"], ["2", "John", "30"], ["3", "Amy", "25"]]);
        let mut indices = Indices::from_strategy(vec![("first".to_string(), first_letter())]);
        indices.insert_all(&recs).unwrap();
        let comparisons = comparator().dedupe(&indices).unwrap();
        assert_eq!(comparisons.len(), 1);
        let pair = comparisons.pairs().next().unwrap();
        assert_eq!(pair.left().id(), "1");
        assert_eq!(pair.right().id(), "2");
    }

    #[test]
    fn test_indexed_subset_of_exhaustive() {
        let recs = records(&[
            ["1", "Jon", "30"],
            ["2", "John", "30"],
            ["3", "Jim", "25"],
            ["4", "Amy", "25"],
        ]);
        let comparator = comparator();
        let exhaustive = comparator.dedupe_exhaustive(&recs).unwrap();
        let mut indices = Indices::from_strategy(vec![("first".to_string(), first_letter())]);
        indices.insert_all(&recs).unwrap();
        let indexed = comparator.dedupe(&indices).unwrap();
        assert!(indexed.len() <= exhaustive.len());
        for (pair, vector) in indexed.iter() {
            assert_eq!(exhaustive.get(pair), Some(vector));
        }
    }

    #[test]
    fn test_at_most_once_invocation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let counting = Box::new(ValueSim::new(
            FieldSpec::Position(1),
            None,
            Arc::new(move |a: &str, b: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
                Some(if a == b { 1.0 } else { 0.0 })
            }),
        )) as Box<dyn FieldCompare>;
        let comparator = RecordComparator::new(vec![("name".to_string(), counting)]).unwrap();

        let recs = records(&[["1", "Jon", "30"], ["2", "John", "31"], ["3", "Jim", "32"]]);
        // Two indexes that both block all three records together: every
        // pair is reachable twice but must be compared once.
        let all: KeyFn = Arc::new(|_| vec![Key::from("x")]);
        let all_again: KeyFn = Arc::new(|_| vec![Key::from("y")]);
        let mut indices = Indices::from_strategy(vec![
            ("a".to_string(), all),
            ("b".to_string(), all_again),
        ]);
        indices.insert_all(&recs).unwrap();

        let comparisons = comparator.dedupe(&indices).unwrap();
        assert_eq!(comparisons.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // The blocking estimate may overcount, never undercount.
        assert!(indices.count_comparisons(None) >= comparisons.len() as u64);
    }

    #[test]
    fn test_par_dedupe_matches_sequential() {
        let recs = records(&[
            ["1", "Jon", "30"],
            ["2", "John", "30"],
            ["3", "Jim", "25"],
            ["4", "Jan", "25"],
        ]);
        let comparator = comparator();
        let mut indices = Indices::from_strategy(vec![("first".to_string(), first_letter())]);
        indices.insert_all(&recs).unwrap();
        let sequential = comparator.dedupe(&indices).unwrap();
        let parallel = comparator.par_dedupe(&indices).unwrap();
        assert_eq!(sequential.len(), parallel.len());
        for (pair, vector) in sequential.iter() {
            assert_eq!(parallel.get(pair), Some(vector));
        }
    }

    #[test]
    fn test_link_rejects_same_collection() {
        let mut indices = Indices::from_strategy(vec![("first".to_string(), first_letter())]);
        indices
            .insert_all(&records(&[["1", "Jon", "30"]]))
            .unwrap();
        let err = comparator().link(&indices, &indices).unwrap_err();
        assert!(matches!(err, Error::SameIndices));
    }

    #[test]
    fn test_link_cross_orientation() {
        let left_recs = records(&[["1", "Jon", "30"]]);
        let right_recs = records(&[["9", "Jim", "30"]]);
        let comparator = comparator();
        let mut left = Indices::from_strategy(vec![("first".to_string(), first_letter())]);
        left.insert_all(&left_recs).unwrap();
        let mut right = left.clone_strategy();
        right.insert_all(&right_recs).unwrap();
        let comparisons = comparator.link(&left, &right).unwrap();
        assert_eq!(comparisons.len(), 1);
        let pair = comparisons.pairs().next().unwrap();
        // Orientation preserved even though "9" > "1".
        assert_eq!(pair.left().id(), "1");
        assert_eq!(pair.right().id(), "9");
    }

    #[test]
    fn test_link_strategy_mismatch() {
        let left = Indices::from_strategy(vec![("first".to_string(), first_letter())]);
        let right = Indices::from_strategy(vec![]);
        let err = comparator().link(&left, &right).unwrap_err();
        assert!(matches!(err, Error::StrategyMismatch { left: 1, right: 0 }));
    }

    #[test]
    fn test_empty_input_empty_output() {
        let comparator = comparator();
        assert!(comparator.dedupe_exhaustive(&[]).unwrap().is_empty());
        let indices = Indices::from_strategy(vec![("first".to_string(), first_letter())]);
        assert!(comparator.dedupe(&indices).unwrap().is_empty());
    }

    #[test]
    fn test_merge_last_writer_wins() {
        let recs = records(&[["1", "Jon", "30"], ["2", "John", "30"]]);
        let pair = RecordPair::canonical(&recs[0], &recs[1]);
        let mut a = Comparisons::new();
        a.insert(pair.clone(), SimilarityVector::new([Some(0.5)]));
        let mut b = Comparisons::new();
        b.insert(pair.clone(), SimilarityVector::new([Some(0.5)]));
        a.merge(b);
        assert_eq!(a.len(), 1);
        assert_eq!(a.get(&pair).unwrap().components(), [Some(0.5)]);
    }
}

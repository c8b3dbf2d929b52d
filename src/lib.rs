//! # dedupx
//!
//! A fast record linkage and deduplication engine.
//!
//! dedupx identifies pairs of records that refer to the same real-world
//! entity, within one dataset (dedupe) or across two (link). Instead of
//! comparing all pairs, records are blocked into inverted-index buckets by
//! caller-supplied key functions; only pairs sharing a key are compared,
//! each at most once, and the resulting similarity vectors are classified
//! into matches and non-matches.
//!
//! ## Quick Start
//!
//! ### As a CLI
//!
//! ```bash
//! cargo install dedupx
//! dedupx --config job.toml --input records.csv --output ./out
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use std::sync::Arc;
//! use dedupx::prelude::*;
//!
//! // Records: id first, then the data columns.
//! let schema = Arc::new(RecordSchema::new(["id", "name", "phone"]).unwrap());
//! let records: Vec<Record> = [
//!     ["1", "Jon Smith", "555 1234"],
//!     ["2", "John Smith", "5551234"],
//!     ["3", "Amy Jones", "555 9999"],
//! ]
//! .iter()
//! .map(|row| Record::new(schema.clone(), row.iter().copied()).unwrap())
//! .collect();
//!
//! // Block on the first letter of the name.
//! let first_letter: KeyFn = Arc::new(|record: &Record| {
//!     record
//!         .get(1)
//!         .and_then(|name| name.chars().next())
//!         .map(|c| vec![Key::Text(c.to_ascii_uppercase().to_string())])
//!         .unwrap_or_default()
//! });
//! let mut indices = Indices::from_strategy(vec![("first".to_string(), first_letter)]);
//! indices.insert_all(&records).unwrap();
//!
//! // Compare names fuzzily and phones on digits only.
//! let comparator = RecordComparator::new(vec![
//!     (
//!         "name".to_string(),
//!         Box::new(ValueSim::new(
//!             FieldSpec::Position(1),
//!             Some(Arc::new(|v: &str| dedupx::encode::lowstrip(v))),
//!             Arc::new(DamerauLevenshtein::new(0.7)),
//!         )) as Box<dyn FieldCompare>,
//!     ),
//!     (
//!         "phone".to_string(),
//!         Box::new(ValueSim::new(
//!             FieldSpec::Position(2),
//!             Some(Arc::new(|v: &str| dedupx::encode::digits(v))),
//!             Arc::new(Exact::new()),
//!         )) as Box<dyn FieldCompare>,
//!     ),
//! ])
//! .unwrap();
//!
//! let comparisons = comparator.dedupe(&indices).unwrap();
//! let result = KMeans::new().classify(&comparisons, distance::l2).unwrap();
//! assert!(result.matches.len() + result.nonmatches.len() == comparisons.len());
//! ```
//!
//! ## Crate Structure
//!
//! - [`dedupx-core`](https://docs.rs/dedupx-core) - blocking indexes,
//!   field/record comparators, comparison cache, classifiers, CSV export
//! - [`dedupx-similarity`](https://docs.rs/dedupx-similarity) - string,
//!   token and geographic similarity primitives plus value encoders
//!
//! ## Features
//!
//! - **Inverted-index blocking**: compare only pairs sharing a key, with
//!   pre-execution comparison-count estimates
//! - **At-most-once comparison**: a shared cache deduplicates pairs
//!   reached through several blocking keys
//! - **Missing-value aware**: "could not compare" is never conflated with
//!   "total mismatch", through distances, centroids and classifiers
//! - **Parallel drivers**: rayon-based comparison and K-means assignment
//! - **Diagnostic export**: CSV dumps of keys, raw values and vectors for
//!   tuning blocking and comparator configurations

// Re-export core types
pub use dedupx_core::{
    Comparisons, Encoder, Error, FieldCompare, FieldSpec, Index, IndexStats, Indices, KMeans,
    KMeansResult, Key, KeyFn, Record, RecordComparator, RecordPair, RecordSchema, Result,
    RulePartition, SetAggregate, SetSim, SetSpec, Side, Similarity, SimilarityVector, ValueSim,
    VectorSchema, Verdict,
};

// Re-export core modules with free functions
pub use dedupx_core::{distance, export, nearest, rulebased};

// Re-export similarity primitives and encoders
pub use dedupx_similarity::{
    damerau_levenshtein, DamerauLevenshtein, Exact, GeoSimilarity, Jaccard, Trigram,
};
pub use dedupx_similarity::{encode, geo};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        distance, Comparisons, DamerauLevenshtein, Encoder, Error, Exact, FieldCompare,
        FieldSpec, GeoSimilarity, Index, IndexStats, Indices, Jaccard, KMeans, KMeansResult, Key,
        KeyFn, Record, RecordComparator, RecordPair, RecordSchema, Result, RulePartition,
        SetAggregate, SetSim, SetSpec, Similarity, SimilarityVector, Trigram, ValueSim, Verdict,
    };
}

//! # dedupx Core
//!
//! Core library for the dedupx record linkage engine.
//!
//! This crate provides the machinery that organizes, deduplicates and
//! classifies record comparisons:
//!
//! - [`Record`] / [`RecordSchema`] - immutable data rows with a shared
//!   column layout
//! - [`Index`] / [`Indices`] - inverted-index blocking with comparison
//!   count estimation
//! - [`RecordComparator`] - named field comparators producing one
//!   similarity vector per record pair, with an explicit comparison cache
//! - [`KMeans`], [`rulebased`], [`nearest`] - classification of the
//!   pair-to-vector map into matches and non-matches
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use dedupx_core::{
//!     distance, FieldSpec, Indices, Key, KeyFn, KMeans, Record, RecordComparator,
//!     RecordSchema, ValueSim,
//! };
//!
//! let schema = Arc::new(RecordSchema::new(["id", "name"]).unwrap());
//! let records: Vec<Record> = [["1", "Jon"], ["2", "John"], ["3", "Amy"]]
//!     .iter()
//!     .map(|row| Record::new(schema.clone(), row.iter().copied()).unwrap())
//!     .collect();
//!
//! // Block on the first letter of the name.
//! let first_letter: KeyFn = Arc::new(|record: &Record| {
//!     record
//!         .get(1)
//!         .and_then(|name| name.chars().next())
//!         .map(|c| vec![Key::Text(c.to_string())])
//!         .unwrap_or_default()
//! });
//! let mut indices = Indices::from_strategy(vec![("first".to_string(), first_letter)]);
//! indices.insert_all(&records).unwrap();
//!
//! // Compare candidate pairs on the name field.
//! let comparator = RecordComparator::new(vec![(
//!     "name".to_string(),
//!     Box::new(ValueSim::new(
//!         FieldSpec::Position(1),
//!         None,
//!         Arc::new(|a: &str, b: &str| Some(if a == b { 1.0 } else { 0.0 })),
//!     )) as Box<dyn dedupx_core::FieldCompare>,
//! )])
//! .unwrap();
//! let comparisons = comparator.dedupe(&indices).unwrap();
//!
//! // Cluster the similarity vectors into matches and non-matches.
//! let result = KMeans::new().classify(&comparisons, distance::l2).unwrap();
//! assert_eq!(result.matches.len() + result.nonmatches.len(), comparisons.len());
//! ```

pub mod compare;
pub mod distance;
pub mod error;
pub mod export;
pub mod field;
pub mod index;
pub mod kmeans;
pub mod nearest;
pub mod record;
pub mod rulebased;

pub use compare::{Comparisons, RecordComparator, RecordPair, SimilarityVector, VectorSchema};
pub use error::{Error, Result};
pub use field::{Encoder, FieldCompare, FieldSpec, SetAggregate, SetSim, SetSpec, Side, Similarity, ValueSim};
pub use index::{Index, IndexStats, Indices, Key, KeyFn};
pub use kmeans::{KMeans, KMeansResult};
pub use record::{Record, RecordSchema};
pub use rulebased::{RulePartition, Verdict};

//! # dedupx Similarity
//!
//! Concrete similarity primitives and value encoders for the dedupx record
//! linkage engine.
//!
//! Everything here implements or feeds the
//! [`Similarity`](dedupx_core::Similarity) and
//! [`Encoder`](dedupx_core::Encoder) contracts defined in `dedupx-core`,
//! so any primitive can be swapped for a caller-supplied one without
//! touching the matching machinery.
//!
//! - [`DamerauLevenshtein`] - edit-distance string similarity with a
//!   difference threshold
//! - [`Exact`], [`Jaccard`], [`Trigram`] - equality and token/trigram
//!   overlap scores
//! - [`GeoSimilarity`] - great-circle coordinate similarity with a
//!   near/far ramp
//! - [`encode`] - pure text normalizers (case folding, whitespace,
//!   digits, URL/e-mail domains)
//!
//! ## Example
//!
//! ```rust
//! use dedupx_core::Similarity;
//! use dedupx_similarity::DamerauLevenshtein;
//!
//! let sim = DamerauLevenshtein::new(0.7).with_missing(0.2);
//! assert_eq!(sim.compare("jon", "jon"), Some(1.0));
//! assert_eq!(sim.compare("", "jon"), Some(0.2));
//! ```

pub mod encode;
pub mod geo;
pub mod text;

pub use geo::GeoSimilarity;
pub use text::{damerau_levenshtein, DamerauLevenshtein, Exact, Jaccard, Trigram};

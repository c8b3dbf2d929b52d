//! Nearest-neighbour classification of similarity vectors.
//!
//! Each pair takes the class of its nearest labelled example vector. Useful
//! when a handful of hand-labelled match/non-match vectors is available and
//! unsupervised clustering is not wanted.

use std::collections::HashMap;

use tracing::debug;

use crate::compare::{Comparisons, RecordPair, SimilarityVector};
use crate::{Error, Result};

/// Classify every pair by distance to the nearest example vector. Scores
/// are the same log-ratio of distances K-means produces, so the output
/// shape is interchangeable.
pub fn classify<D>(
    comparisons: &Comparisons,
    match_examples: &[SimilarityVector],
    nonmatch_examples: &[SimilarityVector],
    distance: D,
) -> Result<(HashMap<RecordPair, f64>, HashMap<RecordPair, f64>)>
where
    D: Fn(&[Option<f64>], &[Option<f64>]) -> f64,
{
    if match_examples.is_empty() || nonmatch_examples.is_empty() {
        return Err(Error::InvalidConfig(
            "nearest-neighbour classification needs at least one example of each class"
                .to_string(),
        ));
    }
    debug!(
        "nearest-neighbour: {} match examples, {} non-match examples",
        match_examples.len(),
        nonmatch_examples.len()
    );

    let nearest = |vector: &SimilarityVector, examples: &[SimilarityVector]| {
        examples
            .iter()
            .map(|example| distance(vector.components(), example.components()))
            .fold(f64::INFINITY, f64::min)
    };

    let mut matches = HashMap::new();
    let mut nonmatches = HashMap::new();
    for (pair, vector) in comparisons.iter() {
        let match_dist = nearest(vector, match_examples);
        let nonmatch_dist = nearest(vector, nonmatch_examples);
        let score = ((nonmatch_dist + 0.1) / (match_dist + 0.1)).log10();
        if match_dist < nonmatch_dist {
            matches.insert(pair.clone(), score);
        } else {
            nonmatches.insert(pair.clone(), score);
        }
    }
    debug!(
        "nearest-neighbour: {} matches, {} non-matches",
        matches.len(),
        nonmatches.len()
    );
    Ok((matches, nonmatches))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::distance;
    use crate::record::{Record, RecordSchema};

    fn pair(a: &str, b: &str) -> RecordPair {
        let schema = Arc::new(RecordSchema::new(["id"]).unwrap());
        RecordPair::canonical(
            &Record::new(schema.clone(), [a]).unwrap(),
            &Record::new(schema, [b]).unwrap(),
        )
    }

    fn vector(components: &[Option<f64>]) -> SimilarityVector {
        SimilarityVector::new(components.iter().copied())
    }

    #[test]
    fn test_classifies_by_nearest_example() {
        let mut cache = Comparisons::new();
        cache.insert(pair("1", "2"), vector(&[Some(0.5)]));
        cache.insert(pair("2", "3"), vector(&[Some(0.8)]));
        cache.insert(pair("3", "4"), vector(&[Some(0.9)]));
        cache.insert(pair("4", "5"), vector(&[Some(0.0)]));

        let (matches, nonmatches) = classify(
            &cache,
            &[vector(&[Some(1.0)])],
            &[vector(&[Some(0.3)])],
            distance::l2,
        )
        .unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches.contains_key(&pair("2", "3")));
        assert!(matches.contains_key(&pair("3", "4")));
        assert_eq!(nonmatches.len(), 2);
    }

    #[test]
    fn test_missing_components_in_examples() {
        let mut cache = Comparisons::new();
        cache.insert(pair("1", "2"), vector(&[Some(0.9), Some(0.5)]));
        let (matches, _) = classify(
            &cache,
            &[vector(&[Some(1.0), None])],
            &[vector(&[Some(0.3), Some(0.3)])],
            distance::l2,
        )
        .unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_requires_examples() {
        let err = classify(&Comparisons::new(), &[], &[vector(&[Some(0.0)])], distance::l2)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}

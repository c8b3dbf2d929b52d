//! Rule-based classification into match, non-match and uncertain.
//!
//! The rule is a deterministic predicate over the similarity vector. It is
//! fallible so that dynamically configured rules (verdict strings parsed
//! with [`Verdict::from_str`]) surface bad outcomes as errors naming the
//! offending pair instead of being coerced into a class.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use tracing::debug;

use crate::compare::{Comparisons, RecordPair, SimilarityVector};
use crate::{Error, Result};

/// The three admissible rule outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
    NonMatch,
    Uncertain,
}

impl FromStr for Verdict {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "match" => Ok(Verdict::Match),
            "nonmatch" | "non-match" => Ok(Verdict::NonMatch),
            "uncertain" | "undecided" => Ok(Verdict::Uncertain),
            other => Err(Error::InvalidVerdict {
                value: other.to_string(),
            }),
        }
    }
}

/// Disjoint, exhaustive partition of the classified pairs.
#[derive(Debug, Clone, Default)]
pub struct RulePartition {
    pub matches: HashSet<RecordPair>,
    pub nonmatches: HashSet<RecordPair>,
    pub uncertain: HashSet<RecordPair>,
}

impl RulePartition {
    #[must_use]
    pub fn len(&self) -> usize {
        self.matches.len() + self.nonmatches.len() + self.uncertain.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty() && self.nonmatches.is_empty() && self.uncertain.is_empty()
    }
}

/// Apply `rule` to every similarity vector and partition the pairs by
/// verdict. A failing rule aborts the classification with the offending
/// pair attached.
pub fn classify<F>(comparisons: &Comparisons, rule: F) -> Result<RulePartition>
where
    F: Fn(&SimilarityVector) -> Result<Verdict>,
{
    let mut partition = RulePartition::default();
    for (pair, vector) in comparisons.iter() {
        let verdict = rule(vector).map_err(|source| Error::Rule {
            left: pair.left().id().to_string(),
            right: pair.right().id().to_string(),
            source: Box::new(source),
        })?;
        match verdict {
            Verdict::Match => partition.matches.insert(pair.clone()),
            Verdict::NonMatch => partition.nonmatches.insert(pair.clone()),
            Verdict::Uncertain => partition.uncertain.insert(pair.clone()),
        };
    }
    debug!(
        "rule-based classifier on {} vectors: {} matches, {} non-matches, {} uncertain",
        comparisons.len(),
        partition.matches.len(),
        partition.nonmatches.len(),
        partition.uncertain.len()
    );
    Ok(partition)
}

/// Convenience form producing the score-map shape of the other
/// classifiers: matches score 1.0, non-matches 0.0, uncertain pairs are
/// dropped.
pub fn classify_scores<F>(
    comparisons: &Comparisons,
    rule: F,
) -> Result<(HashMap<RecordPair, f64>, HashMap<RecordPair, f64>)>
where
    F: Fn(&SimilarityVector) -> Result<Verdict>,
{
    let partition = classify(comparisons, rule)?;
    let matches = partition.matches.into_iter().map(|p| (p, 1.0)).collect();
    let nonmatches = partition.nonmatches.into_iter().map(|p| (p, 0.0)).collect();
    Ok((matches, nonmatches))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::record::{Record, RecordSchema};

    fn pair(a: &str, b: &str) -> RecordPair {
        let schema = Arc::new(RecordSchema::new(["id"]).unwrap());
        RecordPair::canonical(
            &Record::new(schema.clone(), [a]).unwrap(),
            &Record::new(schema, [b]).unwrap(),
        )
    }

    fn cache() -> Comparisons {
        let mut cache = Comparisons::new();
        cache.insert(pair("1", "2"), SimilarityVector::new([Some(0.9)]));
        cache.insert(pair("2", "3"), SimilarityVector::new([Some(0.1)]));
        cache.insert(pair("3", "4"), SimilarityVector::new([Some(0.5)]));
        cache
    }

    fn threshold_rule(vector: &SimilarityVector) -> Result<Verdict> {
        Ok(match vector.component(0) {
            Some(score) if score > 0.8 => Verdict::Match,
            Some(score) if score < 0.2 => Verdict::NonMatch,
            _ => Verdict::Uncertain,
        })
    }

    #[test]
    fn test_three_way_partition() {
        let cache = cache();
        let partition = classify(&cache, threshold_rule).unwrap();
        assert_eq!(partition.matches.len(), 1);
        assert!(partition.matches.contains(&pair("1", "2")));
        assert_eq!(partition.nonmatches.len(), 1);
        assert!(partition.nonmatches.contains(&pair("2", "3")));
        assert_eq!(partition.uncertain.len(), 1);
        assert!(partition.uncertain.contains(&pair("3", "4")));
        assert_eq!(partition.len(), cache.len());
    }

    #[test]
    fn test_invalid_verdict_surfaces_with_pair() {
        let cache = cache();
        let err = classify(&cache, |_| "yes".parse::<Verdict>()).unwrap_err();
        match err {
            Error::Rule { source, .. } => {
                assert!(matches!(*source, Error::InvalidVerdict { value } if value == "yes"));
            }
            other => panic!("expected rule error, got {other:?}"),
        }
    }

    #[test]
    fn test_score_map_shape() {
        let cache = cache();
        let (matches, nonmatches) = classify_scores(&cache, threshold_rule).unwrap();
        assert_eq!(matches[&pair("1", "2")], 1.0);
        assert_eq!(nonmatches[&pair("2", "3")], 0.0);
        // Uncertain pairs do not appear in the score maps.
        assert_eq!(matches.len() + nonmatches.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let partition = classify(&Comparisons::new(), threshold_rule).unwrap();
        assert!(partition.is_empty());
    }

    #[test]
    fn test_verdict_parsing() {
        assert_eq!("match".parse::<Verdict>().unwrap(), Verdict::Match);
        assert_eq!("non-match".parse::<Verdict>().unwrap(), Verdict::NonMatch);
        assert_eq!("undecided".parse::<Verdict>().unwrap(), Verdict::Uncertain);
        assert!("maybe".parse::<Verdict>().is_err());
    }
}

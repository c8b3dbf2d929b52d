//! K-means clustering of similarity vectors into matches and non-matches
//! (K = 2).
//!
//! This implementation understands missing vector components. A missing
//! component never contributes to a distance, and in centroid calculation
//! it reduces the denominator of the averaging step for that component
//! instead of dragging the mean toward zero. The directional assumption is
//! that higher similarity means more likely match; centroids are seeded
//! from the per-component maximum (match) and minimum (non-match).
//!
//! A component with no non-missing value anywhere in the input cannot seed
//! a centroid and is rejected as degenerate. During recomputation a class
//! whose members all miss a component simply loses that dimension until a
//! contributor is assigned.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::compare::{Comparisons, RecordPair, SimilarityVector};
use crate::{Error, Result};

/// K-means classifier configuration.
#[derive(Debug, Clone)]
pub struct KMeans {
    max_iterations: usize,
    sample: Option<f64>,
    seed: Option<u64>,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            sample: None,
            seed: None,
        }
    }
}

/// Outcome of a clustering run. `matches` and `nonmatches` are disjoint and
/// together cover every input pair; scores are the log-ratio of centroid
/// distances (positive means closer to the match centroid).
#[derive(Debug, Clone)]
pub struct KMeansResult {
    pub matches: HashMap<RecordPair, f64>,
    pub nonmatches: HashMap<RecordPair, f64>,
    pub match_centroid: Vec<Option<f64>>,
    pub nonmatch_centroid: Vec<Option<f64>>,
    pub iterations: usize,
    pub converged: bool,
}

impl KMeans {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Iteration budget; reaching it without stabilizing is not an error.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Fit the initial centroids on a random fraction of the vectors
    /// (0 < fraction <= 1). The assignment loop always runs over the full
    /// input. The sample must still cover every vector component with at
    /// least one non-missing value.
    #[must_use]
    pub fn with_sample(mut self, fraction: f64) -> Self {
        self.sample = Some(fraction);
        self
    }

    /// Seed the sampling RNG for reproducible runs.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Cluster every pair around a match and a non-match centroid.
    ///
    /// `distance` compares two similarity vectors and must ignore
    /// components missing on either side (see [`crate::distance`]).
    pub fn classify<D>(&self, comparisons: &Comparisons, distance: D) -> Result<KMeansResult>
    where
        D: Fn(&[Option<f64>], &[Option<f64>]) -> f64 + Sync,
    {
        if comparisons.is_empty() {
            return Ok(KMeansResult {
                matches: HashMap::new(),
                nonmatches: HashMap::new(),
                match_centroid: Vec::new(),
                nonmatch_centroid: Vec::new(),
                iterations: 0,
                converged: true,
            });
        }

        let entries: Vec<(&RecordPair, &SimilarityVector)> = comparisons.iter().collect();
        let arity = entries[0].1.arity();
        debug!("k-means: {} vectors, arity {arity}, max {} iterations", entries.len(), self.max_iterations);

        let (mut high, mut low) = self.initial_centroids(&entries, arity)?;
        debug!("k-means: initial match centroid {high:?}, non-match centroid {low:?}");

        // All pairs start in the non-match class.
        let mut assignments = vec![false; entries.len()];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            iterations += 1;

            let next: Vec<bool> = entries
                .par_iter()
                .map(|(_, vector)| {
                    distance(vector.components(), &high) < distance(vector.components(), &low)
                })
                .collect();
            let changed = next
                .iter()
                .zip(&assignments)
                .filter(|(a, b)| a != b)
                .count();
            assignments = next;

            // Per-class component sums and non-missing counts.
            let mut high_total = vec![0.0f64; arity];
            let mut high_count = vec![0usize; arity];
            let mut low_total = vec![0.0f64; arity];
            let mut low_count = vec![0usize; arity];
            let mut high_members = 0usize;
            for (&is_match, (_, vector)) in assignments.iter().zip(&entries) {
                if is_match {
                    high_members += 1;
                }
                for (i, component) in vector.components().iter().enumerate() {
                    if let Some(value) = component {
                        if is_match {
                            high_total[i] += value;
                            high_count[i] += 1;
                        } else {
                            low_total[i] += value;
                            low_count[i] += 1;
                        }
                    }
                }
            }
            let low_members = entries.len() - high_members;
            high = recompute("match", high, &high_total, &high_count, high_members);
            low = recompute("nonmatch", low, &low_total, &low_count, low_members);

            debug!("k-means: iteration {iterations}: {changed} vectors changed assignment");
            if changed == 0 {
                converged = true;
                break;
            }
        }
        if !converged {
            warn!("k-means: iteration budget of {} exhausted before stabilizing", self.max_iterations);
        }

        // Smoothed score: log-ratio of the distances to each centroid.
        let score = |vector: &SimilarityVector| {
            ((distance(vector.components(), &low) + 0.1)
                / (distance(vector.components(), &high) + 0.1))
                .log10()
        };
        let mut matches = HashMap::new();
        let mut nonmatches = HashMap::new();
        for (&is_match, (pair, vector)) in assignments.iter().zip(&entries) {
            if is_match {
                matches.insert((*pair).clone(), score(vector));
            } else {
                nonmatches.insert((*pair).clone(), score(vector));
            }
        }
        debug!(
            "k-means: classified {} vectors, {} matches, {} non-matches",
            entries.len(),
            matches.len(),
            nonmatches.len()
        );

        Ok(KMeansResult {
            matches,
            nonmatches,
            match_centroid: high,
            nonmatch_centroid: low,
            iterations,
            converged,
        })
    }

    /// Per-component max (match) and min (non-match) over the observed,
    /// possibly sampled, vectors.
    fn initial_centroids(
        &self,
        entries: &[(&RecordPair, &SimilarityVector)],
        arity: usize,
    ) -> Result<(Vec<Option<f64>>, Vec<Option<f64>>)> {
        let vectors: Vec<&SimilarityVector> = entries.iter().map(|(_, v)| *v).collect();
        let fit: Vec<&SimilarityVector> = match self.sample {
            Some(fraction) => {
                if !(fraction > 0.0 && fraction <= 1.0) {
                    return Err(Error::InvalidConfig(format!(
                        "sample fraction must be in (0, 1], got {fraction}"
                    )));
                }
                let count = ((vectors.len() as f64 * fraction).ceil() as usize)
                    .clamp(1, vectors.len());
                let mut rng = match self.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_os_rng(),
                };
                vectors.choose_multiple(&mut rng, count).copied().collect()
            }
            None => vectors,
        };

        let mut high = Vec::with_capacity(arity);
        let mut low = Vec::with_capacity(arity);
        for i in 0..arity {
            let mut max: Option<f64> = None;
            let mut min: Option<f64> = None;
            for vector in &fit {
                if let Some(value) = vector.component(i) {
                    max = Some(max.map_or(value, |m: f64| m.max(value)));
                    min = Some(min.map_or(value, |m: f64| m.min(value)));
                }
            }
            let (Some(max), Some(min)) = (max, min) else {
                return Err(Error::DegenerateCentroid {
                    class: "initial".to_string(),
                    component: i,
                });
            };
            high.push(Some(max));
            low.push(Some(min));
        }
        Ok((high, low))
    }
}

/// Mean over assigned members per component, missing values excluded from
/// both numerator and denominator. An empty class keeps its previous
/// centroid. A component all of whose class members are missing becomes a
/// missing centroid component (reduced dimensionality), reported but never
/// divided by zero.
fn recompute(
    class: &str,
    previous: Vec<Option<f64>>,
    totals: &[f64],
    counts: &[usize],
    members: usize,
) -> Vec<Option<f64>> {
    if members == 0 {
        warn!("k-means: {class} class is empty, centroid unchanged");
        return previous;
    }
    totals
        .iter()
        .zip(counts)
        .enumerate()
        .map(|(component, (total, &count))| {
            if count == 0 {
                warn!("k-means: component {component} of the {class} centroid has no non-missing contributors");
                None
            } else {
                Some(total / count as f64)
            }
        })
        .collect()
}

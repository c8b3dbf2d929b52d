//! Text similarity primitives.
//!
//! Every primitive returns a score in [0.0, 1.0] through the
//! [`Similarity`] contract and carries its own configurable missing
//! result, so "could not compare" never collapses into "total mismatch".

use dedupx_core::Similarity;
use std::collections::HashSet;

/// Damerau-Levenshtein distance between two strings: the number of
/// additions, deletions, substitutions and transpositions of consecutive
/// characters needed to turn one into the other. O(n*m) time, two rows of
/// space.
#[must_use]
pub fn damerau_levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let cols = b.len() + 1;
    let mut two_ago = vec![0usize; cols];
    let mut one_ago: Vec<usize> = (0..cols).collect();
    let mut current = vec![0usize; cols];
    for i in 1..=a.len() {
        current[0] = i;
        for j in 1..=b.len() {
            let substitution = one_ago[j - 1] + usize::from(a[i - 1] != b[j - 1]);
            let deletion = one_ago[j] + 1;
            let insertion = current[j - 1] + 1;
            let mut best = substitution.min(deletion).min(insertion);
            if i > 1
                && j > 1
                && a[i - 1] == b[j - 2]
                && a[i - 2] == b[j - 1]
                && a[i - 1] != b[j - 1]
            {
                best = best.min(two_ago[j - 2] + 1);
            }
            current[j] = best;
        }
        std::mem::swap(&mut two_ago, &mut one_ago);
        std::mem::swap(&mut one_ago, &mut current);
    }
    one_ago[b.len()]
}

/// Damerau-Levenshtein string similarity scaled to [0.0, 1.0].
///
/// The threshold scales the maximum number of differences tolerated before
/// the score drops to 0.0, relative to the shorter string's length.
/// Thresholds below 1.0 are stricter, above 1.0 more lenient.
#[derive(Debug, Clone)]
pub struct DamerauLevenshtein {
    threshold: f64,
    missing: Option<f64>,
}

impl DamerauLevenshtein {
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            missing: None,
        }
    }

    /// Score to return when either value is missing.
    #[must_use]
    pub fn with_missing(mut self, missing: f64) -> Self {
        self.missing = Some(missing);
        self
    }
}

impl Default for DamerauLevenshtein {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Similarity for DamerauLevenshtein {
    fn compare(&self, a: &str, b: &str) -> Option<f64> {
        if a.is_empty() || b.is_empty() {
            return self.missing;
        }
        let ndiffs = damerau_levenshtein(a, b) as f64;
        let shorter = a.chars().count().min(b.chars().count());
        let maxdiffs = shorter as f64 * self.threshold;
        if ndiffs >= maxdiffs {
            Some(0.0)
        } else {
            Some(1.0 - ndiffs / maxdiffs)
        }
    }

    fn missing(&self) -> Option<f64> {
        self.missing
    }
}

/// Exact equality: 1.0 or 0.0. Case folding belongs to the encoder unless
/// [`Exact::ignore_case`] is used.
#[derive(Debug, Clone, Default)]
pub struct Exact {
    ignore_case: bool,
    missing: Option<f64>,
}

impl Exact {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ignore_case() -> Self {
        Self {
            ignore_case: true,
            missing: None,
        }
    }

    #[must_use]
    pub fn with_missing(mut self, missing: f64) -> Self {
        self.missing = Some(missing);
        self
    }
}

impl Similarity for Exact {
    fn compare(&self, a: &str, b: &str) -> Option<f64> {
        if a.is_empty() || b.is_empty() {
            return self.missing;
        }
        let equal = if self.ignore_case {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        };
        Some(if equal { 1.0 } else { 0.0 })
    }

    fn missing(&self) -> Option<f64> {
        self.missing
    }
}

/// Jaccard index over whitespace-separated, lowercased tokens.
#[derive(Debug, Clone, Default)]
pub struct Jaccard {
    missing: Option<f64>,
}

impl Jaccard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_missing(mut self, missing: f64) -> Self {
        self.missing = Some(missing);
        self
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

impl Similarity for Jaccard {
    fn compare(&self, a: &str, b: &str) -> Option<f64> {
        if a.is_empty() || b.is_empty() {
            return self.missing;
        }
        let a = tokens(a);
        let b = tokens(b);
        let union = a.union(&b).count();
        if union == 0 {
            return self.missing;
        }
        let intersection = a.intersection(&b).count();
        Some(intersection as f64 / union as f64)
    }

    fn missing(&self) -> Option<f64> {
        self.missing
    }
}

/// Jaccard index over padded character trigrams, for fuzzy matching that
/// tolerates word order and small edits.
#[derive(Debug, Clone, Default)]
pub struct Trigram {
    missing: Option<f64>,
}

impl Trigram {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_missing(mut self, missing: f64) -> Self {
        self.missing = Some(missing);
        self
    }
}

fn trigrams(text: &str) -> HashSet<String> {
    let padded = format!("  {}  ", text.to_lowercase());
    let chars: Vec<char> = padded.chars().collect();
    chars
        .windows(3)
        .map(|window| window.iter().collect::<String>())
        .collect()
}

impl Similarity for Trigram {
    fn compare(&self, a: &str, b: &str) -> Option<f64> {
        if a.is_empty() || b.is_empty() {
            return self.missing;
        }
        let a = trigrams(a);
        let b = trigrams(b);
        let union = a.union(&b).count();
        if union == 0 {
            return self.missing;
        }
        let intersection = a.intersection(&b).count();
        Some(intersection as f64 / union as f64)
    }

    fn missing(&self) -> Option<f64> {
        self.missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damerau_levenshtein_distance() {
        assert_eq!(damerau_levenshtein("", ""), 0);
        assert_eq!(damerau_levenshtein("abc", ""), 3);
        assert_eq!(damerau_levenshtein("abc", "abc"), 0);
        assert_eq!(damerau_levenshtein("abcd", "acbd"), 1); // one transposition
        assert_eq!(damerau_levenshtein("jon", "john"), 1);
        assert_eq!(damerau_levenshtein("kitten", "sitting"), 3);
    }

    #[test]
    fn test_damerau_similarity() {
        let sim = DamerauLevenshtein::default();
        assert_eq!(sim.compare("jon", "jon"), Some(1.0));
        // 1 difference over a shorter length of 3.
        let score = sim.compare("jon", "john").unwrap();
        assert!((score - (1.0 - 1.0 / 3.0)).abs() < 1e-9);
        // Entirely different strings bottom out at zero.
        assert_eq!(sim.compare("abc", "xyz"), Some(0.0));
    }

    #[test]
    fn test_damerau_missing_value() {
        let sim = DamerauLevenshtein::new(0.7).with_missing(0.2);
        assert_eq!(sim.compare("", "jon"), Some(0.2));
        assert_eq!(Similarity::missing(&sim), Some(0.2));
        let plain = DamerauLevenshtein::default();
        assert_eq!(plain.compare("", "jon"), None);
    }

    #[test]
    fn test_exact() {
        let sim = Exact::new();
        assert_eq!(sim.compare("red", "red"), Some(1.0));
        assert_eq!(sim.compare("red", "RED"), Some(0.0));
        assert_eq!(Exact::ignore_case().compare("red", "RED"), Some(1.0));
    }

    #[test]
    fn test_jaccard() {
        let sim = Jaccard::new();
        assert_eq!(sim.compare("red blue", "red blue"), Some(1.0));
        let score = sim.compare("red blue", "blue green").unwrap();
        assert!((score - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(sim.compare("red", "green"), Some(0.0));
    }

    #[test]
    fn test_trigram() {
        let sim = Trigram::new();
        let close = sim.compare("prosciutto cotto", "prosciutto crudo").unwrap();
        assert!(close > 0.5);
        let far = sim.compare("apple", "banana").unwrap();
        assert!(far < 0.3);
    }
}

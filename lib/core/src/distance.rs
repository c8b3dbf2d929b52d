//! Distances between similarity vectors.
//!
//! Every function skips components where either operand is missing, so a
//! pair that could not be compared on some field is treated as a
//! reduced-dimensionality vector rather than penalized as a mismatch.

/// L2 (Euclidean) distance, missing components discarded.
#[must_use]
pub fn l2(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .filter_map(|(x, y)| Some((x.as_ref()? - y.as_ref()?).powi(2)))
        .sum::<f64>()
        .sqrt()
}

/// L2 distance with per-component scaling: each difference is divided by
/// the component's standard deviation before squaring, the Mahalanobis
/// distance with a diagonal covariance matrix. Missing components are
/// discarded.
#[must_use]
pub fn scaled_l2(stdevs: Vec<f64>) -> impl Fn(&[Option<f64>], &[Option<f64>]) -> f64 {
    move |a, b| {
        debug_assert_eq!(a.len(), b.len());
        debug_assert_eq!(a.len(), stdevs.len());
        a.iter()
            .zip(b)
            .zip(&stdevs)
            .filter_map(|((x, y), s)| Some(((x.as_ref()? - y.as_ref()?) / s).powi(2)))
            .sum::<f64>()
            .sqrt()
    }
}

//! Geographic distance and similarity.
//!
//! Coordinates travel through the comparison pipeline as `"lat,lon"`
//! strings (see [`coordinate_spec`]); the primitive parses and validates
//! them, returning its missing result for anything unusable.

use std::sync::Arc;

use dedupx_core::{FieldSpec, Record, Similarity};

const EARTH_RADIUS_KM: f64 = 6372.0;

/// Parse a `"lat,lon"` value.
#[must_use]
pub fn parse_coordinates(text: &str) -> Option<(f64, f64)> {
    let (lat, lon) = text.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    Some((lat, lon))
}

/// Whether the pair is a usable geographic coordinate.
#[must_use]
pub fn valid(lat: f64, lon: f64) -> bool {
    lat > -90.0 && lat < 90.0 && lon > -180.0 && lon < 180.0
}

/// Great-circle distance in kilometers between two (lat, lon) points.
/// Distances under 3 meters collapse to zero to absorb float noise on
/// near-identical coordinates.
#[must_use]
pub fn distance_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let cosine = (lon1 - lon2).cos() * lat1.cos() * lat2.cos() + lat1.sin() * lat2.sin();
    if cosine >= 1.0 {
        return 0.0;
    }
    let distance = EARTH_RADIUS_KM * cosine.acos();
    if distance <= 0.003 {
        0.0
    } else {
        distance
    }
}

/// A derived field accessor combining two coordinate columns into one
/// `"lat,lon"` value; unparseable or out-of-range coordinates become a
/// missing value.
#[must_use]
pub fn coordinate_spec(lat_position: usize, lon_position: usize) -> FieldSpec {
    FieldSpec::Derived(Arc::new(move |record: &Record| {
        let lat: f64 = record.get(lat_position)?.trim().parse().ok()?;
        let lon: f64 = record.get(lon_position)?.trim().parse().ok()?;
        valid(lat, lon).then(|| format!("{lat},{lon}"))
    }))
}

/// Similarity of two coordinates: 1.0 within `near` kilometers, falling
/// linearly to 0.0 at `far` kilometers.
#[derive(Debug, Clone)]
pub struct GeoSimilarity {
    near: f64,
    far: f64,
    missing: Option<f64>,
}

impl GeoSimilarity {
    #[must_use]
    pub fn new(near: f64, far: f64) -> Self {
        Self {
            near,
            far,
            missing: None,
        }
    }

    #[must_use]
    pub fn with_missing(mut self, missing: f64) -> Self {
        self.missing = Some(missing);
        self
    }
}

impl Default for GeoSimilarity {
    fn default() -> Self {
        Self::new(0.0, 3.0)
    }
}

impl Similarity for GeoSimilarity {
    fn compare(&self, a: &str, b: &str) -> Option<f64> {
        let Some((lat1, lon1)) = parse_coordinates(a) else {
            return self.missing;
        };
        let Some((lat2, lon2)) = parse_coordinates(b) else {
            return self.missing;
        };
        if !valid(lat1, lon1) || !valid(lat2, lon2) {
            return self.missing;
        }
        let distance = distance_km((lat1, lon1), (lat2, lon2));
        Some(if distance <= self.near {
            1.0
        } else if distance >= self.far {
            0.0
        } else {
            1.0 - (distance - self.near) / (self.far - self.near)
        })
    }

    fn missing(&self) -> Option<f64> {
        self.missing
    }
}

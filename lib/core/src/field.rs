//! Field-level comparison of record pairs.
//!
//! A field comparator extracts one or more values from each record of a
//! pair, encodes them, and hands them to a similarity primitive. Missing
//! values (empty or unobtainable by a derived accessor) never become zero
//! scores; the primitive decides its own missing result.

use std::fmt;
use std::sync::Arc;

use crate::record::Record;
use crate::{Error, Result};

/// A similarity primitive over encoded field values.
///
/// `compare` returns `None` when the values are not comparable; `missing`
/// is the primitive's result when either side of the pair has no value at
/// all. Primitives must be pure: equal inputs give equal outputs.
pub trait Similarity: Send + Sync {
    fn compare(&self, a: &str, b: &str) -> Option<f64>;

    /// Result when either value is missing. Defaults to "not comparable".
    fn missing(&self) -> Option<f64> {
        None
    }
}

impl<F> Similarity for F
where
    F: Fn(&str, &str) -> Option<f64> + Send + Sync,
{
    fn compare(&self, a: &str, b: &str) -> Option<f64> {
        self(a, b)
    }
}

/// Normalizes a field value before comparison. Must be pure.
pub type Encoder = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Which record of a pair a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Closed set of accessor kinds for a single-valued field.
#[derive(Clone)]
pub enum FieldSpec {
    /// Positional column index.
    Position(usize),
    /// Named column, resolved through the record schema.
    Name(String),
    /// Derived function of the whole record; `None` means missing.
    Derived(Arc<dyn Fn(&Record) -> Option<String> + Send + Sync>),
}

impl FieldSpec {
    /// Extract the field value. Unresolvable positions or names are
    /// errors; a present-but-empty value is `Ok(None)` (missing).
    pub fn extract(&self, record: &Record) -> Result<Option<String>> {
        let value = match self {
            FieldSpec::Position(position) => record
                .get(*position)
                .ok_or_else(|| Error::FieldOutOfRange {
                    position: *position,
                    id: record.id().to_string(),
                })?
                .to_string(),
            FieldSpec::Name(name) => {
                let position = record
                    .schema()
                    .position(name)
                    .ok_or_else(|| Error::UnknownField(name.clone()))?;
                record
                    .get(position)
                    .ok_or_else(|| Error::FieldOutOfRange {
                        position,
                        id: record.id().to_string(),
                    })?
                    .to_string()
            }
            FieldSpec::Derived(derive) => {
                return Ok(derive(record).filter(|v| !v.is_empty()));
            }
        };
        Ok(Some(value).filter(|v| !v.is_empty()))
    }

    /// Raw value for diagnostics; missing renders as the empty string.
    pub fn extract_raw(&self, record: &Record) -> Result<String> {
        Ok(self.extract(record)?.unwrap_or_default())
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSpec::Position(i) => write!(f, "Position({i})"),
            FieldSpec::Name(n) => write!(f, "Name({n:?})"),
            FieldSpec::Derived(_) => write!(f, "Derived(..)"),
        }
    }
}

/// Accessor for a set-valued field.
#[derive(Clone)]
pub enum SetSpec {
    /// One delimited column split into values.
    Split { field: FieldSpec, separator: char },
    /// Several single-valued columns combined into one value set.
    Combine(Vec<FieldSpec>),
    /// Derived function of the whole record.
    Derived(Arc<dyn Fn(&Record) -> Vec<String> + Send + Sync>),
}

impl SetSpec {
    /// Extract the value set, trimmed, with empty values dropped. An empty
    /// result set means the field is missing on this record.
    pub fn extract(&self, record: &Record) -> Result<Vec<String>> {
        let values = match self {
            SetSpec::Split { field, separator } => field
                .extract(record)?
                .map(|value| {
                    value
                        .split(*separator)
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            SetSpec::Combine(fields) => {
                let mut values = Vec::with_capacity(fields.len());
                for field in fields {
                    if let Some(value) = field.extract(record)? {
                        let value = value.trim();
                        if !value.is_empty() {
                            values.push(value.to_string());
                        }
                    }
                }
                values
            }
            SetSpec::Derived(derive) => derive(record)
                .into_iter()
                .filter(|v| !v.is_empty())
                .collect(),
        };
        Ok(values)
    }
}

/// Compares one (possibly set-valued) field of a record pair and exposes
/// the raw values for diagnostic export.
pub trait FieldCompare: Send + Sync {
    fn compare(&self, left: &Record, right: &Record) -> Result<Option<f64>>;

    /// Raw pre-similarity value(s), for export inspection.
    fn raw(&self, record: &Record, side: Side) -> Result<String>;
}

fn encode(encoder: &Option<Encoder>, value: String) -> String {
    match encoder {
        Some(encode) => encode(&value),
        None => value,
    }
}

/// Single-valued field comparison: extract, encode, compare.
///
/// Left and right may use different accessors and encoders, for linking
/// datasets whose schemas differ.
pub struct ValueSim {
    field_left: FieldSpec,
    field_right: FieldSpec,
    encode_left: Option<Encoder>,
    encode_right: Option<Encoder>,
    sim: Arc<dyn Similarity>,
}

impl ValueSim {
    #[must_use]
    pub fn new(field: FieldSpec, encoder: Option<Encoder>, sim: Arc<dyn Similarity>) -> Self {
        Self {
            field_left: field.clone(),
            field_right: field,
            encode_left: encoder.clone(),
            encode_right: encoder,
            sim,
        }
    }

    #[must_use]
    pub fn asymmetric(
        field_left: FieldSpec,
        encode_left: Option<Encoder>,
        field_right: FieldSpec,
        encode_right: Option<Encoder>,
        sim: Arc<dyn Similarity>,
    ) -> Self {
        Self {
            field_left,
            field_right,
            encode_left,
            encode_right,
            sim,
        }
    }
}

impl FieldCompare for ValueSim {
    fn compare(&self, left: &Record, right: &Record) -> Result<Option<f64>> {
        let a = self.field_left.extract(left)?;
        let b = self.field_right.extract(right)?;
        Ok(match (a, b) {
            (Some(a), Some(b)) => {
                let a = encode(&self.encode_left, a);
                let b = encode(&self.encode_right, b);
                self.sim.compare(&a, &b)
            }
            _ => self.sim.missing(),
        })
    }

    fn raw(&self, record: &Record, side: Side) -> Result<String> {
        match side {
            Side::Left => self.field_left.extract_raw(record),
            Side::Right => self.field_right.extract_raw(record),
        }
    }
}

/// How a set-valued comparison folds element scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetAggregate {
    /// For each element of the smaller set, take its best score against
    /// the larger set, and average. A subset scores 1.0 against its
    /// superset under an exact primitive.
    Average,
    /// Best score over the whole cross product.
    Maximum,
}

/// Set-valued field comparison. Either set empty means the primitive's own
/// missing result, the same semantics single-valued fields use.
pub struct SetSim {
    set_left: SetSpec,
    set_right: SetSpec,
    encode_left: Option<Encoder>,
    encode_right: Option<Encoder>,
    sim: Arc<dyn Similarity>,
    aggregate: SetAggregate,
}

impl SetSim {
    #[must_use]
    pub fn new(
        set: SetSpec,
        encoder: Option<Encoder>,
        sim: Arc<dyn Similarity>,
        aggregate: SetAggregate,
    ) -> Self {
        Self {
            set_left: set.clone(),
            set_right: set,
            encode_left: encoder.clone(),
            encode_right: encoder,
            sim,
            aggregate,
        }
    }

    #[must_use]
    pub fn asymmetric(
        set_left: SetSpec,
        encode_left: Option<Encoder>,
        set_right: SetSpec,
        encode_right: Option<Encoder>,
        sim: Arc<dyn Similarity>,
        aggregate: SetAggregate,
    ) -> Self {
        Self {
            set_left,
            set_right,
            encode_left,
            encode_right,
            sim,
            aggregate,
        }
    }

    fn value_set(
        &self,
        spec: &SetSpec,
        encoder: &Option<Encoder>,
        record: &Record,
    ) -> Result<Vec<String>> {
        let mut values: Vec<String> = spec
            .extract(record)?
            .into_iter()
            .map(|v| encode(encoder, v))
            .collect();
        values.sort();
        values.dedup();
        Ok(values)
    }

    fn best(&self, value: &str, against: &[String]) -> f64 {
        let mut best = 0.0f64;
        for other in against {
            if let Some(score) = self.sim.compare(value, other) {
                best = best.max(score);
            }
        }
        best
    }
}

impl FieldCompare for SetSim {
    fn compare(&self, left: &Record, right: &Record) -> Result<Option<f64>> {
        let a = self.value_set(&self.set_left, &self.encode_left, left)?;
        let b = self.value_set(&self.set_right, &self.encode_right, right)?;
        let (small, large) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
        if small.is_empty() || large.is_empty() {
            return Ok(self.sim.missing());
        }
        Ok(Some(match self.aggregate {
            SetAggregate::Average => {
                let total: f64 = small.iter().map(|v| self.best(v, large)).sum();
                total / small.len() as f64
            }
            SetAggregate::Maximum => small
                .iter()
                .map(|v| self.best(v, large))
                .fold(0.0f64, f64::max),
        }))
    }

    fn raw(&self, record: &Record, side: Side) -> Result<String> {
        let spec = match side {
            Side::Left => &self.set_left,
            Side::Right => &self.set_right,
        };
        Ok(spec.extract(record)?.join(";"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordSchema;

    fn schema() -> Arc<RecordSchema> {
        Arc::new(RecordSchema::new(["id", "num", "tags"]).unwrap())
    }

    fn record(values: [&str; 3]) -> Record {
        Record::new(schema(), values).unwrap()
    }

    /// Exponential similarity of numbers: 2^-|a-b|.
    fn numeric_sim() -> Arc<dyn Similarity> {
        Arc::new(|a: &str, b: &str| {
            let a: f64 = a.parse().ok()?;
            let b: f64 = b.parse().ok()?;
            Some(2.0f64.powf(-(a - b).abs()))
        })
    }

    fn exact_sim() -> Arc<dyn Similarity> {
        Arc::new(|a: &str, b: &str| Some(if a == b { 1.0 } else { 0.0 }))
    }

    #[test]
    fn test_value_sim_applies_encoder() {
        let upper: Encoder = Arc::new(|v: &str| v.to_uppercase());
        let comparator = ValueSim::new(FieldSpec::Position(2), Some(upper), exact_sim());
        let a = record(["1", "1", "red"]);
        let b = record(["2", "2", "RED"]);
        assert_eq!(comparator.compare(&a, &b).unwrap(), Some(1.0));
    }

    #[test]
    fn test_value_sim_numeric() {
        let comparator = ValueSim::new(FieldSpec::Name("num".to_string()), None, numeric_sim());
        let a = record(["1", "1", ""]);
        let b = record(["2", "2", ""]);
        let score = comparator.compare(&a, &b).unwrap().unwrap();
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_value_sim_missing_value() {
        let comparator = ValueSim::new(FieldSpec::Position(2), None, exact_sim());
        let a = record(["1", "1", ""]);
        let b = record(["2", "2", "red"]);
        assert_eq!(comparator.compare(&a, &b).unwrap(), None);
    }

    #[test]
    fn test_unknown_field_propagates() {
        let comparator = ValueSim::new(FieldSpec::Name("color".to_string()), None, exact_sim());
        let a = record(["1", "1", "red"]);
        let err = comparator.compare(&a, &a).unwrap_err();
        assert!(matches!(err, Error::UnknownField(name) if name == "color"));
    }

    #[test]
    fn test_position_out_of_range_propagates() {
        let comparator = ValueSim::new(FieldSpec::Position(9), None, exact_sim());
        let a = record(["1", "1", "red"]);
        assert!(matches!(
            comparator.compare(&a, &a).unwrap_err(),
            Error::FieldOutOfRange { position: 9, .. }
        ));
    }

    #[test]
    fn test_set_average_subset_scores_one() {
        let spec = SetSpec::Split {
            field: FieldSpec::Position(2),
            separator: ';',
        };
        let comparator = SetSim::new(spec, None, exact_sim(), SetAggregate::Average);
        let a = record(["1", "1", "red;blue"]);
        let b = record(["2", "2", "red"]);
        // B's single tag finds a perfect partner among A's tags.
        assert_eq!(comparator.compare(&a, &b).unwrap(), Some(1.0));
    }

    #[test]
    fn test_set_average_best_match() {
        let spec = SetSpec::Split {
            field: FieldSpec::Position(2),
            separator: ';',
        };
        let comparator = SetSim::new(spec, None, numeric_sim(), SetAggregate::Average);
        let a = record(["1", "", "0;1"]);
        let b = record(["2", "", "1;2"]);
        // 0 -> best 0.5 against {1,2}; 1 -> best 1.0; average 0.75.
        let score = comparator.compare(&a, &b).unwrap().unwrap();
        assert!((score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_set_maximum() {
        let spec = SetSpec::Split {
            field: FieldSpec::Position(2),
            separator: ';',
        };
        let comparator = SetSim::new(spec, None, numeric_sim(), SetAggregate::Maximum);
        let a = record(["1", "", "0;1;2"]);
        let b = record(["2", "", "3;4;5"]);
        let score = comparator.compare(&a, &b).unwrap().unwrap();
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_set_empty_means_missing() {
        let spec = SetSpec::Split {
            field: FieldSpec::Position(2),
            separator: ';',
        };
        let comparator = SetSim::new(spec, None, exact_sim(), SetAggregate::Average);
        let a = record(["1", "1", ""]);
        let b = record(["2", "2", "red"]);
        assert_eq!(comparator.compare(&a, &b).unwrap(), None);
    }

    #[test]
    fn test_combine_fields() {
        let spec = SetSpec::Combine(vec![FieldSpec::Position(1), FieldSpec::Position(2)]);
        let values = spec.extract(&record(["1", "x", " y "])).unwrap();
        assert_eq!(values, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_derived_spec() {
        let spec = FieldSpec::Derived(Arc::new(|record: &Record| {
            Some(format!("{}-{}", record.get(1)?, record.get(2)?))
        }));
        let value = spec.extract(&record(["1", "a", "b"])).unwrap();
        assert_eq!(value, Some("a-b".to_string()));
    }
}

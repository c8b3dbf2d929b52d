use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ahash::AHashMap;

use crate::{Error, Result};

/// Column layout shared by every record of one input.
///
/// Built once per dataset (usually from a CSV header row) and referenced by
/// each [`Record`] through an `Arc`, so named field lookup is a single hash
/// probe rather than a per-record scan.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    fields: Vec<String>,
    positions: AHashMap<String, usize>,
}

impl RecordSchema {
    /// Build a schema from ordered field names. The first field is the
    /// record identifier. Names must be non-empty and unique.
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(Error::InvalidConfig("schema has no fields".to_string()));
        }
        let mut positions = AHashMap::with_capacity(fields.len());
        for (i, name) in fields.iter().enumerate() {
            if name.is_empty() {
                return Err(Error::InvalidConfig(format!("empty field name at position {i}")));
            }
            if positions.insert(name.clone(), i).is_some() {
                return Err(Error::InvalidConfig(format!("duplicate field name: {name}")));
            }
        }
        Ok(Self { fields, positions })
    }

    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[inline]
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// An immutable, cheaply cloneable data row.
///
/// The first value is a unique identifier; ordering, equality and hashing go
/// over the full value tuple, so the identifier decides the total order and
/// canonical pair direction.
#[derive(Clone)]
pub struct Record {
    schema: Arc<RecordSchema>,
    values: Arc<[String]>,
}

impl Record {
    /// Create a record over `schema`. Fails if the value count does not
    /// match the schema arity.
    pub fn new<I, S>(schema: Arc<RecordSchema>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.len() != schema.len() {
            return Err(Error::FieldCount {
                id: values.first().cloned().unwrap_or_default(),
                expected: schema.len(),
                actual: values.len(),
            });
        }
        Ok(Self {
            schema,
            values: values.into(),
        })
    }

    /// The unique identifier (first field).
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.values[0]
    }

    #[inline]
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&str> {
        self.values.get(position).map(String::as_str)
    }

    #[inline]
    #[must_use]
    pub fn get_named(&self, name: &str) -> Option<&str> {
        self.schema.position(name).and_then(|i| self.get(i))
    }

    #[inline]
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.hash(state);
    }
}

impl PartialOrd for Record {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Record {
    fn cmp(&self, other: &Self) -> Ordering {
        self.values.cmp(&other.values)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Record").field(&self.values).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Arc<RecordSchema> {
        Arc::new(RecordSchema::new(["id", "name", "age"]).unwrap())
    }

    #[test]
    fn test_named_lookup() {
        let rec = Record::new(schema(), ["1", "Jon", "30"]).unwrap();
        assert_eq!(rec.id(), "1");
        assert_eq!(rec.get_named("name"), Some("Jon"));
        assert_eq!(rec.get(2), Some("30"));
        assert_eq!(rec.get(3), None);
        assert_eq!(rec.get_named("missing"), None);
    }

    #[test]
    fn test_arity_mismatch() {
        let err = Record::new(schema(), ["1", "Jon"]).unwrap_err();
        assert!(matches!(err, Error::FieldCount { expected: 3, actual: 2, .. }));
    }

    #[test]
    fn test_ordering_by_identifier() {
        let a = Record::new(schema(), ["1", "Jon", "30"]).unwrap();
        let b = Record::new(schema(), ["2", "Amy", "25"]).unwrap();
        assert!(a < b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_rejects_duplicate_field_names() {
        assert!(RecordSchema::new(["id", "name", "name"]).is_err());
        assert!(RecordSchema::new(Vec::<String>::new()).is_err());
    }
}

//! TOML job configuration: blocking strategies, field comparators and the
//! classifier, wired into engine types against a concrete record schema.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

use dedupx_core::{
    distance, rulebased, Comparisons, Encoder, FieldCompare, FieldSpec, Indices, KMeans, Key,
    KeyFn, Record, RecordComparator, RecordPair, RecordSchema, SetAggregate, SetSim, SetSpec,
    Similarity, SimilarityVector, ValueSim, Verdict,
};
use dedupx_similarity::{encode, geo, DamerauLevenshtein, Exact, GeoSimilarity, Jaccard, Trigram};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    #[serde(rename = "index")]
    pub indexes: Vec<IndexConfig>,
    #[serde(rename = "comparator")]
    pub comparators: Vec<ComparatorConfig>,
    pub classifier: ClassifierConfig,
}

/// One blocking index: a column, an optional encoder chain and an optional
/// prefix length. Records whose key value is empty land in no bucket.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    pub name: String,
    pub field: String,
    #[serde(default)]
    pub encode: Vec<String>,
    #[serde(default)]
    pub prefix: Option<usize>,
}

/// One similarity-vector component.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComparatorConfig {
    pub name: String,
    pub metric: Metric,
    /// Source column; not used by the geo metric.
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub encode: Vec<String>,
    /// Damerau-Levenshtein difference threshold.
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Score to report when either value is missing.
    #[serde(default)]
    pub missing: Option<f64>,
    /// Geo: distance in km below which similarity is 1.0.
    #[serde(default)]
    pub near: Option<f64>,
    /// Geo: distance in km above which similarity is 0.0.
    #[serde(default)]
    pub far: Option<f64>,
    /// Geo: latitude and longitude columns.
    #[serde(default)]
    pub lat: Option<String>,
    #[serde(default)]
    pub lon: Option<String>,
    /// Treat the column as multi-valued, split on this separator.
    #[serde(default)]
    pub split: Option<char>,
    #[serde(default)]
    pub aggregate: Option<AggregateConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Damerau,
    Exact,
    Jaccard,
    Trigram,
    Geo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateConfig {
    Average,
    Maximum,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum ClassifierConfig {
    Kmeans {
        #[serde(default = "default_max_iterations")]
        max_iterations: usize,
        #[serde(default)]
        sample: Option<f64>,
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Threshold rule over the mean of the present vector components.
    Rule {
        match_above: f64,
        nonmatch_below: f64,
    },
}

fn default_max_iterations() -> usize {
    10
}

impl JobConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: JobConfig =
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        if config.indexes.is_empty() {
            bail!("{}: no [[index]] entries", path.display());
        }
        if config.comparators.is_empty() {
            bail!("{}: no [[comparator]] entries", path.display());
        }
        Ok(config)
    }

    /// Build the blocking strategy against a concrete schema, resolving
    /// column names early so typos fail before any data is indexed.
    pub fn build_indices(&self, schema: &RecordSchema) -> Result<Indices> {
        let mut strategy = Vec::with_capacity(self.indexes.len());
        for index in &self.indexes {
            let position = schema.position(&index.field).with_context(|| {
                format!("index {}: unknown field {}", index.name, index.field)
            })?;
            let encoder = encoder_chain(&index.encode)
                .with_context(|| format!("index {}", index.name))?;
            let prefix = index.prefix;
            let key_fn: KeyFn = Arc::new(move |record: &Record| {
                let Some(value) = record.get(position) else {
                    return Vec::new();
                };
                let mut value = match &encoder {
                    Some(encode) => encode(value),
                    None => value.to_string(),
                };
                if let Some(length) = prefix {
                    value = value.chars().take(length).collect();
                }
                if value.is_empty() {
                    Vec::new()
                } else {
                    vec![Key::Text(value)]
                }
            });
            strategy.push((index.name.clone(), key_fn));
        }
        Ok(Indices::from_strategy(strategy))
    }

    pub fn build_comparator(&self, schema: &RecordSchema) -> Result<RecordComparator> {
        let mut fields: Vec<(String, Box<dyn FieldCompare>)> =
            Vec::with_capacity(self.comparators.len());
        for comparator in &self.comparators {
            let field = build_field(comparator, schema)
                .with_context(|| format!("comparator {}", comparator.name))?;
            fields.push((comparator.name.clone(), field));
        }
        RecordComparator::new(fields).context("building record comparator")
    }
}

impl ClassifierConfig {
    /// Run the configured classifier, returning match and non-match score
    /// maps.
    pub fn classify(
        &self,
        comparisons: &Comparisons,
    ) -> Result<(HashMap<RecordPair, f64>, HashMap<RecordPair, f64>)> {
        match self {
            ClassifierConfig::Kmeans {
                max_iterations,
                sample,
                seed,
            } => {
                let mut kmeans = KMeans::new().with_max_iterations(*max_iterations);
                if let Some(fraction) = sample {
                    kmeans = kmeans.with_sample(*fraction);
                }
                if let Some(seed) = seed {
                    kmeans = kmeans.with_seed(*seed);
                }
                let result = kmeans.classify(comparisons, distance::l2)?;
                info!(
                    "k-means finished after {} iterations (converged: {})",
                    result.iterations, result.converged
                );
                Ok((result.matches, result.nonmatches))
            }
            ClassifierConfig::Rule {
                match_above,
                nonmatch_below,
            } => {
                let (match_above, nonmatch_below) = (*match_above, *nonmatch_below);
                if nonmatch_below > match_above {
                    bail!(
                        "rule classifier: nonmatch_below {nonmatch_below} exceeds match_above {match_above}"
                    );
                }
                let rule = move |vector: &SimilarityVector| -> dedupx_core::Result<Verdict> {
                    let present: Vec<f64> =
                        vector.components().iter().flatten().copied().collect();
                    if present.is_empty() {
                        return Ok(Verdict::Uncertain);
                    }
                    let mean = present.iter().sum::<f64>() / present.len() as f64;
                    Ok(if mean >= match_above {
                        Verdict::Match
                    } else if mean <= nonmatch_below {
                        Verdict::NonMatch
                    } else {
                        Verdict::Uncertain
                    })
                };
                Ok(rulebased::classify_scores(comparisons, rule)?)
            }
        }
    }
}

fn encoder_chain(names: &[String]) -> Result<Option<Encoder>> {
    if names.is_empty() {
        return Ok(None);
    }
    let mut encoders = Vec::with_capacity(names.len());
    for name in names {
        let encoder =
            encode::by_name(name).with_context(|| format!("unknown encoder: {name}"))?;
        encoders.push(encoder);
    }
    Ok(Some(encode::chain(encoders)))
}

fn build_similarity(config: &ComparatorConfig) -> Result<Arc<dyn Similarity>> {
    Ok(match config.metric {
        Metric::Damerau => {
            let mut sim = DamerauLevenshtein::new(config.threshold.unwrap_or(1.0));
            if let Some(missing) = config.missing {
                sim = sim.with_missing(missing);
            }
            Arc::new(sim)
        }
        Metric::Exact => {
            let mut sim = Exact::new();
            if let Some(missing) = config.missing {
                sim = sim.with_missing(missing);
            }
            Arc::new(sim)
        }
        Metric::Jaccard => {
            let mut sim = Jaccard::new();
            if let Some(missing) = config.missing {
                sim = sim.with_missing(missing);
            }
            Arc::new(sim)
        }
        Metric::Trigram => {
            let mut sim = Trigram::new();
            if let Some(missing) = config.missing {
                sim = sim.with_missing(missing);
            }
            Arc::new(sim)
        }
        Metric::Geo => {
            let near = config.near.unwrap_or(0.0);
            let far = config.far.unwrap_or(3.0);
            if far <= near {
                bail!("geo metric: far ({far} km) must exceed near ({near} km)");
            }
            let mut sim = GeoSimilarity::new(near, far);
            if let Some(missing) = config.missing {
                sim = sim.with_missing(missing);
            }
            Arc::new(sim)
        }
    })
}

fn build_field(
    config: &ComparatorConfig,
    schema: &RecordSchema,
) -> Result<Box<dyn FieldCompare>> {
    let sim = build_similarity(config)?;

    if config.metric == Metric::Geo {
        let lat = config.lat.as_deref().context("geo metric needs a lat column")?;
        let lon = config.lon.as_deref().context("geo metric needs a lon column")?;
        let lat_position = schema
            .position(lat)
            .with_context(|| format!("unknown field {lat}"))?;
        let lon_position = schema
            .position(lon)
            .with_context(|| format!("unknown field {lon}"))?;
        return Ok(Box::new(ValueSim::new(
            geo::coordinate_spec(lat_position, lon_position),
            None,
            sim,
        )));
    }

    let field = config.field.as_deref().context("missing field")?;
    let position = schema
        .position(field)
        .with_context(|| format!("unknown field {field}"))?;
    let encoder = encoder_chain(&config.encode)?;
    let spec = FieldSpec::Position(position);

    Ok(match config.split {
        Some(separator) => {
            let aggregate = match config.aggregate {
                Some(AggregateConfig::Maximum) => SetAggregate::Maximum,
                _ => SetAggregate::Average,
            };
            Box::new(SetSim::new(
                SetSpec::Split { field: spec, separator },
                encoder,
                sim,
                aggregate,
            ))
        }
        None => Box::new(ValueSim::new(spec, encoder, sim)),
    })
}

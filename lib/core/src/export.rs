//! CSV diagnostic export.
//!
//! Writes compared pairs with the index keys of both records, whether each
//! index matched, the raw (pre-similarity) field values, and the vector
//! components. Inspection of this output is how blocking and comparator
//! configurations get tuned; it is not needed for correctness.

use std::collections::HashMap;
use std::io::Write;

use crate::compare::{Comparisons, RecordComparator, RecordPair};
use crate::field::Side;
use crate::index::{Index, Indices, Key};
use crate::record::Record;
use crate::Result;

fn join_keys(keys: &[Key]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

fn format_score(score: Option<f64>) -> String {
    score.map(|s| s.to_string()).unwrap_or_default()
}

/// Write every scored pair as three rows: the left record's keys and raw
/// values, the right record's, then the classifier score, a per-index
/// key-match flag, and the similarity components. The header row carries
/// the index names followed by the comparator names.
///
/// Without `scores`, all cached pairs are written with a blank score. For
/// self-linkage pass `None` as `right`.
pub fn write_comparisons<W: Write>(
    writer: W,
    comparator: &RecordComparator,
    comparisons: &Comparisons,
    scores: Option<&HashMap<RecordPair, f64>>,
    left: &Indices,
    right: Option<&Indices>,
) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);

    let mut header = vec!["score".to_string()];
    header.extend(left.names().map(str::to_string));
    header.extend(comparator.fields().map(|(name, _)| name.to_string()));
    out.write_record(&header)?;

    let right_indices = right.unwrap_or(left);
    let mut rows: Vec<(&RecordPair, Option<f64>)> = match scores {
        Some(map) => map.iter().map(|(pair, score)| (pair, Some(*score))).collect(),
        None => comparisons.pairs().map(|pair| (pair, None)).collect(),
    };
    rows.sort_by(|a, b| a.0.cmp(b.0));

    for (pair, score) in rows {
        let Some(vector) = comparisons.get(pair) else {
            continue;
        };
        let left_keys: Vec<Vec<Key>> = left
            .iter()
            .map(|(_, index)| index.keys_for(pair.left()))
            .collect();
        let right_keys: Vec<Vec<Key>> = right_indices
            .iter()
            .map(|(_, index)| index.keys_for(pair.right()))
            .collect();

        let mut row = vec![String::new()];
        row.extend(left_keys.iter().map(|keys| join_keys(keys)));
        for (_, field) in comparator.fields() {
            row.push(field.raw(pair.left(), Side::Left)?);
        }
        out.write_record(&row)?;

        let mut row = vec![String::new()];
        row.extend(right_keys.iter().map(|keys| join_keys(keys)));
        for (_, field) in comparator.fields() {
            row.push(field.raw(pair.right(), Side::Right)?);
        }
        out.write_record(&row)?;

        let mut row = vec![format_score(score)];
        row.extend(left_keys.iter().zip(&right_keys).map(|(ours, theirs)| {
            let shared = ours.iter().any(|key| theirs.contains(key));
            shared.to_string()
        }));
        row.extend(vector.components().iter().map(|c| format_score(*c)));
        out.write_record(&row)?;
    }
    out.flush()?;
    Ok(())
}

/// One row per index: bucket count, record slots, largest bucket and mean
/// bucket size.
pub fn write_index_stats<W: Write>(writer: W, indices: &Indices) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["index", "blocks", "records", "largest_block", "mean_block"])?;
    for (name, stats) in indices.stats() {
        out.write_record(&[
            name,
            stats.blocks.to_string(),
            stats.records.to_string(),
            stats.largest.to_string(),
            format!("{:.2}", stats.mean),
        ])?;
    }
    out.flush()?;
    Ok(())
}

/// Bucket dump of one index: a row per (key, record), key first.
pub fn write_index<W: Write>(writer: W, index: &Index) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    let mut entries: Vec<(&Key, &[Record])> = index.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    for (key, bucket) in entries {
        let mut records: Vec<&Record> = bucket.iter().collect();
        records.sort();
        for record in records {
            let mut row = vec![key.to_string()];
            row.extend(record.values().iter().cloned());
            out.write_record(&row)?;
        }
    }
    out.flush()?;
    Ok(())
}

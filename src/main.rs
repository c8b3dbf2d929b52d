mod config;

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::JobConfig;
use dedupx_core::{export, Indices, Record, RecordSchema};

/// A fast record linkage and deduplication engine
#[derive(Parser, Debug)]
#[command(name = "dedupx")]
#[command(about = "Deduplicate a CSV file, or link it against a master file", long_about = None)]
struct Args {
    /// Path to the job configuration (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// CSV file of input records; the first column is the record id
    #[arg(short, long)]
    input: PathBuf,

    /// Optional CSV file of master records to link against
    #[arg(short, long)]
    master: Option<PathBuf>,

    /// Directory for result and diagnostic files
    #[arg(short, long, default_value = "./out")]
    output: PathBuf,

    /// Compare candidate pairs on the rayon thread pool
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn read_records(path: &Path) -> Result<(Arc<RecordSchema>, Vec<Record>)> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let schema = Arc::new(
        RecordSchema::new(headers).with_context(|| format!("header of {}", path.display()))?,
    );
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.with_context(|| format!("reading {}", path.display()))?;
        records.push(Record::new(schema.clone(), row.iter())?);
    }
    Ok((schema, records))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting dedupx v{}", env!("CARGO_PKG_VERSION"));

    let job = JobConfig::load(&args.config)?;
    let (schema, records) = read_records(&args.input)?;
    info!("Loaded {} records from {}", records.len(), args.input.display());

    let comparator = job.build_comparator(&schema)?;
    let mut indices = job.build_indices(&schema)?;
    indices.insert_all(&records)?;

    let mut master_indices: Option<Indices> = None;
    let comparisons = match &args.master {
        Some(path) => {
            let (master_schema, master_records) = read_records(path)?;
            if schema.fields() != master_schema.fields() {
                bail!(
                    "input and master files have different columns: {:?} vs {:?}",
                    schema.fields(),
                    master_schema.fields()
                );
            }
            info!("Loaded {} master records from {}", master_records.len(), path.display());
            let mut master = indices.clone_strategy();
            master.insert_all(&master_records)?;
            indices.log_stats();
            master.log_stats();
            info!(
                "Linkage may require up to {} comparisons",
                indices.count_comparisons(Some(&master))
            );
            let comparisons = if args.parallel {
                comparator.par_link(&indices, &master)?
            } else {
                comparator.link(&indices, &master)?
            };
            master_indices = Some(master);
            comparisons
        }
        None => {
            indices.log_stats();
            info!(
                "Dedupe may require up to {} comparisons",
                indices.count_comparisons(None)
            );
            if args.parallel {
                comparator.par_dedupe(&indices)?
            } else {
                comparator.dedupe(&indices)?
            }
        }
    };
    info!("Compared {} record pairs", comparisons.len());

    let (matches, nonmatches) = job.classifier.classify(&comparisons)?;
    info!(
        "Classified {} matches, {} non-matches",
        matches.len(),
        nonmatches.len()
    );

    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let file = File::create(args.output.join("matches.csv"))?;
    export::write_comparisons(
        file,
        &comparator,
        &comparisons,
        Some(&matches),
        &indices,
        master_indices.as_ref(),
    )?;

    let file = File::create(args.output.join("nonmatches.csv"))?;
    export::write_comparisons(
        file,
        &comparator,
        &comparisons,
        Some(&nonmatches),
        &indices,
        master_indices.as_ref(),
    )?;

    let file = File::create(args.output.join("index-stats.csv"))?;
    export::write_index_stats(file, &indices)?;

    for (name, index) in indices.iter() {
        let file = File::create(args.output.join(format!("index-{name}.csv")))?;
        export::write_index(file, index)?;
    }

    info!("Results written to {}", args.output.display());
    Ok(())
}

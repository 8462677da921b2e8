//! Natlog CLI - Command Line Interface
//!
//! Command-line tool for creating, inspecting, querying, and exporting
//! natlog stores.
//!
//! Key Features:
//! - Series creation and listing
//! - Point append and paged reads
//! - Resampled and continuous queries
//! - JSON snapshot export and import
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use natlog_common::utils::format_size;
use natlog_common::{NatlogConfig, NatlogError, Result, Sequence};
use natlog_timeseries::{export, Database, PointValue, RawValue, SeriesConfig, Value};
use serde_json::json;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

// =============================================================================
// CLI Arguments
// =============================================================================

#[derive(Parser)]
#[command(name = "natlog")]
#[command(author = "AutomataNexus Development Team")]
#[command(version = "0.1.0")]
#[command(about = "Natural Log time series store", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use a file store in this directory, overriding the configuration
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all series
    List,
    /// Show storage statistics
    Stats,
    /// Create a series
    Create {
        name: String,
        /// Datatype, e.g. int32, float64[3], blob:image/png
        #[arg(short = 't', long = "type")]
        datatype: String,
        #[arg(short, long, default_value = "closest")]
        reduction: String,
        #[arg(short, long, default_value = "previous")]
        interpolation: String,
        #[arg(long, default_value = "")]
        unit: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Show a series' configuration and points
    Show {
        name: String,
        /// First sequence to show; only the latest point when omitted
        #[arg(short, long)]
        offset: Option<u64>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Append a point; the value is JSON
    Append {
        name: String,
        value: String,
        /// RFC 3339 timestamp, defaults to now
        #[arg(short, long)]
        time: Option<String>,
    },
    /// Resample series over a time window
    Query {
        /// Selectors: name[:reduction[:interpolation]]
        #[arg(required = true)]
        selectors: Vec<String>,
        #[arg(long)]
        first: String,
        #[arg(long)]
        last: String,
        #[arg(short, long, default_value = "100")]
        npoints: usize,
    },
    /// Resample series from a start time and keep following new bins
    Watch {
        #[arg(required = true)]
        selectors: Vec<String>,
        #[arg(long)]
        first: String,
        #[arg(short, long, default_value = "100")]
        npoints: usize,
    },
    /// Export the whole store as JSON
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Import a JSON export into the store
    Import {
        #[arg(short, long)]
        input: PathBuf,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("natlog: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("natlog: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<NatlogConfig> {
    let mut config = match &cli.config {
        Some(path) => NatlogConfig::from_file(path)?,
        None => NatlogConfig::development(),
    };
    if let Some(dir) = &cli.data_dir {
        config.storage = NatlogConfig::persistent(dir).storage;
    }
    Ok(config)
}

async fn run(command: Commands, config: &NatlogConfig) -> Result<()> {
    let db = Database::open(config)?;

    match command {
        Commands::List => {
            let mut names = db.list_series();
            names.sort();
            for name in names {
                println!("{}", name);
            }
        }
        Commands::Stats => {
            let stats = db.stats();
            println!("series:  {}", db.list_series().len());
            println!("points:  {}", stats.total_records);
            println!("stored:  {}", format_size(stats.total_bytes));
        }
        Commands::Create {
            name,
            datatype,
            reduction,
            interpolation,
            unit,
            description,
        } => {
            db.create_series(
                SeriesConfig::new(name, datatype, reduction, interpolation)
                    .with_unit(unit)
                    .with_description(description),
            )?;
        }
        Commands::Show {
            name,
            offset,
            limit,
        } => {
            let config = db
                .get_series_config(&name)
                .ok_or_else(|| NatlogError::SeriesNotFound(name.clone()))?;
            let page = db.read_points(&name, offset.map(Sequence), limit)?;

            let points = page
                .timestamps
                .iter()
                .zip(&page.values)
                .map(|(time, value)| Ok(json!([time.to_rfc3339(), describe(value)?])))
                .collect::<Result<Vec<_>>>()?;
            print_json(&json!({
                "config": config,
                "points": points,
                "next": page.next.map(|s| s.0),
            }))?;
        }
        Commands::Append { name, value, time } => {
            let time = match time {
                Some(time) => parse_time(&time)?,
                None => Utc::now(),
            };
            let value: serde_json::Value = serde_json::from_str(&value)?;
            let sequence = db.append_point(&name, time, RawValue::try_from(value)?)?;
            db.sync()?;
            println!("{}", sequence);
        }
        Commands::Query {
            selectors,
            first,
            last,
            npoints,
        } => {
            let result = db.query(&selectors, parse_time(&first)?, parse_time(&last)?, npoints)?;
            let times: Vec<String> = result.centers.iter().map(|t| t.to_rfc3339()).collect();
            let columns: Vec<Vec<serde_json::Value>> =
                result.columns.iter().map(|c| column_json(c)).collect();
            print_json(&json!({ "times": times, "values": columns }))?;
        }
        Commands::Watch {
            selectors,
            first,
            npoints,
        } => {
            let (initial, mut stream) = db
                .query_continuous(&selectors, parse_time(&first)?, npoints)
                .await?;
            for (i, center) in initial.centers.iter().enumerate() {
                let row: Vec<Option<Value>> =
                    initial.columns.iter().map(|c| c[i].clone()).collect();
                print_row(*center, &row)?;
            }

            loop {
                tokio::select! {
                    bin = stream.next() => match bin {
                        Some(bin) => {
                            let bin = bin?;
                            print_row(bin.center, &bin.values)?;
                        }
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            stream.cancel();
        }
        Commands::Export { output } => {
            export::write_json(&db, BufWriter::new(File::create(&output)?))?;
        }
        Commands::Import { input } => {
            let appended = export::read_json(&db, BufReader::new(File::open(&input)?))?;
            db.sync()?;
            println!("{} points imported", appended);
        }
    }

    Ok(())
}

// =============================================================================
// Output Helpers
// =============================================================================

fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| NatlogError::InvalidQuery(format!("{:?} is not an RFC 3339 time: {}", text, e)))
}

fn describe(value: &PointValue) -> Result<serde_json::Value> {
    Ok(match value {
        PointValue::Inline(v) => serde_json::to_value(v.to_raw())?,
        PointValue::Blob(handle) => json!({
            "mimetype": handle.mimetype(),
            "sequence": handle.sequence().0,
        }),
    })
}

fn column_json(column: &[Option<Value>]) -> Vec<serde_json::Value> {
    column
        .iter()
        .map(|v| match v {
            Some(Value::Blob(bytes)) => json!({ "bytes": bytes.len() }),
            Some(v) => serde_json::to_value(v.to_raw()).unwrap_or(serde_json::Value::Null),
            None => serde_json::Value::Null,
        })
        .collect()
}

fn print_row(center: DateTime<Utc>, values: &[Option<Value>]) -> Result<()> {
    let line = serde_json::to_string(&json!([center.to_rfc3339(), column_json(values)]))?;
    println!("{}", line);
    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

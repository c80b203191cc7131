//! Coalesce CLI: run answer coalescence over a TRAPI message file.
//!
//! Usage:
//!   coalesce run --message query.json [--params params.json] [--config engine.yaml]
//!                [--lookup-db links.db] [--property-db properties.db] [--strict]
//!   coalesce combine --method stouffer [--threshold 1e-6] P...

use answer_coalesce::stats;
use answer_coalesce::{
    CoalesceParams, Coalescer, CombineMethod, EngineConfig, Message, OpenStore, Query, SqliteLookupStore,
    SqlitePropertyStore,
};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;

#[derive(Parser)]
#[command(name = "coalesce", version, about = "Statistical answer coalescence for TRAPI messages")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Coalesce a message and print the result to stdout
    Run {
        /// TRAPI query (`{"message": ...}`) or bare message
        #[arg(long)]
        message: PathBuf,
        /// JSON workflow parameters
        #[arg(long)]
        params: Option<PathBuf>,
        /// YAML engine configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Path to the link/count/provenance SQLite database
        #[arg(long)]
        lookup_db: Option<PathBuf>,
        /// Path to the property SQLite database
        #[arg(long)]
        property_db: Option<PathBuf>,
        /// Fail instead of returning the message unchanged
        #[arg(long)]
        strict: bool,
    },
    /// Combine independent p-values
    Combine {
        /// stouffer, simes, fisher, weighted-fisher or order-statistics
        #[arg(long, default_value = "stouffer")]
        method: CombineMethod,
        /// Significance level for weights and the Simes cut
        #[arg(long, default_value_t = 1e-6)]
        threshold: f64,
        #[arg(required = true)]
        pvalues: Vec<f64>,
    },
}

/// Get the default lookup database path (~/.local/share/answer-coalesce/lookup.db)
fn default_lookup_db() -> PathBuf {
    let data_dir = dirs::data_dir().unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("answer-coalesce").join("lookup.db")
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("{}: {}", path.display(), e))
}

/// The message plus, when it came wrapped, its envelope
fn read_message(path: &Path) -> Result<(Message, Option<Query>), String> {
    let value: serde_json::Value = read_json(path)?;
    if value.get("message").is_some() {
        let query: Query = serde_json::from_value(value).map_err(|e| format!("{}: {}", path.display(), e))?;
        Ok((query.message.clone(), Some(query)))
    } else {
        let message = serde_json::from_value(value).map_err(|e| format!("{}: {}", path.display(), e))?;
        Ok((message, None))
    }
}

fn build_coalescer(
    config: Option<&Path>,
    lookup_db: Option<PathBuf>,
    property_db: Option<&Path>,
) -> Result<Coalescer, String> {
    let config = match config {
        Some(path) => EngineConfig::from_yaml_file(path).map_err(|e| e.to_string())?,
        None => EngineConfig::default(),
    };
    let lookup_path = lookup_db.unwrap_or_else(default_lookup_db);
    let lookup = SqliteLookupStore::open(&lookup_path)
        .map_err(|e| format!("Failed to open lookup database {}: {}", lookup_path.display(), e))?;
    let mut coalescer = Coalescer::new(Arc::new(lookup)).with_config(config);
    if let Some(path) = property_db {
        let properties = SqlitePropertyStore::open(path)
            .map_err(|e| format!("Failed to open property database {}: {}", path.display(), e))?;
        coalescer = coalescer.with_property_store(Arc::new(properties));
    }
    Ok(coalescer)
}

fn cmd_run(
    message: &Path,
    params: Option<&Path>,
    config: Option<&Path>,
    lookup_db: Option<PathBuf>,
    property_db: Option<&Path>,
    strict: bool,
) -> Result<(), String> {
    let (message, envelope) = read_message(message)?;
    let params: CoalesceParams = match params {
        Some(path) => read_json(path)?,
        None => CoalesceParams::default(),
    };
    let coalescer = build_coalescer(config, lookup_db, property_db)?;

    let output = if strict {
        coalescer.coalesce(&message, &params).map_err(|e| e.to_string())?.message
    } else {
        coalescer.coalesce_or_passthrough(message, &params)
    };

    let text = match envelope {
        Some(mut query) => {
            query.message = output;
            serde_json::to_string_pretty(&query)
        }
        None => serde_json::to_string_pretty(&output),
    }
    .map_err(|e| e.to_string())?;
    println!("{}", text);
    Ok(())
}

fn cmd_combine(method: CombineMethod, threshold: f64, pvalues: &[f64]) -> Result<(), String> {
    let p = stats::combine(method, pvalues, threshold).ok_or("no p-values to combine")?;
    println!("{:e}", p);
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            message,
            params,
            config,
            lookup_db,
            property_db,
            strict,
        } => cmd_run(
            &message,
            params.as_deref(),
            config.as_deref(),
            lookup_db,
            property_db.as_deref(),
            strict,
        ),
        Commands::Combine {
            method,
            threshold,
            pvalues,
        } => cmd_combine(method, threshold, &pvalues),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

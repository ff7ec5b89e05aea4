use anyhow::{Context, Result};
use clap::Parser;
use gcsgather::{read_from_gcs, FileType, ReadOptions};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Read every file under a GCS (or local) directory into one table and save it as CSV.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Directory to read, e.g. gs://bucket/exports/2024
    path: String,

    /// Type of the files to read
    #[arg(long, default_value = "csv")]
    file_type: FileType,

    /// Directory to save into (default: current directory)
    #[arg(long)]
    save_path: Option<PathBuf>,

    /// Output file name; .csv is added when missing
    #[arg(long)]
    output_filename: Option<String>,

    /// Column holding date/time values (repeatable)
    #[arg(long = "date-column", value_name = "COLUMN")]
    date_columns: Vec<String>,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_target(false)
        .init();

    let args = Args::parse();
    let options = ReadOptions {
        file_type: args.file_type,
        save_path: args.save_path,
        output_filename: args.output_filename,
        date_columns: args.date_columns,
    };

    let dataset = read_from_gcs(&args.path, &options)
        .with_context(|| format!("reading {}", args.path))?;
    let (rows, cols) = dataset.shape();
    info!(rows, cols, "done");
    Ok(())
}

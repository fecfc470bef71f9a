//! Retail Analytics CLI - Turn retail transaction CSVs into customer metrics
//!
//! # Main Commands
//!
//! ```bash
//! retail-analytics run online_retail.csv -o metrics.csv     # Full pipeline
//! retail-analytics checkpoints out/checkpoints              # List saved artifacts
//! ```
//!
//! # Single Stages
//!
//! ```bash
//! retail-analytics clean raw.csv -o cleaned.csv
//! retail-analytics features cleaned.csv -o enriched.csv
//! retail-analytics aggregate enriched.csv --format json
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use retail_analytics::logs::init_tracing;
use retail_analytics::{
    format_delimiter, parse_csv_file_auto, run_csv, run_stage, table_to_json, validate_stage,
    write_csv, CheckpointStore, OrderValueGrain, PipelineOptions, Stage, Table,
};
use std::fs;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "retail-analytics")]
#[command(about = "Clean retail transactions and compute per-customer metrics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: raw CSV → cleaned → features → customer metrics
    Run {
        #[command(flatten)]
        args: StageArgs,

        /// Save intermediate artifacts to this directory
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,

        /// Order value grain: row or invoice
        #[arg(long)]
        grain: Option<OrderValueGrain>,
    },

    /// Drop duplicate and invalid rows
    Clean {
        #[command(flatten)]
        args: StageArgs,
    },

    /// Add TotalAmount and calendar columns to a cleaned CSV
    Features {
        #[command(flatten)]
        args: StageArgs,
    },

    /// Aggregate an enriched CSV into customer metrics
    Aggregate {
        #[command(flatten)]
        args: StageArgs,

        /// Order value grain: row or invoice
        #[arg(long)]
        grain: Option<OrderValueGrain>,
    },

    /// List artifacts saved in a checkpoint directory
    Checkpoints {
        /// Checkpoint directory
        dir: PathBuf,
    },
}

#[derive(Args)]
struct StageArgs {
    /// Input CSV file
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "csv")]
    format: OutputFormat,

    /// JSON options file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip validation
    #[arg(long)]
    no_validate: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            args,
            checkpoint_dir,
            grain,
        } => cmd_run(&args, checkpoint_dir, grain),

        Commands::Clean { args } => cmd_stage(Stage::Clean, &args, None),

        Commands::Features { args } => cmd_stage(Stage::AddFeatures, &args, None),

        Commands::Aggregate { args, grain } => cmd_stage(Stage::AggregateMetrics, &args, grain),

        Commands::Checkpoints { dir } => cmd_checkpoints(&dir),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Defaults, then `--config`, then environment, then flags.
fn load_options(
    args: &StageArgs,
    grain: Option<OrderValueGrain>,
) -> Result<PipelineOptions, Box<dyn std::error::Error>> {
    let base = match &args.config {
        Some(path) => PipelineOptions::from_file(path)?,
        None => PipelineOptions::default(),
    };
    let mut options = base.with_env_overrides()?;

    if let Some(grain) = grain {
        options.order_value_grain = grain;
    }
    if args.no_validate {
        options.skip_validation = true;
    }
    Ok(options)
}

fn cmd_run(
    args: &StageArgs,
    checkpoint_dir: Option<PathBuf>,
    grain: Option<OrderValueGrain>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", args.input.display());

    let mut options = load_options(args, grain)?;
    if checkpoint_dir.is_some() {
        options.checkpoint_dir = checkpoint_dir;
    }

    let output = run_csv(&args.input, &options)?;

    eprintln!("\n🧹 Cleaned: {} of {} rows kept", output.cleaning.output_rows, output.cleaning.input_rows);
    eprintln!("⚙️  Enriched: {} columns", output.enriched.schema().len());
    eprintln!("📊 Customers: {}", output.metrics.row_count());
    if let Some(dir) = &options.checkpoint_dir {
        eprintln!("💾 Checkpoints in: {}", dir.display());
    }

    write_output(&output.metrics, args.format, args.output.as_deref())?;

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_stage(
    stage: Stage,
    args: &StageArgs,
    grain: Option<OrderValueGrain>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 {}: {}", stage, args.input.display());

    let options = load_options(args, grain)?;
    let parsed = parse_csv_file_auto(&args.input, &options.columns)?;
    eprintln!("   Encoding: {}", parsed.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(parsed.delimiter));
    eprintln!("   Rows: {}", parsed.table.row_count());

    let output = run_stage(stage, &parsed.table, &options)?;
    validate_stage(stage, &parsed.table, &output, &options)?;
    eprintln!("✅ {}: {} rows", stage.output(), output.row_count());

    write_output(&output, args.format, args.output.as_deref())
}

fn cmd_checkpoints(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !dir.is_dir() {
        return Err(format!("Checkpoint directory not found: {}", dir.display()).into());
    }

    let store = CheckpointStore::open(dir)?;
    let checkpoints = store.list();
    if checkpoints.is_empty() {
        eprintln!("📋 No checkpoints in {}", dir.display());
        return Ok(());
    }

    eprintln!("📋 Checkpoints ({}):\n", checkpoints.len());
    for c in checkpoints {
        println!("  📄 {} ({})", c.name, c.file);
        println!("     Rows: {}", c.row_count);
        println!(
            "     Columns: {}",
            c.columns.iter().map(|f| format!("{}:{}", f.name, f.dtype)).collect::<Vec<_>>().join(", ")
        );
        println!("     Created: {}", c.created_at);
        println!();
    }
    Ok(())
}

fn write_output(
    table: &Table,
    format: OutputFormat,
    path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    match (format, path) {
        (OutputFormat::Csv, Some(p)) => {
            write_csv(table, BufWriter::new(fs::File::create(p)?))?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        (OutputFormat::Csv, None) => {
            write_csv(table, io::stdout().lock())?;
        }
        (OutputFormat::Json, Some(p)) => {
            fs::write(p, serde_json::to_string_pretty(&table_to_json(table))?)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        (OutputFormat::Json, None) => {
            println!("{}", serde_json::to_string_pretty(&table_to_json(table))?);
        }
    }
    Ok(())
}

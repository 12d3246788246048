use anyhow::Result;
use booksales_warehouse::config::{AppConfig, CliConfig, FileConfig};
use booksales_warehouse::pipeline::raw::{
    read_customers_csv, read_products_csv, read_purchases_csv, RawBatch,
};
use booksales_warehouse::pipeline::runner::{PipelineRunner, RunStatus};
use booksales_warehouse::warehouse::{SqliteWarehouseStore, WarehouseStore};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| e.to_string())?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[clap(about = "Book sales warehouse ETL")]
struct CliArgs {
    /// Path to the SQLite warehouse database file. Created on first run.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Optional TOML config file; its values override CLI flags.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// SQLite busy timeout in milliseconds.
    #[clap(long, default_value_t = 5000)]
    pub busy_timeout_ms: u64,

    /// Per-stage deadline in seconds. 0 disables the deadline.
    #[clap(long, default_value_t = 300)]
    pub stage_timeout_secs: u64,

    /// Upper bound for a single purchase amount.
    #[clap(long, default_value_t = 10_000.0)]
    pub max_amount: f64,

    /// Reject purchases timestamped before this date (YYYY-MM-DD).
    #[clap(long, default_value = "2000-01-01")]
    pub min_valid_date: String,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one ETL batch from CSV exports into the warehouse.
    Run {
        /// Customers CSV export.
        #[clap(long, value_parser = parse_path)]
        customers: Option<PathBuf>,
        /// Products CSV export.
        #[clap(long, value_parser = parse_path)]
        products: Option<PathBuf>,
        /// Purchases CSV export.
        #[clap(long, value_parser = parse_path)]
        purchases: Option<PathBuf>,
        /// Print the full run report as JSON on stdout.
        #[clap(long)]
        json: bool,
    },
    /// Print warehouse-level analytics.
    Report {
        /// How many top products to list.
        #[clap(long, default_value_t = 10)]
        top: usize,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .ok();

    let file_config = cli_args.config.as_deref().map(FileConfig::load).transpose()?;
    let cli_config = CliConfig {
        db_path: cli_args.db_path.clone(),
        busy_timeout_ms: cli_args.busy_timeout_ms,
        stage_timeout_secs: cli_args.stage_timeout_secs,
        max_amount: cli_args.max_amount,
        min_valid_date: cli_args.min_valid_date.clone(),
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Opening warehouse database at {:?}...", config.db_path);
    let store = SqliteWarehouseStore::open(&config.db_path, config.busy_timeout_ms)?;

    match cli_args.command {
        Command::Run {
            customers,
            products,
            purchases,
            json,
        } => {
            let batch = RawBatch {
                customers: customers
                    .as_deref()
                    .map(read_customers_csv)
                    .transpose()?
                    .unwrap_or_default(),
                products: products
                    .as_deref()
                    .map(read_products_csv)
                    .transpose()?
                    .unwrap_or_default(),
                purchases: purchases
                    .as_deref()
                    .map(read_purchases_csv)
                    .transpose()?
                    .unwrap_or_default(),
            };
            info!(
                customers = batch.customers.len(),
                products = batch.products.len(),
                purchases = batch.purchases.len(),
                "Starting pipeline run"
            );

            let runner = PipelineRunner::new(
                &store,
                config.validator(),
                config.derivation.clone(),
                config.stage_timeout(),
            );
            let report = runner.run(&batch)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Ok(match report.status {
                RunStatus::Success | RunStatus::Partial => ExitCode::SUCCESS,
                RunStatus::Failed => ExitCode::FAILURE,
            })
        }
        Command::Report { top } => {
            let overview = store.analytics_overview()?;
            println!("{}", serde_json::to_string_pretty(&overview)?);
            let products = store.top_products_by_revenue(top)?;
            println!("{}", serde_json::to_string_pretty(&products)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

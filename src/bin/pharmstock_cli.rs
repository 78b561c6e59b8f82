use std::{fs, path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use pharmstock::{
    config::{self, AppConfig},
    db,
    services::month_end::parse_month,
    AppServices, DrugCategory, IncomingLine, LedgerFilters, ServiceError,
};
use serde::Serialize;
use tracing::{debug, error};

#[derive(Parser)]
#[command(name = "pharmstock", about = "Pharmacy master-data resolution and stock ledger", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Print compact JSON instead of pretty JSON"
    )]
    compact: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Raise the drug-code counter above codes already stored
    InitSequence,
    /// Re-match provisional transactions against the current catalog
    Reprocess,
    /// Import feed lines from a JSON array file
    Ingest(IngestArgs),
    /// Delete a manual slip by receipt number
    CancelSlip {
        receipt: String,
    },
    /// Write month-end stock snapshots
    CloseMonth {
        /// Month to close, YYYY-MM
        #[arg(long)]
        month: String,
    },
    /// List months that have transactions
    Months,
    /// Build the stock ledger
    Ledger(LedgerArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum IngestMode {
    /// Append lines as-is
    Batch,
    /// Replace dispensing rows in the file's date span
    Usage,
    /// Replace the inventory count of --date
    Inventory,
}

#[derive(Args)]
struct IngestArgs {
    #[arg(long)]
    file: PathBuf,
    #[arg(long, value_enum, default_value = "batch")]
    mode: IngestMode,
    /// Count date for inventory mode
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[derive(Args)]
struct LedgerArgs {
    #[arg(long)]
    from: Option<NaiveDate>,
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Substring of kana or product name
    #[arg(long)]
    name: Option<String>,
    /// Repeatable: poison, deleterious, narcotic, psychotropic1..3, stimulant, stimulant_raw
    #[arg(long = "category")]
    categories: Vec<DrugCategory>,
    #[arg(long, action = ArgAction::SetTrue)]
    no_movement: bool,
    #[arg(long)]
    coefficient: Option<f64>,
}

struct CliContext {
    config: AppConfig,
    pool: Arc<db::DbPool>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load configuration")?;
        config::init_tracing(config.log_level(), config.log_json);
        let pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        db::check_connection(&pool).await?;
        if config.auto_migrate {
            db::run_migrations(&pool).await?;
        }
        Ok(Self {
            config,
            pool: Arc::new(pool),
        })
    }

    async fn services(&self) -> Result<AppServices, ServiceError> {
        AppServices::build(self.pool.clone(), &self.config).await
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err
                .downcast_ref::<ServiceError>()
                .map(ServiceError::exit_code)
                .unwrap_or(1);
            error!(error = %err, "Command failed");
            eprintln!("error: {err:#}");
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let context = CliContext::initialize().await?;
    let pretty = !cli.compact;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.pool).await?;
            print_json(&serde_json::json!({ "migrated": true }), pretty)?;
        }
        Commands::InitSequence => {
            let services = context.services().await?;
            let last_no = services
                .sequence
                .initialize_from_existing(context.pool.as_ref())
                .await?;
            print_json(
                &serde_json::json!({ "sequence": services.sequence.name(), "last_no": last_no }),
                pretty,
            )?;
        }
        Commands::Reprocess => {
            let summary = context.services().await?.ingest.reprocess_provisional().await?;
            print_json(&summary, pretty)?;
        }
        Commands::Ingest(args) => {
            let raw = fs::read_to_string(&args.file)
                .with_context(|| format!("failed to read {}", args.file.display()))?;
            let lines: Vec<IncomingLine> = serde_json::from_str(&raw)
                .map_err(|e| ServiceError::InvalidInput(format!("{}: {e}", args.file.display())))?;
            debug!(lines = lines.len(), "Parsed feed file");
            let ingest = context.services().await?.ingest;
            let saved = match args.mode {
                IngestMode::Batch => ingest.ingest_batch(&lines).await?,
                IngestMode::Usage => ingest.replace_usage(&lines).await?,
                IngestMode::Inventory => {
                    let date = args.date.ok_or_else(|| {
                        ServiceError::InvalidInput("--date is required for inventory mode".into())
                    })?;
                    ingest.replace_inventory(date, &lines).await?
                }
            };
            print_json(&saved, pretty)?;
        }
        Commands::CancelSlip { receipt } => {
            let removed = context.services().await?.ingest.cancel_slip(&receipt).await?;
            print_json(&serde_json::json!({ "receipt": receipt, "removed": removed }), pretty)?;
        }
        Commands::CloseMonth { month } => {
            let (year, month) = parse_month(&month)?;
            let snapshots = context.services().await?.month_end.close_month(year, month).await?;
            print_json(&snapshots, pretty)?;
        }
        Commands::Months => {
            let months = context.services().await?.month_end.months_with_activity().await?;
            print_json(&months, pretty)?;
        }
        Commands::Ledger(args) => {
            let filters = LedgerFilters {
                start_date: args.from,
                end_date: args.to,
                name: args.name,
                categories: args.categories,
                no_movement: args.no_movement,
                coefficient: args.coefficient,
            };
            let groups = context.services().await?.ledger.build_ledger(&filters).await?;
            print_json(&groups, pretty)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

//! Lead generation CLI
//!
//! Runs the lead pipeline against the configured providers, persists the
//! ranked leads to SQLite, and reads them back.
//!
//! Exit status is 0 when a run completes (fully or partially with at least
//! one surviving lead) and non-zero when it fails or configuration is
//! invalid.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use lead_engine::export::{self, ExportFormat};
use lead_engine::{
    Coordinator, Lead, LeadConfig, LeadStore, ProviderSet, RunOptions, SearchCriteria,
    SqliteStore, UrgencyLevel, WorkflowRun,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DATABASE: &str = "sqlite://leadgen.db?mode=rwc";

#[derive(Parser)]
#[command(name = "leadgen")]
#[command(about = "Discover, score and rank B2B leads")]
struct Cli {
    /// JSON config file (defaults to $LEADGEN_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `info,lead_engine=trace` (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// SQLite database URL
    #[arg(long, global = true, default_value = DEFAULT_DATABASE)]
    database: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline and persist ranked leads
    Run {
        /// Per-agent result cap
        #[arg(long)]
        max_results: Option<usize>,

        /// Export the ranked leads (csv or json)
        #[arg(long)]
        export_format: Option<ExportFormat>,

        /// Export destination (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Wall-clock budget for the run
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Keyword appended to every search query
        #[arg(long = "keyword")]
        keywords: Vec<String>,

        /// Region filter passed to every source
        #[arg(long = "region")]
        regions: Vec<String>,

        /// Minimum employee count for this run
        #[arg(long)]
        min_employees: Option<u32>,

        /// Complete even when no leads are found
        #[arg(long)]
        allow_empty: bool,

        /// Skip persisting leads
        #[arg(long)]
        no_persist: bool,
    },

    /// Print the top leads from the store
    Top {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Print one stored lead as JSON
    Show { lead_id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".bright_red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info,lead_engine=debug".into()),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<LeadConfig> {
    let config = match path {
        Some(path) => {
            let _ = dotenvy::dotenv();
            LeadConfig::from_json_file(path)
                .and_then(|c| c.with_env_overrides(|key| std::env::var(key).ok()))
        }
        None => LeadConfig::from_env(),
    }
    .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn open_store(database: &str) -> Result<SqliteStore> {
    tracing::debug!(database, "opening lead store");
    SqliteStore::new(database)
        .await
        .with_context(|| format!("Failed to open lead store at {database}"))
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Run {
            max_results,
            export_format,
            output,
            deadline_secs,
            keywords,
            regions,
            min_employees,
            allow_empty,
            no_persist,
        } => {
            let mut config = load_config(cli.config.as_ref())?;
            if let Some(max) = max_results {
                config = config.with_max_results(max);
            }
            let mut criteria = SearchCriteria::new();
            criteria.keywords = keywords;
            criteria.regions = regions;
            criteria.min_employees = min_employees;

            let mut options = RunOptions::new();
            if let Some(secs) = deadline_secs {
                options = options.with_deadline(Duration::from_secs(secs));
            }
            if allow_empty {
                options = options.allow_empty(true);
            }
            if no_persist {
                options = options.without_persistence();
            }

            cmd_run(config, &cli.database, criteria, options, export_format, output).await
        }
        Commands::Top { limit } => cmd_top(&cli.database, limit).await,
        Commands::Show { lead_id } => cmd_show(&cli.database, &lead_id).await,
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_run(
    config: LeadConfig,
    database: &str,
    criteria: SearchCriteria,
    options: RunOptions,
    export_format: Option<ExportFormat>,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    if config.providers.sources.is_empty() {
        bail!("no search sources configured (set providers.sources in the config file)");
    }

    let providers = ProviderSet::from_config(&config.providers).context("Failed to configure providers")?;
    let mut coordinator = providers.install(Coordinator::new(config)?);
    if !options.skip_persist {
        coordinator = coordinator.with_store(Arc::new(open_store(database).await?));
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let run = match coordinator.run(&criteria, options.with_cancel(cancel)).await {
        Ok(run) => run,
        Err(fatal) => {
            print_summary(&fatal.run);
            eprintln!("{} {}", "run failed:".bright_red().bold(), fatal.reason);
            return Ok(ExitCode::FAILURE);
        }
    };

    print_summary(&run);
    print_leads(run.ranked().iter().take(10));

    if let Some(format) = export_format {
        let bytes = export::render(run.ranked(), format)?;
        match output {
            Some(path) => {
                std::fs::write(&path, &bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!(
                    "{} {} leads to {}",
                    "exported".bright_green(),
                    run.ranked().len(),
                    path.display()
                );
            }
            None => println!("{}", String::from_utf8_lossy(&bytes)),
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn cmd_top(database: &str, limit: usize) -> Result<ExitCode> {
    let store = open_store(database).await?;
    let leads = store.query_top(limit).await?;
    if leads.is_empty() {
        println!("{}", "No leads stored yet.".yellow());
    } else {
        print_leads(leads.iter());
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_show(database: &str, lead_id: &str) -> Result<ExitCode> {
    let store = open_store(database).await?;
    match store.get(lead_id).await? {
        Some(lead) => {
            println!("{}", serde_json::to_string_pretty(&lead)?);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("{} no lead with id {lead_id}", "error:".bright_red().bold());
            Ok(ExitCode::FAILURE)
        }
    }
}

// ============================================================================
// Output
// ============================================================================

fn print_summary(run: &WorkflowRun) {
    let status = if !run.is_completed() {
        "FAILED".bright_red().bold()
    } else if run.is_partial() {
        "PARTIAL".bright_yellow().bold()
    } else {
        "COMPLETED".bright_green().bold()
    };
    let stats = run.stats();

    println!();
    println!("{} run {} ({} ms)", status, run.id(), run.elapsed().num_milliseconds());
    println!(
        "  found {}  deduped {}  enriched {}  validated {}  disqualified {}  scored {}  persisted {}",
        stats.found,
        stats.deduped,
        stats.enriched,
        stats.validated,
        stats.disqualified,
        stats.scored,
        stats.persisted
    );

    if run.error_count() > 0 {
        println!("  {}", format!("{} errors", run.error_count()).yellow());
        for (agent, errors) in run.errors() {
            for error in errors {
                let lead = error
                    .lead_key
                    .as_ref()
                    .map(|k| format!(" [{k}]"))
                    .unwrap_or_default();
                println!("    {}{}: {}", agent.bright_yellow(), lead, error.message);
            }
        }
    }
    println!();
}

fn print_leads<'a>(leads: impl Iterator<Item = &'a Lead>) {
    println!(
        "{}",
        format!(
            "{:>3}  {:<36} {:<11} {:>7} {:>5} {:>6} {:>6}  {}",
            "#", "company", "industry", "overall", "fit", "intent", "timing", "urgency"
        )
        .bold()
    );
    for (rank, lead) in leads.enumerate() {
        let Some(score) = lead.score() else {
            continue;
        };
        let urgency = UrgencyLevel::from_timing(score.timing());
        println!(
            "{:>3}  {:<36} {:<11} {} {:>5.1} {:>6.1} {:>6.1}  {}",
            rank + 1,
            truncate(&lead.company().name, 36),
            lead.industry().as_str(),
            format!("{:>7.1}", score.overall()).bright_cyan(),
            score.fit(),
            score.intent(),
            score.timing(),
            urgency
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

//! covidsearch CLI
//!
//! Local entry point for ingesting the paper dataset and querying the index.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use covidsearch::{
    backend::{ElasticBackend, MemoryBackend, SearchBackend},
    error::{AppError, Result},
    models::Config,
    pipeline::{self, StopSignal},
    services::QueryService,
    utils::log as report_log,
};

/// covidsearch - COVID-19 paper ingestion and search
#[derive(Parser, Debug)]
#[command(
    name = "covidsearch",
    version,
    about = "Ingest CORD-19 paper metadata into a search index and query it"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Override the backend hosts (repeatable)
    #[arg(long = "host", global = true)]
    hosts: Vec<String>,

    /// Override the index name
    #[arg(long, global = true)]
    index: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load, clean and upload the dataset
    Ingest {
        /// Metadata table (default: ingest.dataset from the config)
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Write the run report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,

        /// Index into an in-memory backend instead of the configured hosts
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a ranked fuzzy query
    Search {
        /// Free-text query
        query: String,

        /// Maximum number of results (default: search.result_size)
        #[arg(long)]
        size: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write cleaned documents with resolved bodies to a CSV file
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show the number of indexed documents
    Count,

    /// Drop the index
    DeleteIndex {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, default_level: &str) {
    let level = if verbose { "debug" } else { default_level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Build the configured HTTP backend.
fn connect(config: &Config) -> Result<Arc<dyn SearchBackend>> {
    let backend = ElasticBackend::from_config(&config.backend)?;
    log::debug!("Using backend hosts {:?}", backend.hosts());
    Ok(Arc::new(backend))
}

/// Raise `stop` on Ctrl-C.
fn stop_on_ctrl_c(stop: StopSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, finishing in-flight uploads...");
            stop.stop();
        }
    });
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config);
    let level = loaded
        .as_ref()
        .map_or("info", |config| config.logging.level.as_str());
    init_logging(cli.verbose, level);

    let mut config = match loaded {
        Ok(config) => {
            log::info!("Loaded configuration from {}", cli.config.display());
            config
        }
        Err(e) => {
            log::warn!(
                "Config load failed from {}: {}. Using defaults.",
                cli.config.display(),
                e
            );
            Config::default()
        }
    };

    if !cli.hosts.is_empty() {
        config.backend.hosts = cli.hosts.clone();
    }
    if let Some(index) = &cli.index {
        config.backend.index = index.clone();
    }

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_unavailable() => {
            log::error!("{}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, mut config: Config) -> Result<()> {
    match command {
        Command::Ingest {
            dataset,
            report,
            dry_run,
        } => {
            if let Some(dataset) = dataset {
                config.ingest.dataset = dataset;
            }
            config.validate()?;

            let backend: Arc<dyn SearchBackend> = if dry_run {
                log::info!("Dry run: indexing into memory");
                Arc::new(MemoryBackend::new())
            } else {
                connect(&config)?
            };

            let stop = StopSignal::new();
            stop_on_ctrl_c(stop.clone());

            report_log::header("Ingest");
            let summary = pipeline::run_ingest(&config, backend, stop).await?;
            report_log::print_ingest_report(&summary);

            if let Some(path) = report {
                std::fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
                log::info!("Report saved to {}", path.display());
            }
        }

        Command::Search { query, size, json } => {
            config.validate()?;
            let service = QueryService::from_config(connect(&config)?, &config);
            let size = size.unwrap_or(config.search.result_size);
            let results = service.search_with_size(&query, size).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                log::info!("No results for {:?}", query);
            } else {
                report_log::header(&format!("{} result(s) for {:?}", results.len(), query));
                for (rank, result) in results.iter().enumerate() {
                    report_log::sub_item(&format!(
                        "{:>2}. [{:.3}] {} ({})",
                        rank + 1,
                        result.score,
                        result.title,
                        result.publish_time
                    ));
                    if !result.authors.is_empty() {
                        report_log::sub_item(&format!("      {}", result.authors.join("; ")));
                    }
                    if !result.url.is_empty() {
                        report_log::sub_item(&format!("      {}", result.url));
                    }
                }
            }
        }

        Command::Export { output } => {
            config.validate()?;
            let written = pipeline::run_export(&config, &output).await?;
            log::info!("Wrote {} documents to {}", written, output.display());
        }

        Command::Count => {
            config.validate()?;
            let backend = connect(&config)?;
            let count = pipeline::count_documents(backend.as_ref(), &config.backend.index).await?;
            println!("{}", count);
        }

        Command::DeleteIndex { yes } => {
            if !yes {
                return Err(AppError::config(format!(
                    "Refusing to delete index '{}' without --yes",
                    config.backend.index
                )));
            }
            config.validate()?;
            let backend = connect(&config)?;
            pipeline::delete_index(backend.as_ref(), &config.backend.index).await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }
    }

    log::info!("Done!");
    Ok(())
}

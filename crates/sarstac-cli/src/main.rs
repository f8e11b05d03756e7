//! Command-line interface for `sarstac`, the SAR STAC catalog harvester.
//!
//! This binary drives the [`sarstac_core`] pipeline over item documents mirrored
//! to a local directory: it discovers the items of each requested provider,
//! fetches them concurrently, normalizes them into one tabular schema and
//! writes one `GeoJSON` file per output group.
//!
//! # Architecture
//!
//! The CLI is built using [`clap`] for argument parsing and [`tracing`] for structured logging.
//! Library crates log through the `log` facade, bridged into `tracing` at startup.
//!
//! # Available Commands
//!
//! - `process` - Normalize the items of one or more providers and write the tables
//! - `providers` - List the registered providers and the rules each one uses

mod display;

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use futures::future::join_all;
use tracing::{Level, error, info};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use sarstac_core::error::SarStacError;
use sarstac_core::operations::{
    DEFAULT_CONCURRENCY, ItemFetcher, LocalFileFetcher, PipelineConfig, ProviderRun,
    discover_local_items, process_provider, validate_base_url,
};
use sarstac_core::providers::{Provider, get_providers};
use sarstac_core::types::OutputKind;

#[derive(Parser)]
#[command(
    name = "sarstac",
    version,
    about = "Normalize SAR STAC catalogs into one tabular schema",
    long_about = "sarstac harvests STAC item metadata from commercial SAR providers, repairs\n\
                  provider quirks (broken links, private hrefs, machine-generated asset keys)\n\
                  and writes schema-uniform tables for mapping and analysis."
)]
/// Command-line arguments and options for the `sarstac` CLI.
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug (DEBUG level) logging output with detailed diagnostics.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Tables to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    /// Map-ready table with nested assets and links
    Map,
    /// Analysis-ready table with one column per asset
    Ard,
    /// Both tables
    All,
}

impl KindArg {
    fn kinds(self) -> Vec<OutputKind> {
        match self {
            KindArg::Map => vec![OutputKind::Map],
            KindArg::Ard => vec![OutputKind::Ard],
            KindArg::All => OutputKind::all().to_vec(),
        }
    }
}

/// Available subcommands for the `sarstac` CLI.
#[derive(Subcommand)]
enum Commands {
    /// Normalizes the items of one or more providers and writes the tables.
    ///
    /// Items are read from `<INPUT>/<provider>/**/*.json`.
    Process {
        /// Providers to process (e.g., "capella", "iceye", "umbra").
        #[arg(value_name = "PROVIDER", required = true)]
        providers: Vec<String>,

        /// Directory holding one folder of item documents per provider.
        #[arg(short, long, value_name = "DIR")]
        input: PathBuf,

        /// Public URL the input directory is mirrored from. Item URLs become
        /// `<URL>/<provider>/<relative path>`; local `file://` URLs otherwise.
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,

        /// Directory to write the output tables to.
        #[arg(short, long, value_name = "DIR", default_value = "output")]
        output: PathBuf,

        /// Which tables to build.
        #[arg(long, value_enum, default_value_t = KindArg::All)]
        kind: KindArg,

        /// Maximum number of documents read at once.
        #[arg(long, value_name = "N", default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Indent the written files.
        #[arg(long)]
        pretty: bool,

        /// Print the column schema of every table.
        #[arg(long)]
        show_schema: bool,
    },

    /// Lists the registered providers and the rules each one uses.
    Providers,
}

/// Entry point for the `sarstac` command-line interface.
///
/// # Errors
///
/// Returns an error if the arguments are invalid, if no provider could be
/// processed, or if the logging system cannot be initialized.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity flags
    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // Bridge logs from the `log` crate to the `tracing` ecosystem.
    LogTracer::init()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Process {
            providers,
            input,
            base_url,
            output,
            kind,
            concurrency,
            pretty,
            show_schema,
        } => {
            let config = PipelineConfig::new(output)
                .with_concurrency(concurrency)
                .with_kinds(kind.kinds())
                .with_pretty(pretty);
            handle_process(
                &providers,
                &input,
                base_url.as_deref(),
                &config,
                show_schema,
            )
            .await?;
        },
        Commands::Providers => {
            handle_providers();
        },
    }

    Ok(())
}

/// Converts a library error into a CLI error carrying its user message and
/// recovery suggestion.
fn user_error(err: impl Into<SarStacError>) -> anyhow::Error {
    let err = err.into();
    match err.recovery_suggestion() {
        Some(suggestion) => anyhow!("{}\n\n{suggestion}", err.user_message()),
        None => anyhow!(err.user_message()),
    }
}

fn parse_providers(names: &[String]) -> Result<Vec<Provider>> {
    let mut providers = Vec::with_capacity(names.len());
    for name in names {
        let provider = name.parse::<Provider>().map_err(user_error)?;
        if !providers.contains(&provider) {
            providers.push(provider);
        }
    }
    Ok(providers)
}

async fn handle_process(
    names: &[String],
    input: &Path,
    base_url: Option<&str>,
    config: &PipelineConfig,
    show_schema: bool,
) -> Result<()> {
    config.validate().map_err(user_error)?;
    if let Some(base) = base_url {
        validate_base_url(base).map_err(user_error)?;
    }
    let providers = parse_providers(names)?;
    info!(
        "Processing {} provider(s) from {}",
        providers.len(),
        input.display()
    );

    let fetcher = LocalFileFetcher;
    let results = join_all(
        providers
            .iter()
            .map(|&provider| run_provider(&fetcher, provider, input, base_url, config)),
    )
    .await;

    let mut runs = Vec::with_capacity(results.len());
    for (provider, result) in providers.iter().zip(results) {
        match result {
            Ok(run) => runs.push(run),
            Err(e) => error!("{provider}: {}", user_error(e)),
        }
    }

    display::display_summary(&runs);
    if show_schema {
        display::display_schemas(&runs);
    }

    if runs.is_empty() {
        return Err(anyhow!("No provider could be processed."));
    }
    Ok(())
}

async fn run_provider(
    fetcher: &dyn ItemFetcher,
    provider: Provider,
    input: &Path,
    base_url: Option<&str>,
    config: &PipelineConfig,
) -> sarstac_core::error::Result<ProviderRun> {
    let directory = input.join(provider.as_str());
    let provider_url = base_url.map(|base| format!("{}/{provider}", base.trim_end_matches('/')));
    let locations = discover_local_items(&directory, provider_url.as_deref()).await?;
    process_provider(fetcher, provider, &locations, config).await
}

/// Handles the `providers` subcommand by displaying the provider registry.
fn handle_providers() {
    display::display_providers(&get_providers());
}

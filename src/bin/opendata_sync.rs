use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use opendata_sync::app::App;
use opendata_sync::catalog::CatalogHttpClient;
use opendata_sync::config::{ConfigLoader, ObjectStoreCredentials, ResolvedConfig};
use opendata_sync::error::SyncError;
use opendata_sync::fetch::HttpFetcher;
use opendata_sync::output::{HumanOutput, JsonOutput, OutputMode};
use opendata_sync::store::JsonMetadataStore;
use opendata_sync::sync::SyncOptions;
use opendata_sync::upload::S3ObjectStore;

#[derive(Parser)]
#[command(name = "opendata-sync")]
#[command(about = "Mirror compressed open-data catalog resources to object storage")]
#[command(version, author)]
struct Cli {
    /// Path to the JSON config file (default: ./opendata-sync.json if present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print the result as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download and decompress new or updated catalog resources")]
    Extract(ExtractArgs),
    #[command(about = "Upload the data directory and clear the staging directory")]
    Load,
    #[command(about = "Extract, then load")]
    Run(RunArgs),
}

#[derive(Args, Clone)]
struct ExtractArgs {
    #[arg(long)]
    force: bool,

    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Clone)]
struct RunArgs {
    #[arg(long)]
    force: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<SyncError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SyncError) -> u8 {
    match error {
        SyncError::ConfigRead(_)
        | SyncError::ConfigParse(_)
        | SyncError::MissingCredential(_) => 2,
        SyncError::CatalogUnavailable(_) => 3,
        SyncError::DirectoryMissing(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let app = build_app(config)?;
    let metadata = JsonMetadataStore::new(app.config().metadata_file.clone());

    match cli.command {
        Commands::Extract(args) => {
            let options = SyncOptions {
                force: args.force,
                dry_run: args.dry_run,
            };
            let result = app.extract(&metadata, options)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_extract(&result).into_diagnostic()?,
                OutputMode::Human => HumanOutput::print_extract(&result),
            }
        }
        Commands::Load => {
            let object_store = S3ObjectStore::new(&ObjectStoreCredentials::from_env()?)?;
            let result = app.load(object_store)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_load(&result).into_diagnostic()?,
                OutputMode::Human => HumanOutput::print_load(&result),
            }
        }
        Commands::Run(args) => {
            let object_store = S3ObjectStore::new(&ObjectStoreCredentials::from_env()?)?;
            let options = SyncOptions {
                force: args.force,
                dry_run: false,
            };
            let result = app.run(&metadata, object_store, options)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_run(&result).into_diagnostic()?,
                OutputMode::Human => HumanOutput::print_run(&result),
            }
        }
    }
    Ok(())
}

fn build_app(config: ResolvedConfig) -> Result<App<CatalogHttpClient, HttpFetcher>, SyncError> {
    let catalog = CatalogHttpClient::new(config.api_url.clone(), config.http_timeout)?;
    let fetcher = HttpFetcher::new(config.http_timeout)?;
    Ok(App::new(config, catalog, fetcher))
}

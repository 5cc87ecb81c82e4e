//! famsort-ai - Survey sorting CLI
//!
//! **Subcommands:**
//! - `sort`: anonymize a response spreadsheet, group respondents through
//!   the language-model service, write the reversed output
//! - `reverse`: restore names in a classified CSV from persisted maps
//! - `init-config`: write a default config file (mode 0600 on Unix)
//!
//! On failure the structured error body is printed to stdout and the
//! process exits non-zero.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use famsort_ai::config::{build_oracle_client, resolve_pipeline_config};
use famsort_ai::workflow::pipeline::reverse_file;
use famsort_ai::{Pipeline, PipelineError, PipelineResult, SortRequest};
use famsort_common::config::{default_config_path, load_config, write_toml_config, TomlConfig};
use famsort_common::Error;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for famsort-ai
#[derive(Parser, Debug)]
#[command(name = "famsort-ai")]
#[command(about = "Privacy-preserving survey grouping")]
#[command(version)]
struct Cli {
    /// TOML config file (overrides FAMSORT_CONFIG and the platform default)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline over a response spreadsheet
    Sort(SortArgs),
    /// Reverse a classified CSV using persisted identifier maps
    Reverse(ReverseArgs),
    /// Write a default config file to --config or the platform location
    InitConfig(InitConfigArgs),
}

#[derive(Args, Debug)]
struct SortArgs {
    /// Response spreadsheet (.csv, .xlsx, .xls, .xlsm, .xlsb)
    #[arg(short, long)]
    input: PathBuf,

    /// Output CSV path
    #[arg(short, long)]
    output: PathBuf,

    /// Grouping instruction, e.g. "Make 6 groups of people who like to cook"
    #[arg(long)]
    instruction: Option<String>,

    /// API key for the language-model service
    #[arg(long)]
    api_key: Option<String>,

    /// Parent directory for per-run identifier maps
    #[arg(long)]
    artifact_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ReverseArgs {
    /// Classified CSV holding identifiers
    #[arg(short, long)]
    input: PathBuf,

    /// Persisted name map (Name,UUID)
    #[arg(long)]
    names: PathBuf,

    /// Persisted manual map (Original Text,Manual UUID)
    #[arg(long)]
    manual: PathBuf,

    /// Output CSV path
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct InitConfigArgs {
    /// API key to store in the [oracle] section
    #[arg(long)]
    api_key: Option<String>,

    /// Replace an existing file
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing before loading config so its warnings are visible;
    // the configured level replaces the bootstrap filter afterwards
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let toml_config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return report_failure(PipelineError::from(e)),
    };

    if !from_env {
        if let Err(e) = filter_handle.reload(EnvFilter::new(&toml_config.logging.level)) {
            warn!("Unable to apply configured log level: {}", e);
        }
    }

    info!(
        "Starting famsort-ai v{} (git {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    let result = match cli.command {
        Command::Sort(args) => run_sort(args, &toml_config).await,
        Command::Reverse(args) => run_reverse(args, &toml_config),
        Command::InitConfig(args) => run_init_config(args, cli.config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_failure(e),
    }
}

async fn run_sort(args: SortArgs, toml_config: &TomlConfig) -> PipelineResult<()> {
    let config = resolve_pipeline_config(toml_config, args.artifact_dir)?;
    let client = Arc::new(build_oracle_client(&toml_config.oracle, args.api_key.as_deref())?);

    let pipeline = Pipeline::new(config, client.clone(), client);
    let request = SortRequest {
        input: args.input,
        output: args.output,
        instruction: args.instruction,
    };
    let diagnostics = pipeline.run(&request).await?;

    if !diagnostics.missing_users.is_empty() || !diagnostics.failed_batches.is_empty() {
        warn!(
            missing = diagnostics.missing_users.len(),
            failed_batches = diagnostics.failed_batches.len(),
            "Run finished with unsorted respondents"
        );
    }

    let body = serde_json::to_string_pretty(&diagnostics).context("Failed to render diagnostics")?;
    println!("{}", body);
    Ok(())
}

fn run_reverse(args: ReverseArgs, toml_config: &TomlConfig) -> PipelineResult<()> {
    let settings = &toml_config.pipeline;
    let mut list_columns = settings.reference_columns.clone();
    list_columns.push(settings.free_text_column.clone());

    let unknown = reverse_file(
        &args.input,
        &args.names,
        &args.manual,
        &list_columns,
        &args.output,
    )?;

    let body = serde_json::json!({ "unknown_identifiers": unknown });
    println!("{}", body);
    Ok(())
}

fn run_init_config(args: InitConfigArgs, path: Option<PathBuf>) -> PipelineResult<()> {
    let path = path
        .or_else(default_config_path)
        .ok_or_else(|| Error::Config("No platform config directory; pass --config".to_string()))?;
    if path.exists() && !args.force {
        return Err(Error::InvalidInput(format!(
            "{} already exists; pass --force to replace it",
            path.display()
        ))
        .into());
    }

    let mut config = TomlConfig::default();
    config.oracle.api_key = args.api_key;
    write_toml_config(&config, &path)?;

    info!("Configuration written to {}", path.display());
    println!("{}", serde_json::json!({ "config": path }));
    Ok(())
}

fn report_failure(e: PipelineError) -> ExitCode {
    error!(code = e.code(), "{}", e);
    println!("{}", e.to_json());
    ExitCode::FAILURE
}

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::{
    analysis::SubmissionOutcome,
    session::ClinicalSession,
    settings::{SettingsStore, UserSettings},
    tabular,
    utils::logging::init_logging,
};

#[derive(Debug, Parser)]
#[command(
    name = "cardiaguard",
    version,
    about = "Heart-disease feature pipeline: Orange .tab import/export and risk analysis"
)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (JSON)
    #[arg(long, global = true, default_value = "cardiaguard.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse a .tab/.csv document and print the resulting record
    Import {
        /// Document to read
        file: PathBuf,
    },
    /// Write the record as an Orange .tab file
    Export(RecordArgs),
    /// Submit the record to the configured analyzer
    Analyze(RecordArgs),
    /// Update the settings file, then print the stored settings
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// Analyzer endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Bearer key sent to the analyzer
    #[arg(long)]
    api_key: Option<String>,

    /// Default directory for exported files
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RecordArgs {
    /// Start from a .tab/.csv document instead of the default profile
    #[arg(long)]
    from: Option<PathBuf>,

    /// Field edits applied after import, e.g. `--set age=63`
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    edits: Vec<String>,

    /// Export directory (overrides settings)
    #[arg(long)]
    out: Option<PathBuf>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(execute(cli))
}

async fn execute(cli: Cli) -> Result<()> {
    let store = SettingsStore::new(cli.config.clone())?;
    let mut settings = store.effective();

    match cli.command {
        Command::Import { file } => {
            let text = tabular::read_document(&file).await?;
            let parsed = tabular::inspect_document(&text)
                .ok_or_else(|| anyhow!("{} contains no usable data row", file.display()))?;
            for coerced in &parsed.coerced {
                log::warn!(
                    "'{}' is not a number; {} imported as 0",
                    coerced.token,
                    coerced.field
                );
            }
            print_json(&parsed.record)
        }
        Command::Export(args) => {
            if let Some(out) = &args.out {
                settings.export_dir = out.clone();
            }
            let session = prepare_session(&settings, &args).await?;
            let path = session.export_to_dir().await?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Analyze(args) => {
            let session = prepare_session(&settings, &args).await?;
            let handle = session.submit().await;
            match handle.outcome().await? {
                SubmissionOutcome::Success(result) => print_json(&result),
                SubmissionOutcome::Failure(message) => Err(anyhow!(message)),
            }
        }
        Command::Config(args) => {
            configure(&store, args)?;
            print_json(&store.stored())
        }
    }
}

fn configure(store: &SettingsStore, args: ConfigArgs) -> Result<()> {
    if args.endpoint.is_some() || args.api_key.is_some() {
        let mut analyzer = store.stored().analyzer;
        if let Some(endpoint) = args.endpoint {
            analyzer.endpoint = Some(endpoint);
        }
        if let Some(key) = args.api_key {
            analyzer.api_key = Some(key);
        }
        store.update_analyzer(analyzer)?;
    }
    if let Some(dir) = args.export_dir {
        store.update_export_dir(dir)?;
    }
    Ok(())
}

async fn prepare_session(
    settings: &UserSettings,
    args: &RecordArgs,
) -> Result<ClinicalSession> {
    let session = ClinicalSession::from_settings(settings)?;

    if let Some(path) = &args.from {
        if !session.import_file(path).await? {
            log::warn!("{} has no usable data row; using defaults", path.display());
        }
    }

    for edit in &args.edits {
        let (name, value) = edit
            .split_once('=')
            .ok_or_else(|| anyhow!("expected FIELD=VALUE, got '{edit}'"))?;
        session.set_field_named(name.trim(), value).await?;
    }

    for advisory in session.features().await.advisories() {
        log::warn!(
            "{} = {} is outside the usual range {:?}",
            advisory.field,
            advisory.value,
            advisory.expected
        );
    }

    Ok(session)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

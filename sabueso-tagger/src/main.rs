//! sabueso-tagger - command-line entry point
//!
//! `classify` downloads and labels the images referenced by the image table
//! and prints the result. `tag` additionally joins tweet rows and writes the
//! labels back to the clean table (rolled back unless `--commit`).

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sabueso_common::config::load_config;
use sabueso_common::{ConnectionParams, Error, LoggingConfig, TomlConfig};
use sabueso_tagger::services::Predictor;
use sabueso_tagger::{Pipeline, PipelineConfig, RecordStore};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for sabueso-tagger
#[derive(Parser, Debug)]
#[command(name = "sabueso-tagger")]
#[command(about = "Download tweet images, classify them and write the labels back")]
#[command(version)]
struct Args {
    /// TOML config file (falls back to SABUESO_CONFIG, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Credentials JSON (overrides `credentials_path`)
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Connection URL; takes precedence over the credentials file
    #[arg(long, env = "SABUESO_DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Directory images are downloaded into
    #[arg(short, long)]
    download_dir: Option<PathBuf>,

    /// Commit label updates instead of rolling them back
    #[arg(long)]
    commit: bool,

    /// Number of labels kept per image
    #[arg(short, long)]
    top: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Download and classify; nothing is written to the record store
    Classify,
    /// Download, classify and write labels to the clean table
    Tag,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        eprintln!("sabueso-tagger: {:#}", e);

        let code = e.downcast_ref::<Error>().map_or(1, Error::exit_code);
        std::process::exit(code);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = load_config_logged(args.config.as_deref(), std::io::stderr)?;
    let config = apply_overrides(config, &args)?;
    init_tracing(&config.logging)?;

    info!(
        "Starting sabueso-tagger {} ({}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE")
    );

    let params = match &args.database_url {
        Some(url) => ConnectionParams::from_url(url.clone()),
        None => ConnectionParams::from_file(&config.credentials_path)?,
    };
    let mut store = RecordStore::new(params);

    let predictor = load_predictor(&config)?;
    let pipeline = Pipeline::new(PipelineConfig::from(&config), predictor)?;

    match args.command {
        Command::Classify => {
            let report = pipeline.classify(&mut store).await?;
            info!(
                downloaded = report.downloaded,
                skipped = report.skipped,
                "Classification finished"
            );
            print_report(&report)?;
        }
        Command::Tag => {
            let report = pipeline.tag(&mut store).await?;
            info!(
                entries = report.entries_written,
                rows = report.rows_affected,
                committed = report.committed,
                "Tagging finished"
            );
            print_report(&report)?;
        }
    }

    Ok(())
}

fn apply_overrides(mut config: TomlConfig, args: &Args) -> Result<TomlConfig> {
    if let Some(path) = &args.credentials {
        config.credentials_path = path.clone();
    }
    if let Some(dir) = &args.download_dir {
        config.download_dir = dir.clone();
    }
    if let Some(top) = args.top {
        config.top_n = top;
    }
    if args.commit {
        config.commit = true;
    }
    config.validate()?;
    Ok(config)
}

/// Load the config under a scoped subscriber
///
/// The logging section is only known once the config is read, so messages
/// emitted while loading it go to `writer` at info level.
fn load_config_logged<W>(path: Option<&Path>, writer: W) -> sabueso_common::Result<TomlConfig>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .finish();

    tracing::subscriber::with_default(bootstrap, || load_config(path))
}

/// `RUST_LOG` wins over the configured level; the optional file gets plain text
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("sabueso_tagger={0},sabueso_common={0}", logging.level).into());

    let file_layer = match &logging.file {
        Some(path) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

#[cfg(feature = "onnx")]
fn load_predictor(config: &TomlConfig) -> Result<Box<dyn Predictor>> {
    let predictor = sabueso_tagger::services::predictor::OnnxPredictor::from_file(
        &config.model_path,
        config.channels_first,
    )?;
    Ok(Box::new(predictor))
}

#[cfg(not(feature = "onnx"))]
fn load_predictor(_config: &TomlConfig) -> Result<Box<dyn Predictor>> {
    Err(Error::Config(
        "no model runtime available; rebuild with `--features onnx`".to_string(),
    )
    .into())
}

fn print_report<T: Serialize>(report: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(())
}

//! Command-line front end for the EdgeForge client

use anyhow::Context;
use clap::{Parser, Subcommand};
use edgeforge_client::{
    config::Settings,
    input::{data_url, InputState, ReferenceImage, DEFAULT_BATCH_SIZE},
    AppError, Dispatch, RequestDispatcher,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "edgeforge", version, about = "Generate assets and datasets with EdgeForge")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send an intent and reference layout to the service and save the archive
    Generate(GenerateArgs),
    /// Print the effective settings
    Config,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    /// What to generate, e.g. "A futuristic car, hard to see, heavy fog"
    #[arg(long, default_value = "")]
    intent: String,

    /// Reference layout image: a file path or a data:image/... URL
    #[arg(long)]
    image: Option<String>,

    /// Number of variations; 1 requests a single asset
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = clap::value_parser!(u32).range(1..=10))]
    batch_size: u32,

    /// Directory to save the archive into
    #[arg(long)]
    out: Option<PathBuf>,

    /// Print the delivery receipt as JSON
    #[arg(long)]
    json: bool,
}

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if settings.logging.format == "json" {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

async fn load_image(value: &str) -> edgeforge_client::Result<ReferenceImage> {
    if data_url::is_data_url(value) {
        ReferenceImage::from_data_url(value)
    } else {
        ReferenceImage::from_path(value).await
    }
}

/// The status text if it differs from the last one shown
fn changed_status(last: &mut Option<String>, status: String) -> Option<&str> {
    if last.as_deref() == Some(status.as_str()) {
        return None;
    }
    Some(last.insert(status).as_str())
}

async fn run_generate(mut settings: Settings, args: GenerateArgs) -> anyhow::Result<ExitCode> {
    if let Some(out) = args.out {
        settings.output.download_dir = out;
    }

    let mut state = InputState::new();
    state.set_intent(args.intent);
    state.set_batch_size(args.batch_size);
    if let Some(image) = args.image.as_deref() {
        match load_image(image).await {
            Ok(image) => state.set_reference_image(image),
            Err(e @ AppError::Validation(_)) => {
                eprintln!("{}", e);
                return Ok(ExitCode::from(2));
            }
            Err(e) => return Err(e).context("failed to read reference image"),
        }
    }

    let dispatcher = RequestDispatcher::from_settings(&settings)?;

    // Render status changes as they happen
    let mut updates = dispatcher.status().subscribe();
    let printer = tokio::spawn(async move {
        let mut last = None;
        while updates.changed().await.is_ok() {
            let status = updates.borrow_and_update().status.clone();
            if let Some(line) = changed_status(&mut last, status) {
                eprintln!("Status: {}", line);
            }
        }
    });

    let outcome = dispatcher.generate(&state).await;
    drop(dispatcher);
    let _ = printer.await;

    match outcome {
        Ok(Dispatch::Delivered(receipt)) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            } else {
                println!("{}", receipt.path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Ok(Dispatch::Skipped) => Ok(ExitCode::SUCCESS),
        Err(e) if e.is_validation() => {
            eprintln!("{}", e);
            Ok(ExitCode::from(2))
        }
        Err(e) => {
            error!(error = %e, "Generation failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let settings = Settings::load_from_path(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    init_logging(&settings);
    info!(
        "Loaded configuration: service={}",
        settings.service.base_url
    );

    match cli.command {
        Command::Config => {
            print!("{}", settings.to_toml()?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Generate(args) => run_generate(settings, args).await,
    }
}

use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use drape::assets::ImageUpload;
use drape::config::{ReferenceMode, StudioConfig};
use drape::error::StudioError;
use drape::event::{BatchEvent, BatchEventHandler};
use drape::orchestrator::CancelFlag;
use drape::validation::MediaType;
use drape::{Studio, TryOnPipeline};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "drape", version, about = "Virtual try-on studio")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (needs AUTH_USERNAME, AUTH_PASSWORD, REPLICATE_API_TOKEN).
    Serve,
    /// Run one batch from files on disk and download the results.
    Batch(BatchArgs),
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Model photo; repeat to rotate several models round-robin.
    #[arg(long = "model", required = true)]
    models: Vec<PathBuf>,
    /// Garment as STYLECODE=PATH, e.g. SJ12A=shirt.png; repeat up to ten times.
    #[arg(long = "garment", required = true, value_parser = parse_garment)]
    garments: Vec<(String, PathBuf)>,
    /// Directory the results are downloaded into.
    #[arg(long)]
    out: PathBuf,
    /// Upload images to the file host instead of inlining them.
    #[arg(long)]
    hosted: bool,
    /// Per-garment generation timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,
}

fn parse_garment(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((code, path)) if !code.is_empty() && !path.is_empty() => {
            Ok((code.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected STYLECODE=PATH, got '{}'", raw)),
    }
}

struct ConsoleProgress;

#[async_trait]
impl BatchEventHandler for ConsoleProgress {
    async fn on_batch_event(&self, event: &BatchEvent) {
        match event {
            BatchEvent::ItemStarted {
                position,
                total,
                model_index,
                ..
            } => println!(
                "Processing {} of {}... (model {})",
                position,
                total,
                model_index + 1
            ),
            BatchEvent::ItemSucceeded { filename, .. } => println!("  done: {}", filename),
            BatchEvent::ItemFailed { message, .. } => eprintln!("  {}", message),
            BatchEvent::ItemSkipped { position } => eprintln!("  skipped item {}", position),
            BatchEvent::BatchCompleted {
                succeeded,
                failed,
                skipped,
            } => println!(
                "Batch finished: {} succeeded, {} failed, {} skipped",
                succeeded, failed, skipped
            ),
            BatchEvent::BatchStarted { .. } => {}
        }
    }
}

#[tokio::main]
async fn main() {
    drape::init_logger();
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Serve => serve().await,
        Command::Batch(args) => batch(args).await,
    };
    if let Err(err) = result {
        eprintln!("drape: {}", err);
        std::process::exit(1);
    }
}

async fn serve() -> Result<(), StudioError> {
    let config = StudioConfig::from_env()?;
    log::info!("drape::main::serve(): {:?}", config);
    drape::server::serve(config).await
}

async fn batch(args: BatchArgs) -> Result<(), StudioError> {
    let mut config = StudioConfig::for_batch_from_env()?;
    if args.hosted {
        config.reference_mode = ReferenceMode::Hosted;
    }
    if let Some(secs) = args.timeout {
        config.generation_timeout = Duration::from_secs(secs.max(1));
    }

    let mut studio = Studio::new(TryOnPipeline::from_config(&config))
        .with_event_handler(Arc::new(ConsoleProgress));

    let mut models = Vec::with_capacity(args.models.len());
    for path in &args.models {
        models.push(read_upload(path).await?);
    }
    let added = studio.models_mut().add(models)?;
    if let Some(notice) = added.notice() {
        eprintln!("{}", notice);
    }

    let mut garments = Vec::with_capacity(args.garments.len());
    for (_, path) in &args.garments {
        garments.push(read_upload(path).await?);
    }
    let added = studio.garments_mut().add(garments)?;
    if let Some(notice) = added.notice() {
        eprintln!("{}", notice);
    }
    for (id, (code, _)) in added.added.iter().zip(&args.garments) {
        studio.garments_mut().set_style_code(id, code)?;
    }

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Stopping after the current garment...");
            on_interrupt.cancel();
        }
    });

    let report = studio.run_batch(Some(&cancel)).await?;
    let ids: Vec<String> = report.succeeded().iter().map(|r| r.id.clone()).collect();
    let downloads = studio
        .gallery()
        .download_many(&ids[..], &args.out, config.download_delay)
        .await;
    for path in &downloads.saved {
        println!("saved {}", path.display());
    }
    for (_, reason) in &downloads.failed {
        eprintln!("download failed: {}", reason);
    }

    match report.last_error() {
        Some(last) if report.succeeded().is_empty() => {
            Err(StudioError::GenerationFailed(last.to_string()))
        }
        _ => Ok(()),
    }
}

async fn read_upload(path: &Path) -> Result<ImageUpload, StudioError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| StudioError::Io(format!("{}: {}", path.display(), e)))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(ImageUpload::new(
        filename,
        MediaType::declared_for_path(path),
        bytes,
    ))
}

//! Motive CLI: batch photo upload and gallery processing for the Motive admin.
//!
//! Set MOTIVE_API_TOKEN and MOTIVE_API_URL (or API_URL). Uses bearer auth.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

use motive_api_client::{
    ApiClient, ExtendCanvasRequest, GalleryClient, HttpTransmitter, MatteRequest, ProcessedImage,
};
use motive_cli::{build_services, init_tracing, progress_line, read_source_file};
use motive_core::models::{BatchContext, TargetAssociation};
use motive_core::{extract_asset_id, normalize_delivery_url, UploaderConfig};
use motive_processing::BatchAdmission;
use motive_uploader::BatchOrchestrator;

#[derive(Parser)]
#[command(name = "motive", about = "Motive admin media CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a batch of photos
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Car the photos belong to
        #[arg(long)]
        car_id: Option<String>,
        /// JSON object forwarded to image analysis (make, model, angle...)
        #[arg(long)]
        hints: Option<String>,
        /// Maximum uploads in flight (0 = unbounded)
        #[arg(long, env = "MAX_CONCURRENT_UPLOADS")]
        concurrency: Option<usize>,
    },
    /// Print the canonical form and asset id of a delivery URL
    NormalizeUrl {
        url: String,
    },
    /// Extend an image's canvas to a target height
    ExtendCanvas {
        image_url: String,
        /// Output height in pixels
        #[arg(long)]
        height: u32,
        /// Fraction of the height kept clear around the subject
        #[arg(long, default_value = "0.05")]
        padding: f32,
        /// Background threshold 0-255 (auto when omitted)
        #[arg(long)]
        white_threshold: Option<u8>,
        #[command(flatten)]
        output: PreviewOutput,
    },
    /// Place an image on a solid-colour matte
    Matte {
        image_url: String,
        #[arg(long, default_value = "1920")]
        width: u32,
        #[arg(long, default_value = "1080")]
        height: u32,
        /// Border as a percentage of the matte (0 <= p < 50)
        #[arg(long, default_value = "0")]
        padding: f32,
        #[arg(long, default_value = "#000000")]
        color: String,
        #[command(flatten)]
        output: PreviewOutput,
    },
}

#[derive(clap::Args)]
struct PreviewOutput {
    /// Write the preview to this path
    #[arg(long)]
    out: Option<PathBuf>,
    /// Upload the preview as a new asset of this car
    #[arg(long)]
    replace_for_car: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NormalizedUrl {
    canonical: String,
    asset_id: Option<String>,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

fn bearer_token(config: &UploaderConfig) -> anyhow::Result<String> {
    config
        .api_token
        .clone()
        .context("MOTIVE_API_TOKEN is not set")
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::NormalizeUrl { url } => {
            print_json(&NormalizedUrl {
                canonical: normalize_delivery_url(&url),
                asset_id: extract_asset_id(&url),
            })?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Upload {
            files,
            car_id,
            hints,
            concurrency,
        } => {
            let mut config = UploaderConfig::from_env().context(
                "Invalid configuration. Check MOTIVE_API_URL and the upload limits",
            )?;
            if let Some(concurrency) = concurrency {
                config = config
                    .with_max_concurrent_uploads(concurrency)
                    .context("Invalid configuration after applying --concurrency")?;
            }
            upload(&config, files, car_id, hints).await
        }
        Commands::ExtendCanvas {
            image_url,
            height,
            padding,
            white_threshold,
            output,
        } => {
            let config = UploaderConfig::from_env()?;
            let gallery = GalleryClient::new(ApiClient::from_config(&config)?);
            let request = ExtendCanvasRequest {
                padding_pct: padding,
                white_threshold,
                ..ExtendCanvasRequest::new(image_url, height)
            };
            let preview = gallery
                .extend_canvas(&bearer_token(&config)?, &request)
                .await?;
            deliver_preview(&config, &gallery, preview, output, "extended.jpg").await
        }
        Commands::Matte {
            image_url,
            width,
            height,
            padding,
            color,
            output,
        } => {
            let config = UploaderConfig::from_env()?;
            let gallery = GalleryClient::new(ApiClient::from_config(&config)?);
            let request = MatteRequest {
                width,
                height,
                padding_percent: padding,
                color,
                ..MatteRequest::new(image_url)
            };
            let preview = gallery
                .generate_matte(&bearer_token(&config)?, &request)
                .await?;
            deliver_preview(&config, &gallery, preview, output, "matte.jpg").await
        }
    }
}

async fn upload(
    config: &UploaderConfig,
    paths: Vec<PathBuf>,
    car_id: Option<String>,
    hints: Option<String>,
) -> anyhow::Result<ExitCode> {
    let admission = BatchAdmission::from_config(config);
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let file = read_source_file(path, admission.validator())
            .await
            .context("Upload rejected, no files were sent")?;
        files.push(file);
    }

    let files = admission
        .admit(0, files)
        .context("Upload rejected, no files were sent")?;

    let mut context = match car_id {
        Some(car_id) => BatchContext::for_target(TargetAssociation::new("car", car_id)),
        None => BatchContext::default(),
    };
    if let Some(hints) = hints {
        let hints: serde_json::Value =
            serde_json::from_str(&hints).context("--hints must be a JSON object")?;
        if !hints.is_object() {
            bail!("--hints must be a JSON object");
        }
        context = context.with_hints(hints);
    }

    let orchestrator = BatchOrchestrator::new(build_services(config)?)
        .with_max_concurrent(config.max_concurrent_uploads)
        .with_context(context);

    let run = orchestrator.run_with_progress(files)?;
    let mut progress = run.progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let line = progress_line(&progress.borrow_and_update());
            eprintln!("{}", line);
        }
        let last = progress.borrow().clone();
        last
    });

    let cancel = run.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing uploads already in flight");
            cancel.cancel();
        }
    });

    let summary = run.wait().await?;
    let last = reporter.await.context("Progress reporter failed")?;

    print_json(&serde_json::json!({
        "items": last.items,
        "summary": summary,
    }))?;
    eprintln!("{}", summary.describe());

    Ok(if summary.is_complete_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn deliver_preview(
    config: &UploaderConfig,
    gallery: &GalleryClient,
    preview: ProcessedImage,
    output: PreviewOutput,
    default_name: &str,
) -> anyhow::Result<ExitCode> {
    if output.out.is_none() && output.replace_for_car.is_none() {
        if let ProcessedImage::Remote(url) = &preview {
            println!("{}", url);
            return Ok(ExitCode::SUCCESS);
        }
        bail!("Pass --out or --replace-for-car to keep an inline preview");
    }

    if let Some(path) = &output.out {
        let file = gallery.fetch_preview(&preview, default_name).await?;
        tokio::fs::write(path, &file.data)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("Wrote {} ({} bytes)", path.display(), file.size());
    }

    if let Some(car_id) = output.replace_for_car {
        let transmitter = HttpTransmitter::new(ApiClient::from_config(config)?);
        let context = BatchContext::for_target(TargetAssociation::new("car", car_id));
        let envelope = context.envelope(Uuid::new_v4(), Uuid::new_v4(), default_name);
        let asset = gallery
            .replace_image(
                &transmitter,
                &preview,
                default_name,
                envelope,
                &bearer_token(config)?,
            )
            .await?;
        print_json(&asset)?;
    }

    Ok(ExitCode::SUCCESS)
}

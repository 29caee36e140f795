use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dance_pose::{
    build_provider, decode_with, extract_batch_with_cancel, init_logging, BackendKind,
    ExtractionConfig, ExtractionJob, ExtractionPipeline, ExtractionSummary,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dance-pose", version, about = "Extract pose landmark sequences from dance videos")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct ExtractOptions {
    /// Landmark provider: auto, detector or synthetic
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Config file (defaults to ~/.dance_pose/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write single-line JSON
    #[arg(long)]
    compact: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Extract one video into a pose JSON file
    Extract {
        /// Video file, .y4m stream or directory of image frames
        video: PathBuf,

        /// Where to write the pose JSON
        output: PathBuf,

        #[command(flatten)]
        options: ExtractOptions,
    },

    /// Validate a pose JSON file and print its summary
    Inspect {
        file: PathBuf,

        /// Landmark topology to validate against
        #[arg(long, default_value_t = dance_pose::NUM_KEYPOINTS)]
        num_keypoints: usize,
    },

    /// Extract several videos concurrently, one `<stem>.json` each
    Batch {
        output_dir: PathBuf,

        #[arg(required = true)]
        videos: Vec<PathBuf>,

        #[command(flatten)]
        options: ExtractOptions,
    },
}

fn load_config(options: &ExtractOptions) -> anyhow::Result<ExtractionConfig> {
    let mut config = match &options.config {
        Some(path) => ExtractionConfig::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ExtractionConfig::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default configuration");
            ExtractionConfig::default()
        }),
    };

    if let Some(backend) = options.backend {
        config.backend = backend;
    }
    if options.compact {
        config.pretty_output = false;
    }
    config.validate()?;
    Ok(config)
}

/// Flag that flips on Ctrl-C so running extractions stop between frames
fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handle = Arc::clone(&flag);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            handle.store(true, Ordering::Relaxed);
        }
    });
    flag
}

fn print_summary(summary: &ExtractionSummary) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

fn batch_output(output_dir: &Path, video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pose".to_string());
    output_dir.join(format!("{}.json", stem))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Extract {
            video,
            output,
            options,
        } => {
            let config = load_config(&options)?;
            let cancel = cancel_on_ctrl_c();

            let summary = tokio::task::spawn_blocking(move || {
                ExtractionPipeline::from_config(config)?
                    .with_cancel_flag(cancel)
                    .run(&video, &output)
            })
            .await
            .context("extraction task panicked")?
            .context("pose extraction failed")?;

            print_summary(&summary)?;
        }

        Command::Inspect {
            file,
            num_keypoints,
        } => {
            let bytes =
                std::fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;
            let sequence = decode_with(&bytes, num_keypoints)
                .with_context(|| format!("{} is not a valid pose sequence", file.display()))?;

            let detected_frames = sequence.detected_frames();
            print_summary(&ExtractionSummary {
                source: sequence.source().to_string(),
                frame_count: sequence.frame_count(),
                detected_frames,
                empty_frames: sequence.frame_count() - detected_frames,
                duration_s: sequence.duration_s(),
                frame_rate: sequence.frame_rate(),
                output_location: file,
            })?;
        }

        Command::Batch {
            output_dir,
            videos,
            options,
        } => {
            let config = load_config(&options)?;
            let jobs: Vec<ExtractionJob> = videos
                .iter()
                .map(|video| ExtractionJob::new(video, batch_output(&output_dir, video)))
                .collect();

            let results =
                extract_batch_with_cancel(jobs, config, build_provider, cancel_on_ctrl_c()).await?;

            let mut failed = 0;
            for (video, result) in videos.iter().zip(results) {
                match result {
                    Ok(summary) => print_summary(&summary)?,
                    Err(e) => {
                        failed += 1;
                        eprintln!("{}: {}", video.display(), e);
                    }
                }
            }
            if failed > 0 {
                bail!("{} of {} videos failed", failed, videos.len());
            }
        }
    }

    Ok(())
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::PathBuf;

use newsreel::config::AppConfig;
use newsreel::events::ProgressUpdate;
use newsreel::models::{ExportOutcome, NewsItem};
use newsreel::pipeline::{Backends, ReelPipeline};
use newsreel::utils::{logger, tools};

#[derive(Parser)]
#[command(name = "newsreel")]
#[command(about = "Turn short news texts into a narrated slideshow video", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the news video
    Render {
        /// News file: JSON array of strings or one item per line
        #[arg(short, long)]
        news: PathBuf,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output video path (overrides the configuration)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip narration, every segment gets the default duration
        #[arg(long)]
        no_tts: bool,

        /// Generate images for items that have none
        #[arg(long)]
        generate_images: bool,
    },

    /// Validate the configuration and look for ffmpeg
    Check {
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            news,
            config,
            output,
            no_tts,
            generate_images,
        } => {
            let mut config = AppConfig::load(config.as_deref())?;
            if let Some(output) = output {
                config.paths.output_path = output;
            }
            if no_tts {
                config.tts.enabled = false;
            }
            if generate_images {
                config.images.enabled = true;
            }

            let raw = std::fs::read_to_string(&news)
                .with_context(|| format!("Cannot read news file {}", news.display()))?;
            let items = NewsItem::parse_list(&raw);
            if items.is_empty() {
                warn!("News file {} contains no items", news.display());
            }

            let backends = Backends::from_config(&config)?;
            let (tx, mut rx) = tokio::sync::mpsc::channel(64);
            let pipeline = ReelPipeline::new(&config, backends)?.with_progress(tx);

            let reporter = tokio::spawn(async move {
                while let Some(update) = rx.recv().await {
                    match update {
                        ProgressUpdate::NewsItem { id, total } => info!("News item {}/{}", id, total),
                        ProgressUpdate::ChunkSkipped {
                            news_id,
                            chunk,
                            reason,
                        } => warn!("Segment {}.{} skipped: {}", news_id, chunk, reason),
                        ProgressUpdate::Exporting { segments } => info!("Encoding {} segments", segments),
                        _ => {}
                    }
                }
            });

            let outcome = pipeline.run(&items).await;
            drop(pipeline);
            let _ = reporter.await;

            match outcome {
                Ok(ExportOutcome::Exported { path, .. }) => {
                    println!("{}", path.display());
                    Ok(())
                }
                Ok(ExportOutcome::NothingToExport) => {
                    println!("Nothing to export");
                    Ok(())
                }
                Err(e) => {
                    error!("{}", e);
                    Err(e.into())
                }
            }
        }
        Commands::Check { config } => {
            let config = AppConfig::load(config.as_deref())?;
            config.validate()?;
            let ffmpeg = tools::find_ffmpeg()?;
            println!(
                "Configuration OK, ffmpeg {} at {}",
                ffmpeg.version.as_deref().unwrap_or("(unknown version)"),
                ffmpeg.path.display()
            );
            Ok(())
        }
    }
}

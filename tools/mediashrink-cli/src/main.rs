//! MediaShrink CLI: shrink media files to a size budget.
//!
//! Usage:
//!   mediashrink image <PATH>     Re-encode an image under a KB target
//!   mediashrink video <PATH>     Re-encode a video under a MB target
//!   mediashrink audio <PATH>     Extract the audio track as WebM
//!   mediashrink lookup <URL>     Resolve a short-video link
//!   mediashrink check            Check host capabilities
//!   mediashrink config           Show the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mediashrink_common::config::AppConfig;
use tokio_util::sync::CancellationToken;

mod commands;

#[derive(Parser)]
#[command(
    name = "mediashrink",
    about = "Shrink images, videos, and audio to a size budget",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-encode an image until it fits a size target
    Image {
        /// Image file to compress
        path: PathBuf,

        /// Target size in KB (10-5000, steps of 10)
        #[arg(short, long)]
        target_kb: Option<u64>,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Re-encode a video at a bitrate derived from a size target
    Video {
        /// Video file to compress
        path: PathBuf,

        /// Target size in MB (1-20, steps of 0.5)
        #[arg(short, long)]
        target_mb: Option<f64>,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use the deterministic simulated host instead of GStreamer
        #[arg(long)]
        simulate: bool,

        /// Play length assumed by the simulated host (seconds)
        #[arg(long, default_value = "15.0")]
        sim_duration: f64,
    },

    /// Extract the audio track of a media file
    Audio {
        /// Media file to extract from
        path: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use the deterministic simulated host instead of GStreamer
        #[arg(long)]
        simulate: bool,

        /// Play length assumed by the simulated host (seconds)
        #[arg(long, default_value = "15.0")]
        sim_duration: f64,
    },

    /// Resolve a TikTok link to its title, author, and download links
    Lookup {
        /// Share link
        url: String,
    },

    /// Check host capabilities
    Check,

    /// Print the effective configuration as JSON
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    mediashrink_common::logging::init_logging(&logging);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    match cli.command {
        Commands::Image {
            path,
            target_kb,
            output,
        } => commands::image::run(&config, path, target_kb, output).await,
        Commands::Video {
            path,
            target_mb,
            output,
            simulate,
            sim_duration,
        } => {
            commands::video::run(
                &config,
                path,
                target_mb,
                output,
                simulate.then_some(sim_duration),
                cancel,
            )
            .await
        }
        Commands::Audio {
            path,
            output,
            simulate,
            sim_duration,
        } => {
            commands::audio::run(
                &config,
                path,
                output,
                simulate.then_some(sim_duration),
                cancel,
            )
            .await
        }
        Commands::Lookup { url } => commands::lookup::run(&config, url).await,
        Commands::Check => commands::check::run(&config),
        Commands::Config { save } => commands::config::run(&config, save),
    }
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Interrupt received; tearing down capture");
        cancel.cancel();
    }
}

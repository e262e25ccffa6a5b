//! FrameGen CLI - Command-line interface for frame model generation

mod commands;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use commands::{frames, jobs, model, Context};
use tracing_subscriber::layer::Layer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "framegen")]
#[command(about = "Generate AR-ready 3D models of picture frames", long_about = None)]
#[command(version)]
struct Cli {
    /// Frame catalog file
    #[arg(long, global = true, default_value = "frames.toml")]
    frames: String,

    /// Config file (default: ~/.framegen/config.toml layered under .framegen/config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate both models for one frame
    Generate {
        /// Frame id from the catalog
        frame_id: String,

        /// Regenerate even if both models exist
        #[arg(long)]
        force: bool,

        /// Print stage events as the job runs
        #[arg(long)]
        follow: bool,
    },

    /// Generate models for several frames
    Batch {
        /// Frame ids (ignored with --missing)
        ids: Vec<String>,

        /// Every catalog frame missing a model
        #[arg(long)]
        missing: bool,

        /// Regenerate even if both models exist
        #[arg(long)]
        force: bool,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show a persisted job record
    Status {
        /// Job record id
        job_id: String,
    },

    /// Build and validate a GLB locally, without the queue
    Synthesize {
        /// Frame id from the catalog
        frame_id: String,

        /// Output GLB path
        #[arg(short, long)]
        out: String,
    },

    /// Validate a GLB file
    Validate {
        /// Path to the GLB
        path: String,

        /// Size ceiling in bytes
        #[arg(long)]
        max_bytes: Option<u64>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Convert a GLB to USDZ with the configured strategies
    Convert {
        /// Input GLB
        glb: String,

        /// Output USDZ path
        #[arg(short, long)]
        out: String,

        /// Fail instead of copying the GLB when no converter works
        #[arg(long)]
        no_fallback: bool,
    },

    /// List catalog frames
    Frames {
        /// Only frames missing a model
        #[arg(long)]
        missing: bool,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn init_logging(json: bool) -> Result<()> {
    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .flatten_event(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("failed to install the log subscriber")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs)?;

    let ctx = Context::load(cli.config.as_deref(), &cli.frames)?;

    match cli.command {
        Commands::Generate {
            frame_id,
            force,
            follow,
        } => jobs::run_generate(&ctx, &frame_id, force, follow).await,
        Commands::Batch {
            ids,
            missing,
            force,
            format,
        } => jobs::run_batch(&ctx, ids, missing, force, &format).await,
        Commands::Status { job_id } => jobs::run_status(&ctx, &job_id).await,
        Commands::Synthesize { frame_id, out } => model::run_synthesize(&ctx, &frame_id, &out).await,
        Commands::Validate {
            path,
            max_bytes,
            format,
        } => model::run_validate(&ctx, &path, max_bytes, &format),
        Commands::Convert {
            glb,
            out,
            no_fallback,
        } => model::run_convert(&ctx, &glb, &out, no_fallback).await,
        Commands::Frames { missing, format } => frames::run(&ctx, missing, &format).await,
    }
}

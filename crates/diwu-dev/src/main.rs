//! diwu dev server and CLI.
//!
//! `serve` runs the dispatch front end for interactive development,
//! `transform` runs the transform hook on one file and `publish` runs the
//! completion hook of a production build.

mod handler;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use diwu_core::{ConfigOverrides, DiwuConfig, DiwuPlugin, InlineBundler, MarkerSet};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "diwu-dev")]
#[command(about = "Development server and build hooks for diwu server functions")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve `<base-path>/{hash}-{method}` calls
    Serve {
        /// Port to listen on (0 = auto-assign)
        #[arg(short, long, default_value = "0")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Route prefix for dispatch calls
        #[arg(long)]
        base_path: Option<String>,

        /// Program used to run worker scripts
        #[arg(long)]
        runtime: Option<String>,

        /// Per-call worker deadline in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Transform one module and print the client code
    Transform {
        /// Module to transform
        file: PathBuf,

        /// Bundle dependency-free modules without the external bundler
        #[arg(long)]
        inline: bool,
    },
    /// Copy worker scripts into the output directory
    Publish {
        /// Output directory (relative to the project root)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries DIWU_PORT and transform output.
    let log_level = if args.debug { "debug" } else { "info" };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let root = match args.root {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let mut config = DiwuConfig::resolve(&root)?;

    match args.command {
        Command::Serve {
            port,
            host,
            base_path,
            runtime,
            timeout_secs,
        } => {
            config.apply(ConfigOverrides {
                base_path,
                runtime,
                timeout_secs,
                ..Default::default()
            })?;
            serve(config, &host, port).await
        }
        Command::Transform { file, inline } => transform(config, file, inline),
        Command::Publish { out_dir } => {
            config.apply(ConfigOverrides {
                out_dir,
                ..Default::default()
            })?;
            publish(config)
        }
    }
}

async fn serve(config: DiwuConfig, host: &str, port: u16) -> Result<()> {
    info!("Starting diwu dev server");

    let state = server::AppState::from_config(config)?;
    let addr = server::start_server(state, host, port).await?;

    // Print port for the parent process to read (intentional stdout)
    println!("DIWU_PORT={}", addr.port());

    info!("diwu dev server running on {}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}

fn transform(config: DiwuConfig, file: PathBuf, inline: bool) -> Result<()> {
    let path = if file.is_absolute() {
        file
    } else {
        config.root.join(file)
    };
    let source = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let module_id = path.to_string_lossy().into_owned();

    let mut builder = DiwuPlugin::builder(config.clone());
    if inline {
        builder = builder.bundler(InlineBundler::new(MarkerSet::from_config(&config)));
    }
    let plugin = builder.build()?;

    match plugin.transform_module(&source, &module_id)? {
        Some(output) => {
            print!("{}", output.code);
            match output.artifact {
                Some(artifact) => info!("Worker script: {}", artifact.display()),
                None => info!("No worker script was produced"),
            }
        }
        None => info!("[diwu]: \"{}\" has no remote exports, unchanged", module_id),
    }
    Ok(())
}

fn publish(config: DiwuConfig) -> Result<()> {
    let plugin = DiwuPlugin::new(config)?;
    if plugin.on_finish(false)? == 0 {
        info!("No worker scripts found in {}", plugin.config().scripts_dir().display());
    }
    Ok(())
}

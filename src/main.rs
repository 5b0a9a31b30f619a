//! elbebe CLI
//!
//! Run from a project directory:
//!   elbebe dev [--host H] [--port P] [--config FILE] [-v]
//!
//! Serves `src/`, renders page generators, and reloads the browser on change.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use elbebe::config::CONFIG_FILE;
use elbebe::{run_server, DevConfig, ProjectPaths};

#[derive(Parser)]
#[command(name = "elbebe", version, about = "Dev server for plain-HTML projects")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the development server in the current directory.
    Dev(DevArgs),
}

#[derive(Args)]
struct DevArgs {
    /// Address to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind.
    #[arg(short, long)]
    port: Option<u16>,

    /// Wall-clock limit for one page render, in milliseconds.
    #[arg(long, value_name = "MS")]
    render_timeout_ms: Option<u64>,

    /// Page renders allowed to run at the same time.
    #[arg(long, value_name = "N")]
    max_concurrent_renders: Option<usize>,

    /// Heap limit for one page render, in MiB.
    #[arg(long, value_name = "MB")]
    max_heap_mb: Option<usize>,

    /// Config file [default: elbebe.toml in the project root]
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

impl DevArgs {
    fn apply(self, config: &mut DevConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ms) = self.render_timeout_ms {
            config.render.timeout_ms = Some(ms);
        }
        if let Some(n) = self.max_concurrent_renders {
            config.render.max_concurrent = n;
        }
        if let Some(mb) = self.max_heap_mb {
            config.render.max_heap_size = Some(mb.saturating_mul(1024 * 1024));
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let Commands::Dev(args) = cli.command;

    let filter = if args.verbose {
        EnvFilter::new("elbebe=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("elbebe=info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let paths = ProjectPaths::from_current_dir()?;

    let mut config = match &args.config {
        Some(file) => DevConfig::load(file, true)?,
        None => DevConfig::load(&paths.root.join(CONFIG_FILE), false)?,
    };
    args.apply(&mut config);

    run_server(paths, config).await
}

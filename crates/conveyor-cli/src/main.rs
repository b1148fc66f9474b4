//! Conveyor CLI tool.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "conveyor")]
#[command(about = "Run remote builds and stream their logs", long_about = None)]
struct Cli {
    /// Settings file (defaults to ./conveyor.kdl when present)
    #[arg(long, global = true, env = "CONVEYOR_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a build and stream its log to stdout
    Build {
        /// Repository to build, e.g. remind101/acme-inc
        #[arg(long)]
        repository: String,
        /// Revision to build
        #[arg(long)]
        sha: String,
        /// Override the project name prefix
        #[arg(long)]
        project_prefix: Option<String>,
        /// Override the AWS region
        #[arg(long, env = "AWS_REGION")]
        region: Option<String>,
        /// Stop following the log after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Validate a settings file
    Validate {
        /// Path to the settings file (defaults to --config, then ./conveyor.kdl)
        path: Option<PathBuf>,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Build {
            repository,
            sha,
            project_prefix,
            region,
            timeout,
        } => {
            let settings = commands::resolve_settings(cli.config.as_deref())?;
            let settings = commands::apply_overrides(settings, project_prefix, region)?;
            commands::build::run(settings, repository, sha, timeout).await?;
        }
        Commands::Validate { path } => {
            commands::validate(&commands::validate_target(path, cli.config))?;
        }
    }

    Ok(())
}

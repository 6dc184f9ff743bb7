//! wasmer-pipeline CLI.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use wasmer_pipeline_config::PipelineEnv;

mod commands;

#[derive(Parser)]
#[command(name = "wasmer-pipeline")]
#[command(about = "Build a Rust project for wasix and deploy it to Wasmer Edge", long_about = None)]
struct Cli {
    /// Pipeline settings file (defaults to wasmer-pipeline.kdl in the source directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline (build then deploy, or the named jobs in order)
    Run {
        /// Source directory
        #[arg(long, default_value = ".")]
        src: String,
        /// Do not mount the build cache when deploying
        #[arg(long)]
        no_cache: bool,
        /// Jobs to run
        jobs: Vec<String>,
    },
    /// Build the project (wasix)
    Build {
        /// Source directory
        #[arg(long, default_value = ".")]
        src: String,
        /// Extra arguments for `cargo wasix build`
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Deploy to Wasmer Edge
    Deploy {
        /// Source directory
        #[arg(long, default_value = ".")]
        src: String,
        /// Wasmer token or secret id; WASMER_TOKEN takes precedence
        #[arg(long)]
        token: Option<String>,
        /// Mount the build cache and skip the source's target directory
        #[arg(long)]
        cache: bool,
        /// Extra arguments for `wasmer deploy`
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// List available jobs
    Jobs,
    /// Generate a CI workflow running the pipeline
    Generate {
        /// CI provider
        #[arg(value_enum)]
        provider: commands::ProviderArg,
        /// Write the workflow to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Write the workflow to the provider's conventional location
        #[arg(long, conflicts_with = "output")]
        write: bool,
    },
    /// Validate a pipeline settings file
    Validate {
        /// Path to the settings file
        #[arg(default_value = "wasmer-pipeline.kdl")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let env = PipelineEnv::from_env();
    debug!(env = %env, "Read process environment");

    match cli.command {
        Commands::Run { src, no_cache, jobs } => {
            commands::run::run(&env, cli.config.as_deref(), &src, !no_cache, jobs).await?;
        }
        Commands::Build { src, args } => {
            commands::run::build(&env, cli.config.as_deref(), &src, args).await?;
        }
        Commands::Deploy {
            src,
            token,
            cache,
            args,
        } => {
            commands::run::deploy(&env, cli.config.as_deref(), &src, token, cache, args).await?;
        }
        Commands::Jobs => {
            commands::jobs();
        }
        Commands::Generate {
            provider,
            output,
            write,
        } => {
            commands::generate(provider, output, write)?;
        }
        Commands::Validate { path } => {
            commands::validate(&path)?;
        }
    }

    Ok(())
}

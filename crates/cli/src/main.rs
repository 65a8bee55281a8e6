//! App Longevity Predictor CLI
//!
//! A command-line tool for running longevity predictions locally and
//! inspecting the discovered model registry.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{models, predict};
use std::path::PathBuf;
use std::time::Duration;

/// App Longevity Predictor CLI
#[derive(Parser)]
#[command(name = "alp")]
#[command(author, version, about = "CLI for App Longevity Predictor", long_about = None)]
pub struct Cli {
    /// Model directory (can also be set via ALP_MODEL_DIR env var)
    #[arg(long, env = "ALP_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Model used when a command does not name one
    #[arg(long, env = "ALP_DEFAULT_MODEL")]
    pub default_model: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict how long an app will stay alive in the stores
    Predict {
        /// App name to look up in the App Store and Play Store
        app_name: String,

        /// Model to score with (defaults to the configured model)
        #[arg(long, short)]
        model: Option<String>,

        /// Compare against competitors (not supported, accepted for compatibility)
        #[arg(long)]
        compare_competitors: bool,

        /// Overall timeout per store lookup, in seconds
        #[arg(long, default_value = "15")]
        timeout: u64,
    },

    /// Inspect discovered models
    #[command(subcommand)]
    Models(ModelsCommands),
}

#[derive(Subcommand)]
pub enum ModelsCommands {
    /// List discovered models
    List,

    /// Show one model's registry entry
    Info {
        /// Model name, with or without its extension
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .init();

    let file_config = config::Config::load()?;
    let settings = file_config.merge(cli.model_dir, cli.default_model, cli.format);

    match cli.command {
        Commands::Predict {
            app_name,
            model,
            compare_competitors,
            timeout,
        } => {
            predict::run_prediction(
                &settings,
                &app_name,
                model.as_deref(),
                compare_competitors,
                Duration::from_secs(timeout),
            )
            .await?;
        }
        Commands::Models(models_cmd) => match models_cmd {
            ModelsCommands::List => {
                models::list_models(&settings)?;
            }
            ModelsCommands::Info { name } => {
                models::show_model(&settings, &name)?;
            }
        },
    }

    Ok(())
}

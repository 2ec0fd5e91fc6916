//! California housing price predictor CLI
//!
//! A command-line tool for fetching the dataset, training and registering
//! models, inspecting tracked runs, and smoke-checking a running service.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{fetch, predict, registry, train};
use housing_core::{dataset, pipeline, regression, tracking};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// California housing price predictor CLI
#[derive(Parser)]
#[command(name = "housing")]
#[command(author, version, about = "CLI for the California housing price predictor", long_about = None)]
pub struct Cli {
    /// Tracking store location (file:<path> or a plain path)
    #[arg(long, env = "HOUSING_TRACKING_URI", default_value = tracking::DEFAULT_TRACKING_URI)]
    pub tracking_uri: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download the dataset and write the training CSV
    Fetch {
        /// Source URL of the cal_housing.tgz archive
        #[arg(long, default_value = dataset::DEFAULT_DATASET_URL)]
        url: String,

        /// Destination CSV path
        #[arg(long, short, default_value = dataset::DEFAULT_DATASET_PATH)]
        output: PathBuf,
    },

    /// Train the candidate models and register the best one
    Train {
        /// Dataset CSV written by `fetch`
        #[arg(long, default_value = dataset::DEFAULT_DATASET_PATH)]
        data: PathBuf,

        /// Experiment the runs are logged under
        #[arg(long, default_value = pipeline::DEFAULT_EXPERIMENT)]
        experiment: String,

        /// Registry name for the winning model
        #[arg(long, default_value = pipeline::DEFAULT_MODEL_NAME)]
        model_name: String,

        /// Share of rows held out for evaluation
        #[arg(long, default_value_t = dataset::DEFAULT_TEST_SIZE)]
        test_size: f64,

        /// Split seed
        #[arg(long, default_value_t = dataset::DEFAULT_SPLIT_SEED)]
        seed: u64,

        /// Depth bound of the decision tree
        #[arg(long, default_value_t = regression::DEFAULT_MAX_DEPTH)]
        max_depth: usize,
    },

    /// Send the sample record to a running service
    Predict(predict::PredictArgs),

    /// List registered versions of a model
    Models {
        /// Registered model name
        #[arg(long, default_value = pipeline::DEFAULT_MODEL_NAME)]
        model_name: String,
    },

    /// List tracked runs of an experiment
    Runs {
        /// Experiment name
        #[arg(long, default_value = pipeline::DEFAULT_EXPERIMENT)]
        experiment: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Commands::Fetch { url, output } => fetch::fetch_dataset(&url, &output, cli.format).await,
        Commands::Train {
            data,
            experiment,
            model_name,
            test_size,
            seed,
            max_depth,
        } => {
            let config = pipeline::PipelineConfig {
                dataset_path: data,
                experiment,
                model_name,
                test_size,
                seed,
                max_depth,
            };
            train::train_models(&cli.tracking_uri, config, cli.format).await
        }
        Commands::Predict(args) => predict::predict_sample(args, cli.format).await,
        Commands::Models { model_name } => {
            registry::list_models(&cli.tracking_uri, &model_name, cli.format)
        }
        Commands::Runs { experiment } => {
            registry::list_runs(&cli.tracking_uri, &experiment, cli.format)
        }
    };

    if let Err(e) = &result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

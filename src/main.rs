use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use feature_pipeline::{
    alerts,
    commands::{build_features, build_sequences, train_tabular},
    config::PipelineConfig,
    lightgbm::LightgbmParams,
};
use log::{info, warn};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

const DEFAULT_MARKET_DATA_FILE: &str = "data/market-data.bin";
const DEFAULT_FEATURES_FILE: &str = "data/features.json";
const DEFAULT_SEQUENCES_FILE: &str = "data/sequences.bin";
const DEFAULT_MODEL_FILE: &str = "models/lightgbm_model.txt";

#[derive(Parser)]
#[command(name = "feature-pipeline")]
#[command(about = "Builds leakage-free training datasets from daily price bars")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the tabular feature dataset and write it as JSON
    BuildFeatures {
        /// Path to the market data snapshot file
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: Option<PathBuf>,
        /// Destination for the feature rows
        #[arg(short, long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Build split sequence windows for the recurrent trainer
    BuildSequences {
        /// Path to the market data snapshot file
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: Option<PathBuf>,
        /// Destination for the bincode sequence export
        #[arg(short, long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Train the tabular classifier behind the minimum-row safeguard
    TrainTabular {
        /// Path to the market data snapshot file
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: Option<PathBuf>,
        /// Destination for the trained model
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// LightGBM executable (defaults to LIGHTGBM_EXE, then PATH)
        #[arg(long, value_name = "PATH")]
        lightgbm: Option<PathBuf>,
        /// Number of boosting iterations
        #[arg(long)]
        num_iterations: Option<u32>,
        /// Learning rate
        #[arg(long)]
        learning_rate: Option<f64>,
        /// Maximum tree depth (-1 means no limit)
        #[arg(long)]
        max_depth: Option<i32>,
        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings: HashMap<String, String> = env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect();
    let config = PipelineConfig::from_settings_map(&settings)?;

    if alerts::init_webhook_endpoint_from_env().context("Invalid alert webhook configuration")? {
        info!("Alert webhook configured");
    } else {
        warn!(
            "{} is not set; training aborts will only be logged",
            alerts::ALERT_WEBHOOK_URL_ENV
        );
    }

    match cli.command {
        Commands::BuildFeatures { data_file, output } => {
            let market_data_path = resolve_path(data_file, DEFAULT_MARKET_DATA_FILE);
            let output_path = resolve_path(output, DEFAULT_FEATURES_FILE);
            build_features::run(&market_data_path, &output_path, &config)?;
        }
        Commands::BuildSequences { data_file, output } => {
            let market_data_path = resolve_path(data_file, DEFAULT_MARKET_DATA_FILE);
            let output_path = resolve_path(output, DEFAULT_SEQUENCES_FILE);
            build_sequences::run(&market_data_path, &output_path, &config)?;
        }
        Commands::TrainTabular {
            data_file,
            output,
            lightgbm,
            num_iterations,
            learning_rate,
            max_depth,
            seed,
        } => {
            let market_data_path = resolve_path(data_file, DEFAULT_MARKET_DATA_FILE);
            let output_model = resolve_path(output, DEFAULT_MODEL_FILE);
            let defaults = LightgbmParams::default();
            let params = LightgbmParams {
                num_iterations: num_iterations.unwrap_or(defaults.num_iterations),
                learning_rate: learning_rate.unwrap_or(defaults.learning_rate),
                max_depth: max_depth.unwrap_or(defaults.max_depth),
                seed: seed.unwrap_or(defaults.seed),
            };
            let notifier = alerts::configured_notifier(config.alert_timeout)
                .context("Failed to set up alert notifier")?;
            train_tabular::run(
                &market_data_path,
                output_model,
                lightgbm,
                params,
                &config,
                notifier.as_ref(),
            )?;
        }
    }

    Ok(())
}

fn resolve_path(cli_value: Option<PathBuf>, default: &str) -> PathBuf {
    cli_value.unwrap_or_else(|| PathBuf::from(default))
}

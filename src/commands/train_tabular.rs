use anyhow::Result;
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::alerts::AlertNotifier;
use crate::commands::market_data_snapshot::load_market_data;
use crate::config::PipelineConfig;
use crate::dataset::build_tabular_dataset;
use crate::lightgbm::{LightgbmCli, LightgbmParams};
use crate::training::{
    train_with_safeguard, TabularEstimator, TrainingOutcome, TRAINING_FEATURE_NAMES,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TabularTrainingSummary<'a> {
    hyperparameters: &'a LightgbmParams,
    feature_names: &'a [&'static str],
    outcome: &'a TrainingOutcome,
}

pub fn run(
    market_data_path: &Path,
    output_model: PathBuf,
    executable: Option<PathBuf>,
    params: LightgbmParams,
    config: &PipelineConfig,
    notifier: &dyn AlertNotifier,
) -> Result<TrainingOutcome> {
    info!("Starting tabular training");
    let estimator = LightgbmCli::new(executable, output_model, params);
    let outcome = train(market_data_path, config, notifier, &estimator)?;
    println!("Saved LightGBM model to {}", estimator.output_model().display());

    let summary = TabularTrainingSummary {
        hyperparameters: estimator.params(),
        feature_names: &TRAINING_FEATURE_NAMES,
        outcome: &outcome,
    };
    match serde_json::to_string(&summary) {
        Ok(payload) => println!("FEATURE_PIPELINE_TRAIN_SUMMARY={payload}"),
        Err(err) => warn!("Failed to serialize training summary: {err}"),
    }
    Ok(outcome)
}

/// Loads the snapshot, builds the tabular dataset and runs the safeguarded
/// training gate with the given estimator.
pub fn train(
    market_data_path: &Path,
    config: &PipelineConfig,
    notifier: &dyn AlertNotifier,
    estimator: &dyn TabularEstimator,
) -> Result<TrainingOutcome> {
    let market_data = load_market_data(market_data_path)?;
    let dataset = build_tabular_dataset(
        market_data.bars_by_ticker(),
        market_data.fundamentals(),
        config,
    );
    train_with_safeguard(&dataset, config, notifier, estimator)
}

use anyhow::Result;
use chrono::NaiveDate;
use log::info;
use serde::Serialize;

use crate::alerts::AlertNotifier;
use crate::config::PipelineConfig;
use crate::dataset::{TabularDataset, TabularRecord};
use crate::partition::chronological_split;
use crate::safeguard::TrainingSafeguard;

pub const TRAINING_FEATURE_COUNT: usize = 6;
pub const TRAINING_FEATURE_NAMES: [&str; TRAINING_FEATURE_COUNT] = [
    "momentum",
    "trend_ratio",
    "volatility_fraction",
    "volume_ratio",
    "valuation_ratio",
    "sentiment_score",
];

/// A row in the classifier's fixed input schema.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub date: NaiveDate,
    pub features: [f64; TRAINING_FEATURE_COUNT],
    pub label: u8,
}

impl TrainingRow {
    /// `None` when the record lacks static attributes or holds a non-finite value.
    pub fn from_record(record: &TabularRecord) -> Option<Self> {
        let row = &record.features;
        let attributes = row.attributes?;
        let features = [
            row.momentum,
            row.trend_ratio,
            row.volatility_fraction,
            row.volume_ratio,
            attributes.valuation_ratio,
            attributes.sentiment_score,
        ];
        if features.iter().any(|value| !value.is_finite()) {
            return None;
        }
        Some(Self {
            date: row.date,
            features,
            label: row.label,
        })
    }
}

pub fn collect_training_rows(dataset: &TabularDataset) -> Vec<TrainingRow> {
    dataset
        .records
        .iter()
        .filter_map(TrainingRow::from_record)
        .collect()
}

/// A tree-based binary classifier trained outside this crate.
pub trait TabularEstimator {
    fn fit(&self, train: &[TrainingRow], validation: &[TrainingRow]) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingOutcome {
    pub instrument_count: usize,
    pub train_rows: usize,
    pub validation_rows: usize,
    pub train_label_counts: [usize; 2],
    pub validation_label_counts: [usize; 2],
}

fn label_counts(rows: &[TrainingRow]) -> [usize; 2] {
    let mut counts = [0usize; 2];
    for row in rows {
        counts[usize::from(row.label.min(1))] += 1;
    }
    counts
}

/// Drops incomplete rows, enforces the minimum-row safeguard, splits
/// chronologically and only then hands the data to the estimator.
pub fn train_with_safeguard(
    dataset: &TabularDataset,
    config: &PipelineConfig,
    notifier: &dyn AlertNotifier,
    estimator: &dyn TabularEstimator,
) -> Result<TrainingOutcome> {
    let rows = collect_training_rows(dataset);
    info!(
        "{} of {} feature rows carry every training column",
        rows.len(),
        dataset.len()
    );

    TrainingSafeguard::new(config.min_training_rows).enforce(
        rows.len(),
        dataset.instrument_count,
        notifier,
    )?;

    let split = chronological_split(rows, config.split_fraction);
    info!(
        "Training set: {} rows, validation set: {} rows",
        split.train.len(),
        split.validation.len()
    );
    estimator.fit(&split.train, &split.validation)?;

    Ok(TrainingOutcome {
        instrument_count: dataset.instrument_count,
        train_rows: split.train.len(),
        validation_rows: split.validation.len(),
        train_label_counts: label_counts(&split.train),
        validation_label_counts: label_counts(&split.validation),
    })
}

use anyhow::{anyhow, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::commands::market_data_snapshot::load_market_data;
use crate::config::PipelineConfig;
use crate::dataset::{build_sequence_dataset, SequenceRecord};
use crate::models::IndicatorValues;
use crate::partition::chronological_split;

/// Split sequence samples handed to the recurrent trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceExport {
    pub window_length: usize,
    pub feature_count: usize,
    pub train: Vec<SequenceRecord>,
    pub validation: Vec<SequenceRecord>,
}

impl SequenceExport {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open sequence export at {}", path.display()))?;
        let export: SequenceExport = bincode::deserialize_from(BufReader::new(file))
            .context("Sequence export decode failed")?;
        if export.window_length.checked_add(IndicatorValues::COUNT) != Some(export.feature_count) {
            return Err(anyhow!(
                "Sequence export is inconsistent: {} features for a {}-step window",
                export.feature_count,
                export.window_length
            ));
        }
        for record in export.train.iter().chain(&export.validation) {
            let found = record.window.features().len();
            if found != export.feature_count {
                return Err(anyhow!(
                    "Sequence export is inconsistent: {} window ending {} holds {} features, expected {}",
                    record.ticker,
                    record.window.end_date,
                    found,
                    export.feature_count
                ));
            }
        }
        Ok(export)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let file = File::create(path)
            .with_context(|| format!("Unable to create sequence export at {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, self).context("Failed to serialize sequence export")?;
        writer
            .flush()
            .context("Failed to flush sequence export to disk")?;
        Ok(())
    }
}

pub fn run(
    market_data_path: &Path,
    output_path: &Path,
    config: &PipelineConfig,
) -> Result<SequenceExport> {
    let feature_count = config
        .sequence_window
        .checked_add(IndicatorValues::COUNT)
        .ok_or_else(|| anyhow!("SEQUENCE_WINDOW {} is too large", config.sequence_window))?;
    let market_data = load_market_data(market_data_path)?;
    let dataset = build_sequence_dataset(market_data.bars_by_ticker(), config);

    let split = chronological_split(dataset.records, config.split_fraction);
    info!(
        "Sequence split: {} training windows, {} validation windows",
        split.train.len(),
        split.validation.len()
    );

    let export = SequenceExport {
        window_length: config.sequence_window,
        feature_count,
        train: split.train,
        validation: split.validation,
    };
    export.save_to_file(output_path)?;
    info!("Wrote sequence export to {}", output_path.display());
    Ok(export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // Field-for-field twins of the export types, so a test can write files
    // the normal constructors refuse to build.
    #[derive(Serialize)]
    struct RawWindow {
        end_date: NaiveDate,
        features: Vec<f64>,
        target: f64,
    }

    #[derive(Serialize)]
    struct RawRecord {
        ticker: String,
        window: RawWindow,
    }

    #[derive(Serialize)]
    struct RawExport {
        window_length: usize,
        feature_count: usize,
        train: Vec<RawRecord>,
        validation: Vec<RawRecord>,
    }

    fn record(feature_len: usize) -> RawRecord {
        RawRecord {
            ticker: "AAA".to_string(),
            window: RawWindow {
                end_date: NaiveDate::from_ymd_opt(2021, 3, 4).unwrap(),
                features: vec![0.0; feature_len],
                target: 0.01,
            },
        }
    }

    fn write_raw(dir: &tempfile::TempDir, export: &RawExport) -> std::path::PathBuf {
        let path = dir.path().join("sequences.bin");
        let file = File::create(&path).unwrap();
        bincode::serialize_into(BufWriter::new(file), export).unwrap();
        path
    }

    #[test]
    fn well_formed_export_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_raw(
            &dir,
            &RawExport {
                window_length: 3,
                feature_count: 7,
                train: vec![record(7)],
                validation: vec![record(7)],
            },
        );
        let export = SequenceExport::load_from_file(&path).unwrap();
        assert_eq!(export.train[0].window.window_length(), 3);
        assert_eq!(export.validation[0].window.returns().len(), 3);
    }

    #[test]
    fn window_shorter_than_indicator_block_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_raw(
            &dir,
            &RawExport {
                window_length: 60,
                feature_count: 64,
                train: vec![record(2)],
                validation: Vec::new(),
            },
        );
        let err = SequenceExport::load_from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("decode failed"), "{err:#}");
    }

    #[test]
    fn window_disagreeing_with_header_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_raw(
            &dir,
            &RawExport {
                window_length: 60,
                feature_count: 64,
                train: vec![record(64)],
                validation: vec![record(14)],
            },
        );
        let err = SequenceExport::load_from_file(&path).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("AAA window ending 2021-03-04"), "{message}");
        assert!(message.contains("holds 14 features, expected 64"), "{message}");
    }

    #[test]
    fn oversized_window_setting_is_an_error() {
        let config = PipelineConfig {
            sequence_window: usize::MAX,
            ..PipelineConfig::default()
        };
        let err = run(
            Path::new("/nonexistent/market-data.bin"),
            Path::new("/nonexistent/sequences.bin"),
            &config,
        )
        .unwrap_err();
        assert!(err.to_string().contains("SEQUENCE_WINDOW"), "{err}");
    }
}

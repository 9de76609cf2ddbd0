use anyhow::{Context, Result};
use log::info;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::commands::market_data_snapshot::load_market_data;
use crate::config::PipelineConfig;
use crate::dataset::{build_tabular_dataset, TabularDataset};

/// Builds the attribute-merged tabular dataset and writes it as a JSON array
/// of records with named columns.
pub fn run(
    market_data_path: &Path,
    output_path: &Path,
    config: &PipelineConfig,
) -> Result<TabularDataset> {
    let market_data = load_market_data(market_data_path)?;
    let dataset = build_tabular_dataset(
        market_data.bars_by_ticker(),
        market_data.fundamentals(),
        config,
    );

    write_json(&dataset, output_path)?;
    info!(
        "Wrote {} feature rows to {}",
        dataset.len(),
        output_path.display()
    );
    if !dataset.failures.is_empty() {
        info!(
            "{} instrument(s) skipped as malformed",
            dataset.failures.len()
        );
    }
    Ok(dataset)
}

fn write_json(dataset: &TabularDataset, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let file = File::create(output_path)
        .with_context(|| format!("Unable to create {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &dataset.records)
        .context("Failed to serialize feature rows")?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", output_path.display()))?;
    Ok(())
}

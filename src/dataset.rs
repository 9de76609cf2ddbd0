//! Builds datasets across instruments.
//!
//! Each instrument is processed independently on the rayon pool. A malformed
//! instrument is logged and skipped without affecting the others. Outputs are
//! concatenated in ticker order and then stably sorted by date, so every
//! instrument keeps its internal order and a positional split is also a
//! calendar split.

use chrono::NaiveDate;
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::PipelineConfig;
use crate::fundamentals::{merge_static_attributes, AttributeLookup};
use crate::models::{FeatureVector, PriceBar, PriceSeries};
use crate::sequence::{windowize, FeatureWindow};
use crate::tabular::assemble_feature_table;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentFailure {
    pub ticker: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularRecord {
    pub ticker: String,
    #[serde(flatten)]
    pub features: FeatureVector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub ticker: String,
    pub window: FeatureWindow,
}

#[derive(Debug, Clone, Default)]
pub struct TabularDataset {
    pub records: Vec<TabularRecord>,
    pub instrument_count: usize,
    pub failures: Vec<InstrumentFailure>,
}

impl TabularDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Counts of label 0 and label 1.
    pub fn label_histogram(&self) -> [usize; 2] {
        let mut histogram = [0usize; 2];
        for record in &self.records {
            histogram[usize::from(record.features.label.min(1))] += 1;
        }
        histogram
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.records.first()?.features.date;
        let last = self.records.last()?.features.date;
        Some((first, last))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SequenceDataset {
    pub records: Vec<SequenceRecord>,
    pub instrument_count: usize,
    pub failures: Vec<InstrumentFailure>,
}

impl SequenceDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.records.first()?.window.end_date;
        let last = self.records.last()?.window.end_date;
        Some((first, last))
    }
}

struct InstrumentOutputs<T> {
    per_instrument: Vec<(String, Vec<T>)>,
    failures: Vec<InstrumentFailure>,
}

fn process_instruments<T, F>(
    bars_by_ticker: &BTreeMap<String, Vec<PriceBar>>,
    build: F,
) -> InstrumentOutputs<T>
where
    T: Send,
    F: Fn(&PriceSeries) -> Vec<T> + Sync,
{
    let results: Vec<(String, Result<Vec<T>, String>)> = bars_by_ticker
        .par_iter()
        .map(|(ticker, bars)| {
            let result = PriceSeries::new(ticker.clone(), bars.clone())
                .map(|series| build(&series))
                .map_err(|err| err.to_string());
            (ticker.clone(), result)
        })
        .collect();

    let mut per_instrument = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (ticker, result) in results {
        match result {
            Ok(rows) => per_instrument.push((ticker, rows)),
            Err(reason) => {
                warn!("Skipping {ticker}: {reason}");
                failures.push(InstrumentFailure { ticker, reason });
            }
        }
    }

    InstrumentOutputs {
        per_instrument,
        failures,
    }
}

pub fn build_tabular_dataset(
    bars_by_ticker: &BTreeMap<String, Vec<PriceBar>>,
    lookup: &AttributeLookup,
    config: &PipelineConfig,
) -> TabularDataset {
    info!(
        "Generating feature rows in parallel for {} tickers",
        bars_by_ticker.len()
    );
    let outputs = process_instruments(bars_by_ticker, |series| {
        let rows = assemble_feature_table(series, &config.indicators, &config.labels);
        merge_static_attributes(rows, series.ticker(), lookup)
    });

    let instrument_count = outputs.per_instrument.len();
    let mut records: Vec<TabularRecord> = outputs
        .per_instrument
        .into_iter()
        .flat_map(|(ticker, rows)| {
            rows.into_iter().map(move |features| TabularRecord {
                ticker: ticker.clone(),
                features,
            })
        })
        .collect();
    records.sort_by_key(|record| record.features.date);

    let dataset = TabularDataset {
        records,
        instrument_count,
        failures: outputs.failures,
    };
    let histogram = dataset.label_histogram();
    match dataset.date_range() {
        Some((start, end)) => info!(
            "Built {} feature rows from {} instruments ({} to {}; label 0={}, label 1={})",
            dataset.len(),
            dataset.instrument_count,
            start,
            end,
            histogram[0],
            histogram[1]
        ),
        None => info!(
            "Built no feature rows from {} instruments",
            dataset.instrument_count
        ),
    }
    dataset
}

pub fn build_sequence_dataset(
    bars_by_ticker: &BTreeMap<String, Vec<PriceBar>>,
    config: &PipelineConfig,
) -> SequenceDataset {
    info!(
        "Generating {}-step windows in parallel for {} tickers",
        config.sequence_window,
        bars_by_ticker.len()
    );
    let outputs = process_instruments(bars_by_ticker, |series| {
        windowize(series, config.sequence_window, &config.indicators)
    });

    let instrument_count = outputs.per_instrument.len();
    let mut records: Vec<SequenceRecord> = outputs
        .per_instrument
        .into_iter()
        .flat_map(|(ticker, windows)| {
            windows.into_iter().map(move |window| SequenceRecord {
                ticker: ticker.clone(),
                window,
            })
        })
        .collect();
    records.sort_by_key(|record| record.window.end_date);

    let dataset = SequenceDataset {
        records,
        instrument_count,
        failures: outputs.failures,
    };
    match dataset.date_range() {
        Some((start, end)) => info!(
            "Built {} windows from {} instruments ({} to {})",
            dataset.len(),
            dataset.instrument_count,
            start,
            end
        ),
        None => info!(
            "Built no windows from {} instruments",
            dataset.instrument_count
        ),
    }
    dataset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fundamentals::StaticAttributes;
    use crate::models::test_support::bars_from_closes;

    fn rising(len: usize) -> Vec<PriceBar> {
        bars_from_closes(&(0..len).map(|i| 100.0 + i as f64).collect::<Vec<_>>())
    }

    fn market() -> BTreeMap<String, Vec<PriceBar>> {
        let mut broken = rising(230);
        broken.swap(10, 11);
        BTreeMap::from([
            ("AAA".to_string(), rising(260)),
            ("BAD".to_string(), broken),
            ("CCC".to_string(), rising(230)),
            ("SHORT".to_string(), rising(50)),
        ])
    }

    #[test]
    fn malformed_instrument_is_skipped_and_others_continue() {
        let dataset =
            build_tabular_dataset(&market(), &AttributeLookup::new(), &PipelineConfig::default());

        assert_eq!(dataset.instrument_count, 3);
        assert_eq!(dataset.failures.len(), 1);
        assert_eq!(dataset.failures[0].ticker, "BAD");
        assert_eq!(dataset.len(), 55 + 25);
        assert!(dataset.records.iter().all(|r| r.ticker != "SHORT"));
    }

    #[test]
    fn concatenation_keeps_per_instrument_order_and_sorts_by_date() {
        let dataset =
            build_tabular_dataset(&market(), &AttributeLookup::new(), &PipelineConfig::default());
        assert!(dataset
            .records
            .windows(2)
            .all(|pair| pair[0].features.date <= pair[1].features.date));

        for ticker in ["AAA", "CCC"] {
            let dates: Vec<_> = dataset
                .records
                .iter()
                .filter(|r| r.ticker == ticker)
                .map(|r| r.features.date)
                .collect();
            assert!(dates.windows(2).all(|pair| pair[0] < pair[1]));
        }
        // Same-day rows keep ticker order.
        let same_day: Vec<_> = dataset
            .records
            .iter()
            .filter(|r| r.features.date == dataset.records[0].features.date)
            .map(|r| r.ticker.as_str())
            .collect();
        assert_eq!(same_day, vec!["AAA", "CCC"]);
    }

    #[test]
    fn attributes_are_merged_per_ticker() {
        let attributes = StaticAttributes {
            valuation_ratio: 20.0,
            profitability_ratio: 10.0,
            leverage_ratio: 0.5,
            sentiment_score: 0.1,
        };
        let lookup = AttributeLookup::from([("AAA".to_string(), attributes)]);
        let dataset = build_tabular_dataset(&market(), &lookup, &PipelineConfig::default());
        for record in &dataset.records {
            match record.ticker.as_str() {
                "AAA" => assert_eq!(record.features.attributes, Some(attributes)),
                _ => assert_eq!(record.features.attributes, None),
            }
        }
        assert_eq!(dataset.label_histogram(), [0, 80]);
    }

    #[test]
    fn sequence_dataset_counts_windows_per_instrument() {
        let config = PipelineConfig::default();
        let dataset = build_sequence_dataset(&market(), &config);
        assert_eq!(dataset.instrument_count, 3);
        // 260 - 61, 230 - 61, and nothing for 50 bars
        assert_eq!(dataset.len(), 199 + 169);
        assert!(dataset
            .records
            .iter()
            .all(|r| r.window.features().len() == config.sequence_window + 4));
        assert!(dataset
            .records
            .windows(2)
            .all(|pair| pair[0].window.end_date <= pair[1].window.end_date));
    }

    #[test]
    fn builds_are_deterministic() {
        let config = PipelineConfig::default();
        let first = build_tabular_dataset(&market(), &AttributeLookup::new(), &config);
        let second = build_tabular_dataset(&market(), &AttributeLookup::new(), &config);
        assert_eq!(first.records, second.records);
    }
}

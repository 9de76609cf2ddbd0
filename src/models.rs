use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;
use crate::fundamentals::StaticAttributes;

/// One calendar day of trading for one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    fn fields(&self) -> [(&'static str, f64); 5] {
        [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ]
    }
}

/// Date-ordered bars for a single instrument.
///
/// Construction rejects out-of-order or duplicate dates and negative or
/// non-finite fields, so every downstream transform can index bars freely.
/// Gaps between dates are allowed and never filled.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, DatasetError> {
        let ticker = ticker.into();

        for (index, bar) in bars.iter().enumerate() {
            for (field, value) in bar.fields() {
                if !value.is_finite() || value < 0.0 {
                    return Err(DatasetError::malformed(
                        &ticker,
                        format!(
                            "bar {} dated {} has invalid {} value {}",
                            index, bar.date, field, value
                        ),
                    ));
                }
            }

            if index == 0 {
                continue;
            }
            let previous = bars[index - 1].date;
            if bar.date == previous {
                return Err(DatasetError::malformed(
                    &ticker,
                    format!("duplicate bar date {} at index {}", bar.date, index),
                ));
            }
            if bar.date < previous {
                return Err(DatasetError::malformed(
                    &ticker,
                    format!(
                        "bar {} dated {} precedes previous bar dated {}",
                        index, bar.date, previous
                    ),
                ));
            }
        }

        Ok(Self { ticker, bars })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|bar| bar.date).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.low).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.volume).collect()
    }
}

/// The four indicator readings at a single bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorValues {
    pub momentum: f64,
    pub trend_ratio: f64,
    pub volatility_fraction: f64,
    pub volume_ratio: f64,
}

impl IndicatorValues {
    pub const COUNT: usize = 4;

    pub fn to_array(self) -> [f64; Self::COUNT] {
        [
            self.momentum,
            self.trend_ratio,
            self.volatility_fraction,
            self.volume_ratio,
        ]
    }
}

/// One row of the tabular dataset: a fully-defined bar with its label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub momentum: f64,
    pub trend_ratio: f64,
    pub volatility_fraction: f64,
    pub volume_ratio: f64,
    pub forward_return: f64,
    pub label: u8,
    #[serde(flatten)]
    pub attributes: Option<StaticAttributes>,
}

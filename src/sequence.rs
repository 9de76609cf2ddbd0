//! Fixed-length return windows for the recurrent predictor.
//!
//! Bar-aligned return `r[t] = ln(close[t] / close[t - 1])` exists for `t >= 1`.
//! The window ending at bar `t` holds `r[t - W + 1 ..= t]` followed by the four
//! indicators at bar `t`; its target is `r[t + 1]`. End bars run from `W` to
//! `L - 2`, giving `L - 1 - W` windows in ascending `t` order.

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::IndicatorConfig;
use crate::indicators::{calculate_log_returns, IndicatorSet};
use crate::models::{IndicatorValues, PriceSeries};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FeatureWindowFields")]
pub struct FeatureWindow {
    /// Date of bar `t`, the last bar the features may see.
    pub end_date: NaiveDate,
    features: Vec<f64>,
    pub target: f64,
}

#[derive(Deserialize)]
struct FeatureWindowFields {
    end_date: NaiveDate,
    features: Vec<f64>,
    target: f64,
}

impl TryFrom<FeatureWindowFields> for FeatureWindow {
    type Error = String;

    fn try_from(fields: FeatureWindowFields) -> Result<Self, Self::Error> {
        if fields.features.len() <= IndicatorValues::COUNT {
            return Err(format!(
                "window ending {} holds {} features, need at least {}",
                fields.end_date,
                fields.features.len(),
                IndicatorValues::COUNT + 1
            ));
        }
        Ok(Self {
            end_date: fields.end_date,
            features: fields.features,
            target: fields.target,
        })
    }
}

impl FeatureWindow {
    fn new(end_date: NaiveDate, returns: &[f64], indicators: IndicatorValues, target: f64) -> Self {
        let mut features = Vec::with_capacity(returns.len() + IndicatorValues::COUNT);
        features.extend_from_slice(returns);
        features.extend_from_slice(&indicators.to_array());
        Self {
            end_date,
            features,
            target,
        }
    }

    /// Returns followed by the four indicator values; always `W + 4` long.
    pub fn features(&self) -> &[f64] {
        &self.features
    }

    pub fn returns(&self) -> &[f64] {
        &self.features[..self.window_length()]
    }

    pub fn indicators(&self) -> IndicatorValues {
        let tail = &self.features[self.window_length()..];
        IndicatorValues {
            momentum: tail[0],
            trend_ratio: tail[1],
            volatility_fraction: tail[2],
            volume_ratio: tail[3],
        }
    }

    pub fn window_length(&self) -> usize {
        self.features.len().saturating_sub(IndicatorValues::COUNT)
    }
}

pub fn windowize(
    series: &PriceSeries,
    window_length: usize,
    indicator_config: &IndicatorConfig,
) -> Vec<FeatureWindow> {
    let len = series.len();
    let required = window_length.checked_add(2).unwrap_or(usize::MAX);
    if window_length == 0 || len < required {
        debug!(
            "{}: {} bars cannot fill a {}-return window plus target",
            series.ticker(),
            len,
            window_length
        );
        return Vec::new();
    }

    let closes = series.closes();
    // log_returns[j] is realized at bar j + 1
    let log_returns = calculate_log_returns(&closes);
    let indicators = IndicatorSet::compute(series, indicator_config);
    let bars = series.bars();

    (window_length..=len - 2)
        .map(|t| {
            FeatureWindow::new(
                bars[t].date,
                &log_returns[t - window_length..t],
                indicators.neutral_at(t),
                log_returns[t],
            )
        })
        .collect()
}

use log::debug;

use crate::config::{IndicatorConfig, LabelConfig};
use crate::indicators::IndicatorSet;
use crate::models::{FeatureVector, PriceSeries};

/// Relative change from `close[idx]` to `close[idx + horizon]`, if that bar exists.
pub fn compute_forward_return(closes: &[f64], idx: usize, horizon: usize) -> Option<f64> {
    let future = *closes.get(idx.checked_add(horizon)?)?;
    let current = *closes.get(idx)?;
    if current <= 0.0 {
        return None;
    }
    Some(future / current - 1.0)
}

pub fn compute_label(forward_return: f64, threshold: f64) -> u8 {
    u8::from(forward_return > threshold)
}

/// Builds the per-bar feature table for one instrument.
///
/// Rows whose indicators are not all defined, or whose forward window runs
/// past the last bar, are dropped. Series shorter than the longest indicator
/// lookback produce no rows.
pub fn assemble_feature_table(
    series: &PriceSeries,
    indicator_config: &IndicatorConfig,
    label_config: &LabelConfig,
) -> Vec<FeatureVector> {
    let lookback = indicator_config.max_lookback();
    if series.len() < lookback {
        debug!(
            "{}: {} bars is below the {}-bar indicator lookback; no feature rows",
            series.ticker(),
            series.len(),
            lookback
        );
        return Vec::new();
    }

    let indicators = IndicatorSet::compute(series, indicator_config);
    let closes = series.closes();

    series
        .bars()
        .iter()
        .enumerate()
        .filter_map(|(idx, bar)| {
            let values = indicators.defined_at(idx)?;
            let forward_return = compute_forward_return(&closes, idx, label_config.horizon)?;
            Some(FeatureVector {
                date: bar.date,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                momentum: values.momentum,
                trend_ratio: values.trend_ratio,
                volatility_fraction: values.volatility_fraction,
                volume_ratio: values.volume_ratio,
                forward_return,
                label: compute_label(forward_return, label_config.threshold),
                attributes: None,
            })
        })
        .collect()
}

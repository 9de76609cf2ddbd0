//! Momentum, trend, volatility and volume indicators over ordered price series.
//!
//! Every `calculate_*` function returns one value per input bar. Bars that do
//! not yet have enough history are `None`; callers decide whether a missing
//! value excludes the row or is replaced with a neutral default.

use crate::config::IndicatorConfig;
use crate::models::{IndicatorValues, PriceSeries};

pub const NEUTRAL_MOMENTUM: f64 = 50.0;
pub const NEUTRAL_RATIO: f64 = 1.0;
pub const NEUTRAL_VOLATILITY: f64 = 0.0;

/// Trailing mean over `period` values ending at (and including) each index.
pub fn calculate_sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut sma_values = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return sma_values;
    }

    for i in (period - 1)..values.len() {
        let window_start = i + 1 - period;
        let sum = values[window_start..=i].iter().sum::<f64>();
        sma_values[i] = Some(sum / period as f64);
    }

    sma_values
}

fn oscillator_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // No downside in the window.
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

/// Momentum oscillator from simple trailing means of gains and losses over the
/// last `period` bar-to-bar deltas. Defined from index `period`.
pub fn calculate_momentum_oscillator(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut oscillator = vec![None; n];
    if period == 0 || n <= period {
        return oscillator;
    }

    let mut gains = vec![0.0; n];
    let mut losses = vec![0.0; n];
    for i in 1..n {
        let delta = closes[i] - closes[i - 1];
        if delta > 0.0 {
            gains[i] = delta;
        } else if delta < 0.0 {
            losses[i] = -delta;
        }
    }

    for i in period..n {
        let window_start = i + 1 - period;
        let avg_gain = gains[window_start..=i].iter().sum::<f64>() / period as f64;
        let avg_loss = losses[window_start..=i].iter().sum::<f64>() / period as f64;
        oscillator[i] = Some(oscillator_from_averages(avg_gain, avg_loss));
    }

    oscillator
}

/// Ratio of the fast to the slow trailing mean of closes.
///
/// Only defined once `slow_period` earlier bars exist, i.e. from index
/// `max(fast_period, slow_period)`.
pub fn calculate_trend_ratio(
    closes: &[f64],
    fast_period: usize,
    slow_period: usize,
) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut ratios = vec![None; n];
    let lookback = fast_period.max(slow_period);
    if fast_period == 0 || slow_period == 0 || n <= lookback {
        return ratios;
    }

    let fast = calculate_sma(closes, fast_period);
    let slow = calculate_sma(closes, slow_period);
    for i in lookback..n {
        if let (Some(fast_mean), Some(slow_mean)) = (fast[i], slow[i]) {
            if slow_mean > 0.0 {
                ratios[i] = Some(fast_mean / slow_mean);
            }
        }
    }

    ratios
}

/// True range per bar; index 0 has no previous close and is `None`.
pub fn calculate_true_range(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<Option<f64>> {
    let n = highs.len().min(lows.len()).min(closes.len());
    let mut tr_values = vec![None; n];
    for i in 1..n {
        let tr = (highs[i] - lows[i])
            .max((highs[i] - closes[i - 1]).abs())
            .max((lows[i] - closes[i - 1]).abs());
        tr_values[i] = Some(tr);
    }
    tr_values
}

/// Mean true range over `period` bars as a fraction of the current close.
pub fn calculate_volatility_fraction(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
) -> Vec<Option<f64>> {
    let tr_values = calculate_true_range(highs, lows, closes);
    let n = tr_values.len();
    let mut fractions = vec![None; n];
    if period == 0 || n <= period {
        return fractions;
    }

    for i in period..n {
        let window_start = i + 1 - period;
        let sum = tr_values[window_start..=i]
            .iter()
            .map(|tr| tr.unwrap_or(0.0))
            .sum::<f64>();
        let atr = sum / period as f64;
        if closes[i] > 0.0 {
            fractions[i] = Some(atr / closes[i]);
        }
    }

    fractions
}

/// Current volume relative to the mean of the previous `period` volumes.
pub fn calculate_volume_ratio(volumes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = volumes.len();
    let mut ratios = vec![None; n];
    if period == 0 || n <= period {
        return ratios;
    }

    for i in period..n {
        let mean = volumes[i - period..i].iter().sum::<f64>() / period as f64;
        if mean > 0.0 {
            ratios[i] = Some(volumes[i] / mean);
        }
    }

    ratios
}

/// Natural log of consecutive close ratios; `returns[i]` is realized at bar `i + 1`.
pub fn calculate_log_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|pair| {
            let (prev, current) = (pair[0], pair[1]);
            if prev > 0.0 && current > 0.0 {
                (current / prev).ln()
            } else {
                0.0
            }
        })
        .collect()
}

/// All four indicators aligned 1:1 with a price series.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    pub momentum: Vec<Option<f64>>,
    pub trend_ratio: Vec<Option<f64>>,
    pub volatility_fraction: Vec<Option<f64>>,
    pub volume_ratio: Vec<Option<f64>>,
}

impl IndicatorSet {
    pub fn compute(series: &PriceSeries, config: &IndicatorConfig) -> Self {
        let closes = series.closes();
        let highs = series.highs();
        let lows = series.lows();
        let volumes = series.volumes();

        Self {
            momentum: calculate_momentum_oscillator(&closes, config.momentum_period),
            trend_ratio: calculate_trend_ratio(
                &closes,
                config.trend_fast_period,
                config.trend_slow_period,
            ),
            volatility_fraction: calculate_volatility_fraction(
                &highs,
                &lows,
                &closes,
                config.volatility_period,
            ),
            volume_ratio: calculate_volume_ratio(&volumes, config.volume_period),
        }
    }

    pub fn len(&self) -> usize {
        self.momentum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.momentum.is_empty()
    }

    /// Values at `index` when all four are defined.
    pub fn defined_at(&self, index: usize) -> Option<IndicatorValues> {
        Some(IndicatorValues {
            momentum: (*self.momentum.get(index)?)?,
            trend_ratio: (*self.trend_ratio.get(index)?)?,
            volatility_fraction: (*self.volatility_fraction.get(index)?)?,
            volume_ratio: (*self.volume_ratio.get(index)?)?,
        })
    }

    /// Values at `index` with missing readings replaced by neutral defaults.
    pub fn neutral_at(&self, index: usize) -> IndicatorValues {
        let pick = |values: &[Option<f64>], fallback: f64| {
            values.get(index).copied().flatten().unwrap_or(fallback)
        };
        IndicatorValues {
            momentum: pick(&self.momentum, NEUTRAL_MOMENTUM),
            trend_ratio: pick(&self.trend_ratio, NEUTRAL_RATIO),
            volatility_fraction: pick(&self.volatility_fraction, NEUTRAL_VOLATILITY),
            volume_ratio: pick(&self.volume_ratio, NEUTRAL_RATIO),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{assert_approx, series_from_closes};

    #[test]
    fn sma_is_undefined_until_window_fills() {
        let sma = calculate_sma(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(sma[0], None);
        assert_eq!(sma[1], None);
        assert_approx(sma[2].unwrap(), 2.0, 1e-12);
        assert_approx(sma[3].unwrap(), 3.0, 1e-12);
    }

    #[test]
    fn oscillator_is_100_without_losses() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let oscillator = calculate_momentum_oscillator(&closes, 14);
        assert!(oscillator[..14].iter().all(Option::is_none));
        assert!(oscillator[14..].iter().all(|value| *value == Some(100.0)));
    }

    #[test]
    fn oscillator_is_100_on_flat_prices() {
        let oscillator = calculate_momentum_oscillator(&[5.0; 10], 3);
        assert_eq!(oscillator[3], Some(100.0));
    }

    #[test]
    fn oscillator_mixed_window() {
        // Deltas: +0.34, -0.25, -0.48; gains=0.34, losses=0.73
        let oscillator = calculate_momentum_oscillator(&[44.0, 44.34, 44.09, 43.61], 3);
        let expected = 100.0 - 100.0 / (1.0 + 0.34 / 0.73);
        assert_approx(oscillator[3].unwrap(), expected, 1e-9);
    }

    #[test]
    fn oscillator_all_losses_is_zero() {
        let oscillator = calculate_momentum_oscillator(&[10.0, 9.0, 8.0, 7.0], 3);
        assert_approx(oscillator[3].unwrap(), 0.0, 1e-12);
    }

    #[test]
    fn trend_ratio_waits_for_slow_period() {
        let closes: Vec<f64> = (0..8).map(|i| 10.0 + i as f64).collect();
        let ratios = calculate_trend_ratio(&closes, 2, 4);
        assert!(ratios[..4].iter().all(Option::is_none));
        // index 4: fast mean (13+14)/2=13.5, slow mean (11..=14)/4=12.5
        assert_approx(ratios[4].unwrap(), 13.5 / 12.5, 1e-12);
    }

    #[test]
    fn true_range_uses_previous_close_gaps() {
        let highs = [10.0, 12.0];
        let lows = [9.0, 11.5];
        let closes = [9.5, 11.8];
        let tr = calculate_true_range(&highs, &lows, &closes);
        assert_eq!(tr[0], None);
        // max(0.5, |12-9.5|, |11.5-9.5|) = 2.5
        assert_approx(tr[1].unwrap(), 2.5, 1e-12);
    }

    #[test]
    fn volatility_fraction_divides_by_current_close() {
        let highs = [11.0, 11.0, 11.0];
        let lows = [9.0, 9.0, 9.0];
        let closes = [10.0, 10.0, 10.0];
        let fractions = calculate_volatility_fraction(&highs, &lows, &closes, 2);
        assert_eq!(fractions[0], None);
        assert_eq!(fractions[1], None);
        assert_approx(fractions[2].unwrap(), 0.2, 1e-12);
    }

    #[test]
    fn volume_ratio_excludes_current_bar() {
        let ratios = calculate_volume_ratio(&[100.0, 300.0, 400.0], 2);
        assert_eq!(ratios[1], None);
        assert_approx(ratios[2].unwrap(), 2.0, 1e-12);
    }

    #[test]
    fn volume_ratio_is_missing_when_trailing_volume_is_zero() {
        let ratios = calculate_volume_ratio(&[0.0, 0.0, 50.0], 2);
        assert_eq!(ratios[2], None);
    }

    #[test]
    fn log_returns_have_one_fewer_element() {
        let returns = calculate_log_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(returns.len(), 2);
        assert_approx(returns[0], (1.1f64).ln(), 1e-12);
        assert_approx(returns[1], (99.0f64 / 110.0).ln(), 1e-12);
    }

    #[test]
    fn indicator_set_is_aligned_and_neutral_fill_applies() {
        let closes: Vec<f64> = (0..30).map(|i| 50.0 + (i % 7) as f64).collect();
        let series = series_from_closes("AAA", &closes);
        let set = IndicatorSet::compute(&series, &IndicatorConfig::default());
        assert_eq!(set.len(), 30);
        assert_eq!(set.trend_ratio.len(), 30);
        assert_eq!(set.volatility_fraction.len(), 30);
        assert_eq!(set.volume_ratio.len(), 30);
        assert!(set.defined_at(29).is_none());

        let neutral = set.neutral_at(0);
        assert_eq!(neutral.momentum, NEUTRAL_MOMENTUM);
        assert_eq!(neutral.trend_ratio, NEUTRAL_RATIO);
        assert_eq!(neutral.volatility_fraction, NEUTRAL_VOLATILITY);
        assert_eq!(neutral.volume_ratio, NEUTRAL_RATIO);

        let later = set.neutral_at(29);
        assert_eq!(later.trend_ratio, NEUTRAL_RATIO);
        assert_eq!(Some(later.momentum), set.momentum[29]);
    }
}

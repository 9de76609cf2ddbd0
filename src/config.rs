use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::time::Duration;

/// Lookback periods for the indicator engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorConfig {
    pub momentum_period: usize,
    pub trend_fast_period: usize,
    pub trend_slow_period: usize,
    pub volatility_period: usize,
    pub volume_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            momentum_period: 14,
            trend_fast_period: 50,
            trend_slow_period: 200,
            volatility_period: 14,
            volume_period: 20,
        }
    }
}

impl IndicatorConfig {
    /// Number of leading bars for which at least one indicator is undefined.
    pub fn max_lookback(&self) -> usize {
        self.momentum_period
            .max(self.trend_fast_period)
            .max(self.trend_slow_period)
            .max(self.volatility_period)
            .max(self.volume_period)
    }
}

/// Forward-return labelling for the tabular dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelConfig {
    pub horizon: usize,
    pub threshold: f64,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            horizon: 5,
            threshold: 0.005,
        }
    }
}

/// Everything a dataset build or training run can be tuned with.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub indicators: IndicatorConfig,
    pub labels: LabelConfig,
    pub sequence_window: usize,
    pub split_fraction: f64,
    pub min_training_rows: usize,
    pub alert_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            indicators: IndicatorConfig::default(),
            labels: LabelConfig::default(),
            sequence_window: 60,
            split_fraction: 0.8,
            min_training_rows: 50_000,
            alert_timeout: Duration::from_secs(10),
        }
    }
}

impl PipelineConfig {
    /// Builds a config from string settings, keeping defaults for absent keys.
    pub fn from_settings_map(settings: &HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();
        let indicators = IndicatorConfig {
            momentum_period: optional_setting_usize(
                settings,
                "MOMENTUM_PERIOD",
                defaults.indicators.momentum_period,
                1,
            )?,
            trend_fast_period: optional_setting_usize(
                settings,
                "TREND_FAST_PERIOD",
                defaults.indicators.trend_fast_period,
                1,
            )?,
            trend_slow_period: optional_setting_usize(
                settings,
                "TREND_SLOW_PERIOD",
                defaults.indicators.trend_slow_period,
                1,
            )?,
            volatility_period: optional_setting_usize(
                settings,
                "VOLATILITY_PERIOD",
                defaults.indicators.volatility_period,
                1,
            )?,
            volume_period: optional_setting_usize(
                settings,
                "VOLUME_PERIOD",
                defaults.indicators.volume_period,
                1,
            )?,
        };
        let labels = LabelConfig {
            horizon: optional_setting_usize(settings, "LABEL_HORIZON", defaults.labels.horizon, 1)?,
            threshold: optional_setting_f64(
                settings,
                "LABEL_THRESHOLD",
                defaults.labels.threshold,
                None,
                None,
            )?,
        };
        let sequence_window =
            optional_setting_usize(settings, "SEQUENCE_WINDOW", defaults.sequence_window, 1)?;
        let split_fraction = optional_setting_f64(
            settings,
            "SPLIT_FRACTION",
            defaults.split_fraction,
            Some(0.0),
            Some(1.0),
        )?;
        let min_training_rows =
            optional_setting_usize(settings, "MIN_TRAINING_ROWS", defaults.min_training_rows, 0)?;
        let alert_timeout_secs = optional_setting_usize(
            settings,
            "ALERT_TIMEOUT_SECS",
            defaults.alert_timeout.as_secs() as usize,
            1,
        )?;

        let config = Self {
            indicators,
            labels,
            sequence_window,
            split_fraction,
            min_training_rows,
            alert_timeout: Duration::from_secs(alert_timeout_secs as u64),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("MOMENTUM_PERIOD", self.indicators.momentum_period),
            ("TREND_FAST_PERIOD", self.indicators.trend_fast_period),
            ("TREND_SLOW_PERIOD", self.indicators.trend_slow_period),
            ("VOLATILITY_PERIOD", self.indicators.volatility_period),
            ("VOLUME_PERIOD", self.indicators.volume_period),
            ("LABEL_HORIZON", self.labels.horizon),
            ("SEQUENCE_WINDOW", self.sequence_window),
        ];
        for (key, value) in periods {
            if value == 0 {
                return Err(anyhow!("Setting {} must be >= 1 (value: {})", key, value));
            }
        }
        if self.indicators.trend_fast_period > self.indicators.trend_slow_period {
            return Err(anyhow!(
                "TREND_FAST_PERIOD ({}) must be <= TREND_SLOW_PERIOD ({})",
                self.indicators.trend_fast_period,
                self.indicators.trend_slow_period
            ));
        }
        if !self.labels.threshold.is_finite() {
            return Err(anyhow!(
                "Setting LABEL_THRESHOLD must be finite (value: {})",
                self.labels.threshold
            ));
        }
        if self.split_fraction.is_nan() || self.split_fraction <= 0.0 || self.split_fraction > 1.0 {
            return Err(anyhow!(
                "Setting SPLIT_FRACTION must be in (0, 1] (value: {})",
                self.split_fraction
            ));
        }
        if self.alert_timeout.is_zero() {
            return Err(anyhow!("Setting ALERT_TIMEOUT_SECS must be >= 1"));
        }
        Ok(())
    }
}

fn optional_setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn optional_setting_f64(
    settings: &HashMap<String, String>,
    key: &str,
    default: f64,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<f64> {
    let Some(raw) = optional_setting(settings, key) else {
        return Ok(default);
    };
    let value = raw
        .parse::<f64>()
        .map_err(|_| anyhow!("Setting {} must be a number (value: {})", key, raw))?;
    if !value.is_finite() {
        return Err(anyhow!("Setting {} must be finite (value: {})", key, raw));
    }
    if let Some(min_value) = min {
        if value < min_value {
            return Err(anyhow!(
                "Setting {} must be >= {} (value: {})",
                key,
                min_value,
                raw
            ));
        }
    }
    if let Some(max_value) = max {
        if value > max_value {
            return Err(anyhow!(
                "Setting {} must be <= {} (value: {})",
                key,
                max_value,
                raw
            ));
        }
    }
    Ok(value)
}

fn optional_setting_usize(
    settings: &HashMap<String, String>,
    key: &str,
    default: usize,
    min: usize,
) -> Result<usize> {
    let Some(raw) = optional_setting(settings, key) else {
        return Ok(default);
    };
    let value = raw.parse::<usize>().map_err(|_| {
        anyhow!(
            "Setting {} must be a non-negative integer (value: {})",
            key,
            raw
        )
    })?;
    if value < min {
        return Err(anyhow!(
            "Setting {} must be >= {} (value: {})",
            key,
            min,
            raw
        ));
    }
    Ok(value)
}

use anyhow::{anyhow, Context, Result};
use chrono::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::fundamentals::AttributeLookup;
use crate::models::PriceBar;

const MARKET_DATA_SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct MarketDataSnapshot {
    version: u32,
    generated_at: DateTime<Utc>,
    bars_by_ticker: BTreeMap<String, Vec<PriceBar>>,
    #[serde(default)]
    fundamentals: AttributeLookup,
}

/// Price bars per ticker plus the optional static-attribute lookup.
///
/// Tickers are kept in a `BTreeMap` so every run walks them in the same order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketData {
    bars_by_ticker: BTreeMap<String, Vec<PriceBar>>,
    fundamentals: AttributeLookup,
}

impl MarketData {
    pub fn new(
        bars_by_ticker: BTreeMap<String, Vec<PriceBar>>,
        fundamentals: AttributeLookup,
    ) -> Self {
        Self {
            bars_by_ticker,
            fundamentals,
        }
    }

    pub fn bars_by_ticker(&self) -> &BTreeMap<String, Vec<PriceBar>> {
        &self.bars_by_ticker
    }

    pub fn fundamentals(&self) -> &AttributeLookup {
        &self.fundamentals
    }

    pub fn ticker_count(&self) -> usize {
        self.bars_by_ticker.len()
    }

    pub fn bar_count(&self) -> usize {
        self.bars_by_ticker.values().map(Vec::len).sum()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading market data snapshot from {}", path.display());
        let file = File::open(path).with_context(|| {
            format!("Failed to open market data snapshot at {}", path.display())
        })?;
        let reader = BufReader::new(file);
        let snapshot: MarketDataSnapshot =
            bincode::deserialize_from(reader).context("Snapshot decode failed")?;

        if snapshot.version != MARKET_DATA_SNAPSHOT_VERSION {
            return Err(anyhow!(
                "Market data snapshot version mismatch (found {}, expected {})",
                snapshot.version,
                MARKET_DATA_SNAPSHOT_VERSION
            ));
        }

        let data = Self::new(snapshot.bars_by_ticker, snapshot.fundamentals);
        info!(
            "Loaded {} bars for {} tickers ({} with fundamentals), generated at {}",
            data.bar_count(),
            data.ticker_count(),
            data.fundamentals.len(),
            snapshot.generated_at.to_rfc3339()
        );
        Ok(data)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create snapshot directory {}", parent.display())
                })?;
            }
        }

        let file = File::create(path).with_context(|| {
            format!(
                "Unable to create market data snapshot at {}",
                path.display()
            )
        })?;
        let mut writer = BufWriter::new(file);
        let snapshot = MarketDataSnapshot {
            version: MARKET_DATA_SNAPSHOT_VERSION,
            generated_at: Utc::now(),
            bars_by_ticker: self.bars_by_ticker.clone(),
            fundamentals: self.fundamentals.clone(),
        };
        bincode::serialize_into(&mut writer, &snapshot)
            .context("Failed to serialize market data snapshot")?;
        writer
            .flush()
            .context("Failed to flush market data snapshot to disk")?;
        Ok(())
    }
}

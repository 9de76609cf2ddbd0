use anyhow::{anyhow, Result};
use std::fs;
use std::path::Path;

use crate::data_context::MarketData;

pub fn ensure_market_data_file(path: &Path) -> Result<()> {
    if fs::metadata(path).is_ok() {
        return Ok(());
    }

    Err(anyhow!(
        "Market data snapshot not found at {}. Produce one with the ingestion job before running this command.",
        path.display()
    ))
}

pub fn load_market_data(path: &Path) -> Result<MarketData> {
    ensure_market_data_file(path)?;
    MarketData::load_from_file(path)
}

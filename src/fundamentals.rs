use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::FeatureVector;

/// Slowly-changing per-instrument attributes broadcast onto every feature row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaticAttributes {
    pub valuation_ratio: f64,
    pub profitability_ratio: f64,
    pub leverage_ratio: f64,
    pub sentiment_score: f64,
}

pub type AttributeLookup = HashMap<String, StaticAttributes>;

/// Attaches the instrument's static attributes to every row.
///
/// Tickers absent from the lookup pass through untouched.
pub fn merge_static_attributes(
    mut rows: Vec<FeatureVector>,
    ticker: &str,
    lookup: &AttributeLookup,
) -> Vec<FeatureVector> {
    let Some(attributes) = lookup.get(ticker) else {
        debug!("No static attributes for {ticker}; rows left unchanged");
        return rows;
    };

    for row in rows.iter_mut() {
        row.attributes = Some(*attributes);
    }
    rows
}

pub mod build_features;
pub mod build_sequences;
pub mod market_data_snapshot;
pub mod train_tabular;

pub mod alerts;
pub mod commands;
pub mod config;
pub mod data_context;
pub mod dataset;
pub mod error;
pub mod fundamentals;
pub mod indicators;
pub mod lightgbm;
pub mod models;
pub mod partition;
pub mod safeguard;
pub mod sequence;
pub mod tabular;
pub mod training;

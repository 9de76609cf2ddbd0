use thiserror::Error;

/// Failures raised while turning price series into training data.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The instrument's bars violate the input contract. Only that instrument is skipped.
    #[error("malformed input for {ticker}: {detail}")]
    MalformedInput { ticker: String, detail: String },

    /// Too few usable rows were assembled to train on. Fatal for the run.
    #[error(
        "insufficient training data: found {observed} valid rows across {instruments} instruments, \
         minimum required is {required}. This indicates an upstream data collection failure \
         (provider outage or rate limiting), not a defect in the pipeline; training was aborted \
         and needs new data before it can be retried"
    )]
    InsufficientAggregateData {
        observed: usize,
        required: usize,
        instruments: usize,
    },
}

impl DatasetError {
    pub fn malformed(ticker: &str, detail: impl Into<String>) -> Self {
        Self::MalformedInput {
            ticker: ticker.to_string(),
            detail: detail.into(),
        }
    }

    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::MalformedInput { .. })
    }
}

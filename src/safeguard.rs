use log::{error, warn};

use crate::alerts::{AlertNotifier, AlertPayload};
use crate::error::DatasetError;

/// Refuses to train on fewer than `min_rows` usable rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingSafeguard {
    min_rows: usize,
}

impl TrainingSafeguard {
    pub fn new(min_rows: usize) -> Self {
        Self { min_rows }
    }

    pub fn check(&self, observed_rows: usize, instrument_count: usize) -> Result<(), DatasetError> {
        if observed_rows < self.min_rows {
            return Err(DatasetError::InsufficientAggregateData {
                observed: observed_rows,
                required: self.min_rows,
                instruments: instrument_count,
            });
        }
        Ok(())
    }

    /// Like [`check`](Self::check), but a breach also dispatches an alert.
    ///
    /// Delivery failures are logged; the abort stands either way.
    pub fn enforce(
        &self,
        observed_rows: usize,
        instrument_count: usize,
        notifier: &dyn AlertNotifier,
    ) -> Result<(), DatasetError> {
        let Err(abort) = self.check(observed_rows, instrument_count) else {
            return Ok(());
        };

        error!("{abort}");
        let payload = AlertPayload {
            observed_rows,
            required_rows: self.min_rows,
            instrument_count,
        };
        if let Err(err) = notifier.send(&payload) {
            warn!("Failed to dispatch training abort alert: {err}");
        }
        Err(abort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<AlertPayload>>,
        fail: bool,
    }

    impl AlertNotifier for RecordingNotifier {
        fn send(&self, payload: &AlertPayload) -> Result<(), AlertError> {
            self.sent.lock().unwrap().push(payload.clone());
            if self.fail {
                Err(AlertError::NotConfigured)
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn below_threshold_aborts_and_alerts() {
        let notifier = RecordingNotifier::default();
        let err = TrainingSafeguard::new(50_000)
            .enforce(49_999, 12, &notifier)
            .unwrap_err();

        assert!(matches!(
            err,
            DatasetError::InsufficientAggregateData {
                observed: 49_999,
                required: 50_000,
                instruments: 12
            }
        ));
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![AlertPayload {
                observed_rows: 49_999,
                required_rows: 50_000,
                instrument_count: 12
            }]
        );
    }

    #[test]
    fn at_threshold_proceeds_without_alert() {
        let notifier = RecordingNotifier::default();
        TrainingSafeguard::new(50_000)
            .enforce(50_000, 12, &notifier)
            .unwrap();
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn failed_delivery_does_not_change_the_abort() {
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };
        let result = TrainingSafeguard::new(10).enforce(3, 1, &notifier);
        assert!(result.is_err());
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn abort_message_is_actionable() {
        let err = TrainingSafeguard::new(100).check(7, 2).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("found 7 valid rows"), "{message}");
        assert!(message.contains("minimum required is 100"), "{message}");
        assert!(message.contains("not a defect"), "{message}");
    }
}

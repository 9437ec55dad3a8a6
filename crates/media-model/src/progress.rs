//! Progress reporting.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Stages an engine call moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Preparing,
    Encoding,
    Capturing,
    Finalizing,
    Complete,
    Failed,
}

/// A progress report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Current stage.
    pub stage: ProgressStage,

    /// Overall progress in `[0.0, 1.0]`.
    pub fraction: f64,
}

impl Progress {
    pub fn new(stage: ProgressStage, fraction: f64) -> Self {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { stage, fraction }
    }

    /// Whole percent, as shown next to a progress bar.
    pub fn percent(&self) -> u8 {
        (self.fraction * 100.0).round() as u8
    }
}

pub type ProgressSender = mpsc::UnboundedSender<Progress>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<Progress>;

/// Create a progress channel.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Optional progress sink. A dropped receiver is not an error.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<ProgressSender>,
}

impl ProgressReporter {
    pub fn new(tx: ProgressSender) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn report(&self, stage: ProgressStage, fraction: f64) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Progress::new(stage, fraction));
        }
    }
}

impl From<Option<ProgressSender>> for ProgressReporter {
    fn from(tx: Option<ProgressSender>) -> Self {
        Self { tx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_is_clamped() {
        assert_eq!(Progress::new(ProgressStage::Capturing, 1.7).fraction, 1.0);
        assert_eq!(Progress::new(ProgressStage::Capturing, -0.2).fraction, 0.0);
        assert_eq!(Progress::new(ProgressStage::Capturing, f64::NAN).fraction, 0.0);
        assert_eq!(Progress::new(ProgressStage::Capturing, 0.456).percent(), 46);
    }

    #[test]
    fn reporter_survives_dropped_receiver() {
        let (tx, rx) = progress_channel();
        drop(rx);
        let reporter = ProgressReporter::new(tx);
        reporter.report(ProgressStage::Encoding, 0.5);
    }
}

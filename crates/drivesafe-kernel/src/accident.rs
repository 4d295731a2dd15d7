//! [`AccidentDetector`] – two-sample sudden-stop heuristic.
//!
//! Only the previous sample is kept.  When the new sample arrives within
//! `window` of it and speed fell by more than `min_drop_kmh`, the pair is
//! reported as an accident candidate.  There is no filtering or debouncing:
//! a single bad GPS reading can fire it.

use std::time::Duration;

use drivesafe_types::SpeedSample;
use serde::{Deserialize, Serialize};

/// Thresholds for [`AccidentDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccidentThresholds {
    /// Speed drop (km/h) that must be exceeded.
    pub min_drop_kmh: f64,
    /// Longest gap between the two samples, inclusive.
    pub window: Duration,
}

impl Default for AccidentThresholds {
    fn default() -> Self {
        Self {
            min_drop_kmh: 90.0,
            window: Duration::from_secs(10),
        }
    }
}

/// A sample pair that looked like a crash.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccidentCandidate {
    pub drop_kmh: f64,
    pub elapsed: Duration,
    pub sample: SpeedSample,
}

#[derive(Debug, Default)]
pub struct AccidentDetector {
    thresholds: AccidentThresholds,
    previous: Option<SpeedSample>,
}

impl AccidentDetector {
    pub fn new(thresholds: AccidentThresholds) -> Self {
        Self {
            thresholds,
            previous: None,
        }
    }

    /// Feed the next sample.  The sample always replaces the stored one.
    ///
    /// Out-of-order samples (earlier than the stored one) never fire.
    pub fn observe(&mut self, sample: SpeedSample) -> Option<AccidentCandidate> {
        let previous = self.previous.replace(sample)?;

        let elapsed = (sample.timestamp - previous.timestamp).to_std().ok()?;
        if elapsed > self.thresholds.window {
            return None;
        }

        let drop_kmh = previous.speed_kmh - sample.speed_kmh;
        (drop_kmh > self.thresholds.min_drop_kmh).then_some(AccidentCandidate {
            drop_kmh,
            elapsed,
            sample,
        })
    }

    /// Forget the stored sample.
    pub fn reset(&mut self) {
        self.previous = None;
    }
}

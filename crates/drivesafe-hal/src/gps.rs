//! Speed from geolocation fixes.
//!
//! A fix may carry the receiver's own speed (m/s).  When it does not, speed
//! is derived from the great-circle distance to the previous fix over the
//! time between them.  Fixes that cannot be used become
//! [`SensorReading::LocationError`] and the stream carries on.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use drivesafe_types::{GeoPosition, SafetyError, SpeedSample};
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::source::{SensorReading, SpeedSource};

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const MPS_TO_KMH: f64 = 3.6;

/// One geolocation fix, as stored one-per-line in a replay file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Receiver-reported ground speed.
    #[serde(default)]
    pub speed_mps: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl GeoFix {
    pub fn position(&self) -> GeoPosition {
        GeoPosition::new(self.latitude, self.longitude)
    }

    fn is_plausible(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Great-circle distance in metres.
pub fn haversine_m(a: GeoPosition, b: GeoPosition) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());
    EARTH_RADIUS_M * c
}

// ────────────────────────────────────────────────────────────────────────────
// Estimator
// ────────────────────────────────────────────────────────────────────────────

/// Turns a sequence of fixes into readings.
#[derive(Debug, Default)]
pub struct SpeedEstimator {
    previous: Option<GeoFix>,
}

impl SpeedEstimator {
    /// Speed in km/h for `fix`, if one can be determined.
    pub fn estimate(&mut self, fix: &GeoFix) -> Option<f64> {
        let previous = self.previous.replace(*fix);

        if let Some(mps) = fix.speed_mps
            && mps.is_finite()
            && mps >= 0.0
        {
            return Some(mps * MPS_TO_KMH);
        }

        let previous = previous?;
        let dt_secs = (fix.timestamp - previous.timestamp).num_milliseconds() as f64 / 1000.0;
        if dt_secs <= 0.0 {
            return None;
        }
        Some(haversine_m(previous.position(), fix.position()) / dt_secs * MPS_TO_KMH)
    }

    /// Readings for one raw fix: a position, then a speed when available.
    pub fn readings(&mut self, fix: Result<GeoFix, String>) -> Vec<SensorReading> {
        let fix = match fix {
            Ok(fix) if fix.is_plausible() => fix,
            Ok(fix) => {
                return vec![SensorReading::LocationError(format!(
                    "implausible fix ({}, {})",
                    fix.latitude, fix.longitude
                ))];
            }
            Err(reason) => return vec![SensorReading::LocationError(reason)],
        };

        let mut out = vec![SensorReading::Position(fix.position())];
        if let Some(kmh) = self.estimate(&fix) {
            out.push(SensorReading::Speed(SpeedSample::new(kmh, fix.timestamp)));
        }
        out
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Source
// ────────────────────────────────────────────────────────────────────────────

/// Speed source fed by a finite list of fixes (a recorded drive).
pub struct GpsSpeedSource {
    name: String,
    fixes: Vec<Result<GeoFix, String>>,
    pace: Option<Duration>,
}

impl GpsSpeedSource {
    pub fn from_fixes(name: impl Into<String>, fixes: Vec<Result<GeoFix, String>>) -> Self {
        Self {
            name: name.into(),
            fixes,
            pace: None,
        }
    }

    /// Load a JSON-lines replay.  Blank lines and `#` comments are skipped;
    /// lines that do not parse become location errors in the stream.
    ///
    /// # Errors
    ///
    /// [`SafetyError::LocationUnavailable`] if the file cannot be read.
    pub fn from_replay_file(path: &Path) -> Result<Self, SafetyError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SafetyError::LocationUnavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        let fixes = parse_replay(&raw);
        debug!(path = %path.display(), fixes = fixes.len(), "loaded GPS replay");
        Ok(Self::from_fixes(path.display().to_string(), fixes))
    }

    /// Wait `pace` before each fix, emulating a live receiver.
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = Some(pace);
        self
    }
}

fn parse_replay(raw: &str) -> Vec<Result<GeoFix, String>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| {
            serde_json::from_str::<GeoFix>(line).map_err(|e| format!("line {}: {e}", idx + 1))
        })
        .collect()
}

impl SpeedSource for GpsSpeedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn into_stream(self: Box<Self>) -> BoxStream<'static, SensorReading> {
        let GpsSpeedSource { fixes, pace, .. } = *self;
        let mut estimator = SpeedEstimator::default();
        stream::iter(fixes)
            .then(move |fix| async move {
                if let Some(pace) = pace {
                    tokio::time::sleep(pace).await;
                }
                fix
            })
            .flat_map(move |fix| stream::iter(estimator.readings(fix)))
            .boxed()
    }
}

//! Speedometer formatting for the status view.

use drivesafe_hal::sim::MAX_SIM_SPEED_KMH;

/// Full-scale speed of the gauge.
pub const GAUGE_MAX_KMH: f64 = MAX_SIM_SPEED_KMH;

/// Whole km/h, zero-padded to three digits (`7.9` → `"007"`).
pub fn digits(speed_kmh: f64) -> String {
    let whole = if speed_kmh.is_finite() && speed_kmh > 0.0 {
        speed_kmh.floor() as u64
    } else {
        0
    };
    format!("{whole:03}")
}

/// Fill level of the gauge in percent, clamped to `0..=100`.
pub fn percent(speed_kmh: f64) -> f64 {
    if !speed_kmh.is_finite() {
        return 0.0;
    }
    (speed_kmh / GAUGE_MAX_KMH * 100.0).clamp(0.0, 100.0)
}

/// A text bar `width` cells wide.
pub fn bar(speed_kmh: f64, width: usize) -> String {
    let filled = ((percent(speed_kmh) / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

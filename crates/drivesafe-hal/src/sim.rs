//! Simulated speed for running DriveSafe without a GPS receiver.
//!
//! # Example
//!
//! ```rust
//! use drivesafe_hal::sim::RandomWalk;
//!
//! let mut walk = RandomWalk::seeded(7, 120.0);
//! for _ in 0..1_000 {
//!     let kmh = walk.step();
//!     assert!((0.0..=120.0).contains(&kmh));
//! }
//! ```

use std::time::Duration;

use chrono::Utc;
use drivesafe_types::SpeedSample;
use futures_util::stream::{self, BoxStream, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::source::{SensorReading, SpeedSource};

/// Top of the simulated speed range and of the speed gauge, in km/h.
pub const MAX_SIM_SPEED_KMH: f64 = 120.0;

/// Largest change per tick, in km/h.
pub const MAX_STEP_KMH: f64 = 5.0;

/// Default sampling period.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

// ────────────────────────────────────────────────────────────────────────────
// Random walk
// ────────────────────────────────────────────────────────────────────────────

/// Bounded random walk starting at standstill.
pub struct RandomWalk {
    speed_kmh: f64,
    max_kmh: f64,
    rng: StdRng,
}

impl RandomWalk {
    /// Walk seeded from OS entropy.
    pub fn new(max_kmh: f64) -> Self {
        Self::with_rng(StdRng::from_entropy(), max_kmh)
    }

    /// Reproducible walk.
    pub fn seeded(seed: u64, max_kmh: f64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), max_kmh)
    }

    fn with_rng(rng: StdRng, max_kmh: f64) -> Self {
        let max_kmh = if max_kmh.is_finite() && max_kmh > 0.0 {
            max_kmh
        } else {
            MAX_SIM_SPEED_KMH
        };
        Self {
            speed_kmh: 0.0,
            max_kmh,
            rng,
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed_kmh
    }

    /// Advance by a uniform change in [-5, 5) and clamp to [0, max].
    pub fn step(&mut self) -> f64 {
        let delta = self.rng.gen_range(-MAX_STEP_KMH..MAX_STEP_KMH);
        self.speed_kmh = (self.speed_kmh + delta).clamp(0.0, self.max_kmh);
        self.speed_kmh
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Source
// ────────────────────────────────────────────────────────────────────────────

/// Emits one random-walk sample per tick, forever.
pub struct SimSpeedSource {
    walk: RandomWalk,
    tick: Duration,
}

impl SimSpeedSource {
    pub fn new(walk: RandomWalk, tick: Duration) -> Self {
        Self {
            walk,
            tick: tick.max(Duration::from_millis(1)),
        }
    }
}

impl Default for SimSpeedSource {
    fn default() -> Self {
        Self::new(RandomWalk::new(MAX_SIM_SPEED_KMH), DEFAULT_TICK)
    }
}

impl SpeedSource for SimSpeedSource {
    fn name(&self) -> &str {
        "sim"
    }

    fn into_stream(self: Box<Self>) -> BoxStream<'static, SensorReading> {
        let SimSpeedSource { walk, tick } = *self;
        // The interval is created on first poll so building the stream needs
        // no runtime.  The first sample lands one tick after polling starts.
        let state: (RandomWalk, Option<Interval>) = (walk, None);
        stream::unfold(state, move |(mut walk, ticker)| async move {
            let mut ticker = ticker.unwrap_or_else(|| {
                let mut t = tokio::time::interval_at(Instant::now() + tick, tick);
                t.set_missed_tick_behavior(MissedTickBehavior::Delay);
                t
            });
            ticker.tick().await;
            let sample = SpeedSample::new(walk.step(), Utc::now());
            Some((SensorReading::Speed(sample), (walk, Some(ticker))))
        })
        .boxed()
    }
}

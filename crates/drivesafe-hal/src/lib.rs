//! `drivesafe-hal` – Sensor & Platform Abstraction Layer
//!
//! Everything DriveSafe reads from or asks of the device sits behind a trait
//! here, so the runtime never talks to a concrete platform.
//!
//! # Modules
//!
//! - [`source`] – [`SpeedSource`][source::SpeedSource]: a provider consumed
//!   into a lazy stream of [`SensorReading`][source::SensorReading]s.
//! - [`sim`] – [`SimSpeedSource`][sim::SimSpeedSource]: bounded random-walk
//!   speed for demos and tests.
//! - [`gps`] – [`GpsSpeedSource`][gps::GpsSpeedSource]: derives speed from
//!   geolocation fixes, including JSON-lines replay files.
//! - [`dialer`] – [`EmergencyDialer`][dialer::EmergencyDialer]: places the
//!   emergency call.

pub mod dialer;
pub mod gps;
pub mod sim;
pub mod source;

pub use dialer::{DEFAULT_EMERGENCY_NUMBER, EmergencyDialer, TelUriDialer};
pub use gps::{GeoFix, GpsSpeedSource};
pub use sim::{RandomWalk, SimSpeedSource};
pub use source::{SensorReading, SpeedSource};

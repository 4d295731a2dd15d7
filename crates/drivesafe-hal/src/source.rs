//! The [`SpeedSource`] trait and the readings it yields.

use drivesafe_types::{GeoPosition, SpeedSample};
use futures_util::stream::BoxStream;

/// One item from a sensor stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorReading {
    Speed(SpeedSample),
    Position(GeoPosition),
    /// The platform could not produce a fix.  The stream keeps going.
    LocationError(String),
}

/// A provider of speed readings.
///
/// A source is consumed by value: the stream it returns is lazy (nothing
/// happens until it is polled), non-restartable, and released by dropping
/// it.  Live sources never end; replays end after their last fix.
pub trait SpeedSource: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    fn into_stream(self: Box<Self>) -> BoxStream<'static, SensorReading>;
}

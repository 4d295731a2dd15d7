//! `drivesafe-runtime` – Session Orchestration
//!
//! Wires the pure kernel to the async world: one Tokio task owns the
//! [`SafetyController`][drivesafe_kernel::SafetyController] and feeds it
//! driver commands, sensor readings and cooldown expiries in order.
//!
//! # Modules
//!
//! - [`session`] – [`DriveSession`][session::DriveSession] and its
//!   [`SessionHandle`][session::SessionHandle].
//! - [`cooldown_timer`] – [`TokioCooldownTimer`][cooldown_timer::TokioCooldownTimer]:
//!   the cancel-on-replace cooldown expiry task.
//! - [`notifier`] – [`BusNotifier`][notifier::BusNotifier]: notices onto the
//!   event bus.
//! - [`telemetry`] – `tracing` subscriber and optional OTLP export.

pub mod cooldown_timer;
pub mod notifier;
pub mod session;
pub mod telemetry;

pub use cooldown_timer::TokioCooldownTimer;
pub use notifier::BusNotifier;
pub use session::{DriveSession, SessionCommand, SessionConfig, SessionHandle, SessionParts, SessionSnapshot};

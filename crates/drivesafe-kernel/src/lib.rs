//! `drivesafe-kernel` – Safety-Mode Decision Core
//!
//! Synchronous decision logic for DriveSafe.  Nothing in here spawns tasks or
//! touches I/O.  Decisions are driven by sample timestamps and timer
//! callbacks; the monotonic clock is read only to report how much of the
//! cooldown is left.
//!
//! # Modules
//!
//! - [`controller`] – [`SafetyController`][controller::SafetyController]:
//!   the four-state safety-mode machine.  Gates every transition on PIN
//!   verification, refuses deactivation while the cooldown lock holds, and
//!   lets an accident signal force `Enabled` without a PIN.
//! - [`accident`] – [`AccidentDetector`][accident::AccidentDetector]:
//!   compares consecutive speed samples and flags sudden stops.
//! - [`cooldown`] – [`CooldownPolicy`][cooldown::CooldownPolicy],
//!   [`CooldownTimer`][cooldown::CooldownTimer] and
//!   [`CooldownLock`][cooldown::CooldownLock]: the minimum-dwell lock on
//!   deactivation.
//! - [`pin_verifier`] – [`PinVerifier`][pin_verifier::PinVerifier]:
//!   the capability that checks a code for a [`PinMode`][drivesafe_types::PinMode].
//! - [`rate_limit`] – [`RateLimitedVerifier`][rate_limit::RateLimitedVerifier]:
//!   caps PIN attempts per minute in front of any verifier.
//! - [`notifier`] – [`Notifier`][notifier::Notifier]: where driver-facing
//!   notices go.
//! - [`messages`] – [`MessageSettings`][messages::MessageSettings]: the
//!   auto-response sent while safety mode is on.

pub mod accident;
pub mod controller;
pub mod cooldown;
pub mod messages;
pub mod notifier;
pub mod pin_verifier;
pub mod rate_limit;

pub use accident::{AccidentCandidate, AccidentDetector, AccidentThresholds};
pub use controller::{ControllerConfig, PinFailurePolicy, SafetyController, Transition};
pub use cooldown::{CooldownLock, CooldownPolicy, CooldownTimer};
pub use messages::MessageSettings;
pub use notifier::{Notifier, RecordingNotifier, TracingNotifier};
pub use pin_verifier::{PinCodes, PinVerifier, StaticPinVerifier};
pub use rate_limit::RateLimitedVerifier;

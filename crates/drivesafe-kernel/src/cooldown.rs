//! Deactivation cooldown: policy, owned timer handle, and lock bookkeeping.
//!
//! While a cooldown is active the controller refuses ordinary deactivation
//! requests.  The controller owns a [`CooldownTimer`]; arming it always
//! replaces the previously armed expiry, so at most one is ever outstanding.
//! Each arm carries a generation number and the expiry callback hands it
//! back, which lets [`CooldownLock::release`] ignore anything stale.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Policy
// ────────────────────────────────────────────────────────────────────────────

/// When entering `Enabled` locks deactivation, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "dwell", rename_all = "snake_case")]
pub enum CooldownPolicy {
    /// Deactivation is always permitted.
    Off,
    /// Only an accident locks deactivation.
    AccidentOnly(Duration),
    /// Every entry into `Enabled` locks deactivation.
    AnyActivation(Duration),
}

impl CooldownPolicy {
    /// Fixed minimum dwell observed in the field.
    pub const DEFAULT_DWELL: Duration = Duration::from_secs(15 * 60);

    /// Dwell applied after a PIN-confirmed activation.
    pub fn after_activation(self) -> Option<Duration> {
        match self {
            CooldownPolicy::Off | CooldownPolicy::AccidentOnly(_) => None,
            CooldownPolicy::AnyActivation(d) => Some(d),
        }
    }

    /// Dwell applied after an accident forced safety mode on.
    pub fn after_accident(self) -> Option<Duration> {
        match self {
            CooldownPolicy::Off => None,
            CooldownPolicy::AccidentOnly(d) | CooldownPolicy::AnyActivation(d) => Some(d),
        }
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        CooldownPolicy::AnyActivation(Self::DEFAULT_DWELL)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Timer capability
// ────────────────────────────────────────────────────────────────────────────

/// Owned handle to the single deferred cooldown expiry.
///
/// Implementations must deliver `generation` back to the controller's
/// `on_cooldown_elapsed` once `duration` has passed, unless re-armed or
/// cancelled first.
pub trait CooldownTimer: Send {
    /// Schedule the expiry, replacing any pending one.
    fn arm(&mut self, generation: u64, duration: Duration);

    /// Drop the pending expiry, if any.
    fn cancel(&mut self);
}

/// A call made on a [`RecordingCooldownTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCall {
    Arm { generation: u64, duration: Duration },
    Cancel,
}

/// Timer that never fires on its own; it only records calls.  Tests drive
/// the expiry by calling the controller directly.
#[derive(Debug, Default, Clone)]
pub struct RecordingCooldownTimer {
    calls: Arc<Mutex<Vec<TimerCall>>>,
}

impl RecordingCooldownTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TimerCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Generation of the most recent arm, if any.
    pub fn last_generation(&self) -> Option<u64> {
        self.calls().into_iter().rev().find_map(|c| match c {
            TimerCall::Arm { generation, .. } => Some(generation),
            TimerCall::Cancel => None,
        })
    }

    fn push(&self, call: TimerCall) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }
}

impl CooldownTimer for RecordingCooldownTimer {
    fn arm(&mut self, generation: u64, duration: Duration) {
        self.push(TimerCall::Arm {
            generation,
            duration,
        });
    }

    fn cancel(&mut self) {
        self.push(TimerCall::Cancel);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Lock bookkeeping
// ────────────────────────────────────────────────────────────────────────────

struct ArmedCooldown {
    generation: u64,
    armed_at: Instant,
    duration: Duration,
}

/// Tracks whether deactivation is currently locked.
///
/// The lock is released only by the matching expiry generation (or by
/// [`clear`][Self::clear]); the clock is read for display only.
#[derive(Default)]
pub struct CooldownLock {
    next_generation: u64,
    armed: Option<ArmedCooldown>,
}

impl CooldownLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock for `duration`, superseding any previous lock.  Returns the
    /// generation the timer must report back.
    pub fn engage(&mut self, duration: Duration) -> u64 {
        self.next_generation += 1;
        self.armed = Some(ArmedCooldown {
            generation: self.next_generation,
            armed_at: Instant::now(),
            duration,
        });
        self.next_generation
    }

    /// Release the lock if `generation` is the current one.  Returns `true`
    /// when the lock was released.
    pub fn release(&mut self, generation: u64) -> bool {
        match &self.armed {
            Some(armed) if armed.generation == generation => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }

    /// Release unconditionally.
    pub fn clear(&mut self) {
        self.armed = None;
    }

    pub fn is_active(&self) -> bool {
        self.armed.is_some()
    }

    /// Time left on the active lock, saturating at zero while the expiry is
    /// still in flight.
    pub fn remaining(&self) -> Option<Duration> {
        self.armed
            .as_ref()
            .map(|a| a.duration.saturating_sub(a.armed_at.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_locks_every_activation_for_fifteen_minutes() {
        let p = CooldownPolicy::default();
        assert_eq!(p.after_activation(), Some(Duration::from_secs(900)));
        assert_eq!(p.after_accident(), Some(Duration::from_secs(900)));
    }

    #[test]
    fn accident_only_policy_skips_manual_activation() {
        let p = CooldownPolicy::AccidentOnly(Duration::from_secs(60));
        assert_eq!(p.after_activation(), None);
        assert_eq!(p.after_accident(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn off_policy_never_locks() {
        assert_eq!(CooldownPolicy::Off.after_activation(), None);
        assert_eq!(CooldownPolicy::Off.after_accident(), None);
    }

    #[test]
    fn engage_then_release_matching_generation() {
        let mut lock = CooldownLock::new();
        let g = lock.engage(Duration::from_secs(60));
        assert!(lock.is_active());
        assert!(lock.release(g));
        assert!(!lock.is_active());
    }

    #[test]
    fn stale_generation_does_not_release() {
        let mut lock = CooldownLock::new();
        let first = lock.engage(Duration::from_secs(60));
        let second = lock.engage(Duration::from_secs(60));
        assert_ne!(first, second);
        assert!(!lock.release(first));
        assert!(lock.is_active());
        assert!(lock.release(second));
    }

    #[test]
    fn release_without_lock_is_noop() {
        let mut lock = CooldownLock::new();
        assert!(!lock.release(1));
    }

    #[test]
    fn remaining_is_bounded_by_duration() {
        let mut lock = CooldownLock::new();
        assert_eq!(lock.remaining(), None);
        lock.engage(Duration::from_secs(60));
        let left = lock.remaining().unwrap();
        assert!(left <= Duration::from_secs(60));
        assert!(left > Duration::from_secs(55));
    }

    #[test]
    fn recording_timer_tracks_last_generation() {
        let mut t = RecordingCooldownTimer::new();
        t.arm(1, Duration::from_secs(5));
        t.arm(2, Duration::from_secs(5));
        t.cancel();
        assert_eq!(t.last_generation(), Some(2));
        assert_eq!(t.calls().len(), 3);
    }
}

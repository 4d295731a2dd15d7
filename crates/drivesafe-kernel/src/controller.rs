//! [`SafetyController`] – owner of the safety-mode state machine.
//!
//! ```text
//! Disabled ──request_activation──▶ PendingActivation ──pin ok──▶ Enabled
//!                                          │ pin fail: stay (Retry) or revert (Revert)
//! Enabled ──request_deactivation──▶ PendingDeactivation ──pin ok──▶ Disabled
//!    └── cooldown active: rejected, stays Enabled
//! any ──on_accident_signal──▶ Enabled (PIN bypassed, cooldown reset)
//! ```
//!
//! Every mutation happens through `&mut self`; the owner delivers events one
//! at a time.  The PIN check, driver notices and cooldown expiry are injected
//! capabilities, so the controller holds no secrets and schedules nothing itself.

use drivesafe_types::{
    Notice, PinMode, SafetyError, SafetyState, SpeedSample, TransitionCause,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cooldown::{CooldownLock, CooldownPolicy, CooldownTimer};
use crate::notifier::Notifier;
use crate::pin_verifier::PinVerifier;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// What a rejected PIN does to a pending challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinFailurePolicy {
    /// Keep the challenge open for another attempt.
    #[default]
    Retry,
    /// Abandon the challenge and return to the prior stable state.
    Revert,
}

/// Tunables for [`SafetyController`].
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Speeds strictly above this (km/h) auto-request activation.
    pub activation_speed_kmh: f64,
    pub cooldown: CooldownPolicy,
    pub pin_failure: PinFailurePolicy,
    /// Quoted in the "Safety Mode Active" notice.
    pub emergency_number: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            activation_speed_kmh: 20.0,
            cooldown: CooldownPolicy::default(),
            pin_failure: PinFailurePolicy::default(),
            emergency_number: "112".to_string(),
        }
    }
}

/// One committed state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SafetyState,
    pub to: SafetyState,
    pub cause: TransitionCause,
}

// ────────────────────────────────────────────────────────────────────────────
// SafetyController
// ────────────────────────────────────────────────────────────────────────────

/// The safety-mode state machine.
///
/// # Example
///
/// ```
/// use drivesafe_kernel::controller::{ControllerConfig, SafetyController};
/// use drivesafe_kernel::cooldown::RecordingCooldownTimer;
/// use drivesafe_kernel::notifier::RecordingNotifier;
/// use drivesafe_kernel::pin_verifier::StaticPinVerifier;
/// use drivesafe_types::SafetyState;
///
/// let mut ctl = SafetyController::new(
///     ControllerConfig::default(),
///     Box::new(StaticPinVerifier::default()),
///     Box::new(RecordingNotifier::new()),
///     Box::new(RecordingCooldownTimer::new()),
/// );
///
/// ctl.request_activation();
/// assert_eq!(ctl.state(), SafetyState::PendingActivation);
/// ctl.submit_pin("1234").unwrap();
/// assert_eq!(ctl.state(), SafetyState::Enabled);
/// ```
pub struct SafetyController {
    state: SafetyState,
    /// Cause of the currently pending challenge.
    pending_cause: TransitionCause,
    transitions: Vec<Transition>,
    cooldown: CooldownLock,
    verifier: Box<dyn PinVerifier>,
    notifier: Box<dyn Notifier>,
    timer: Box<dyn CooldownTimer>,
    config: ControllerConfig,
}

impl SafetyController {
    /// Start in [`SafetyState::Disabled`].
    pub fn new(
        config: ControllerConfig,
        verifier: Box<dyn PinVerifier>,
        notifier: Box<dyn Notifier>,
        timer: Box<dyn CooldownTimer>,
    ) -> Self {
        Self {
            state: SafetyState::Disabled,
            pending_cause: TransitionCause::Manual,
            transitions: Vec::new(),
            cooldown: CooldownLock::new(),
            verifier,
            notifier,
            timer,
            config,
        }
    }

    pub fn state(&self) -> SafetyState {
        self.state
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// `true` while ordinary deactivation is locked.
    pub fn is_cooldown_active(&self) -> bool {
        self.cooldown.is_active()
    }

    /// Approximate time left on the deactivation lock.
    pub fn cooldown_remaining(&self) -> Option<std::time::Duration> {
        self.cooldown.remaining()
    }

    /// Take the transitions committed since the last call, oldest first.
    pub fn drain_transitions(&mut self) -> Vec<Transition> {
        std::mem::take(&mut self.transitions)
    }

    // ── Requests ────────────────────────────────────────────────────────────

    /// Open an activation challenge.  No-op unless `Disabled`.
    pub fn request_activation(&mut self) -> SafetyState {
        self.open_activation(TransitionCause::Manual)
    }

    /// Open a deactivation challenge.  No-op unless `Enabled`.
    ///
    /// # Errors
    ///
    /// [`SafetyError::CooldownActive`] while the dwell lock holds; the state
    /// stays `Enabled` and a "Cannot Deactivate" notice is raised.
    pub fn request_deactivation(&mut self) -> Result<SafetyState, SafetyError> {
        self.open_deactivation(TransitionCause::Manual)
    }

    /// Emergency path to a deactivation challenge.  Same guards as
    /// [`request_deactivation`](Self::request_deactivation): PIN-gated and
    /// refused while the cooldown holds.  No-op unless `Enabled`.
    ///
    /// # Errors
    ///
    /// [`SafetyError::CooldownActive`] while the dwell lock holds.
    pub fn on_emergency_override(&mut self) -> Result<SafetyState, SafetyError> {
        if self.state != SafetyState::Enabled {
            debug!(state = %self.state, "emergency override ignored");
            return Ok(self.state);
        }
        self.notifier.notify(Notice::info(
            "Emergency Override",
            "Please enter your PIN to disable safety mode.",
        ));
        self.open_deactivation(TransitionCause::EmergencyOverride)
    }

    /// Resolve the pending challenge with `code`.
    ///
    /// # Errors
    ///
    /// - [`SafetyError::NoPendingChallenge`] – nothing is pending.
    /// - [`SafetyError::PinRejected`] – wrong code; the state follows the
    ///   configured [`PinFailurePolicy`].
    pub fn submit_pin(&mut self, code: &str) -> Result<SafetyState, SafetyError> {
        let Some(mode) = self.state.pending_mode() else {
            return Err(SafetyError::NoPendingChallenge);
        };

        if !self.verifier.verify(mode, code) {
            warn!(%mode, policy = ?self.config.pin_failure, "incorrect PIN");
            self.notifier
                .notify(Notice::critical("Incorrect PIN", "Please try again."));
            if self.config.pin_failure == PinFailurePolicy::Revert {
                self.commit(mode.origin(), self.pending_cause);
            }
            return Err(SafetyError::PinRejected(mode));
        }

        let cause = self.pending_cause;
        match mode {
            PinMode::Activate => {
                self.commit(mode.target(), cause);
                self.notifier.notify(Notice::info(
                    "Safety Mode Activated",
                    "PIN verified successfully.",
                ));
                self.notifier.notify(Notice::info(
                    "Safety Mode Active",
                    format!(
                        "Phone functionality is limited while driving. Emergency calls ({}) are still available.",
                        self.config.emergency_number
                    ),
                ));
                if let Some(dwell) = self.config.cooldown.after_activation() {
                    self.arm_cooldown(dwell);
                }
            }
            PinMode::Deactivate => {
                self.disarm_cooldown();
                self.commit(mode.target(), cause);
                self.notifier.notify(Notice::info(
                    "Safety Mode Deactivated",
                    "Safety mode has been disabled successfully.",
                ));
            }
        }
        Ok(self.state)
    }

    /// Abandon the pending challenge and return to its prior stable state.
    pub fn cancel_pin_entry(&mut self) -> SafetyState {
        if let Some(mode) = self.state.pending_mode() {
            debug!(%mode, "PIN entry cancelled");
            self.commit(mode.origin(), self.pending_cause);
        }
        self.state
    }

    // ── Signals ─────────────────────────────────────────────────────────────

    /// Auto-request activation when `Disabled` and the sample is above the
    /// threshold.  Invalid samples are dropped.
    pub fn on_speed_sample(&mut self, sample: &SpeedSample) -> SafetyState {
        if !sample.is_valid() {
            warn!(speed_kmh = sample.speed_kmh, "dropping invalid speed sample");
            return self.state;
        }
        if self.state == SafetyState::Disabled
            && sample.speed_kmh > self.config.activation_speed_kmh
        {
            info!(
                speed_kmh = sample.speed_kmh,
                threshold_kmh = self.config.activation_speed_kmh,
                "speed threshold exceeded"
            );
            return self.open_activation(TransitionCause::SpeedThreshold);
        }
        self.state
    }

    /// Force `Enabled` from any state, bypassing the PIN, and restart the
    /// cooldown when the policy has one.
    pub fn on_accident_signal(&mut self) -> SafetyState {
        warn!(state = %self.state, "accident signal received");
        if self.state != SafetyState::Enabled {
            self.commit(SafetyState::Enabled, TransitionCause::Accident);
        }
        self.notifier.notify(Notice::critical(
            "Safety Mode Activated",
            "Safety mode has been automatically enabled due to detected accident.",
        ));
        if let Some(dwell) = self.config.cooldown.after_accident() {
            self.arm_cooldown(dwell);
        }
        self.state
    }

    /// Expiry callback from the [`CooldownTimer`].  Stale generations are
    /// ignored.  Returns `true` when the lock was released.
    pub fn on_cooldown_elapsed(&mut self, generation: u64) -> bool {
        if !self.cooldown.release(generation) {
            debug!(generation, "ignoring stale cooldown expiry");
            return false;
        }
        info!(generation, "cooldown elapsed");
        if self.state == SafetyState::Enabled {
            self.notifier.notify(Notice::info(
                "Cooldown Elapsed",
                "Safety mode can now be deactivated.",
            ));
        }
        true
    }

    /// Release the timer before the owner goes away.
    pub fn shutdown(&mut self) {
        self.timer.cancel();
        self.cooldown.clear();
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn open_activation(&mut self, cause: TransitionCause) -> SafetyState {
        if self.state != SafetyState::Disabled {
            debug!(state = %self.state, ?cause, "activation request ignored");
            return self.state;
        }
        self.pending_cause = cause;
        self.commit(SafetyState::PendingActivation, cause);
        self.notifier.notify(Notice::info(
            "Activate Safety Mode",
            "Enter PIN to activate safety mode.",
        ));
        self.state
    }

    fn open_deactivation(&mut self, cause: TransitionCause) -> Result<SafetyState, SafetyError> {
        if self.state != SafetyState::Enabled {
            debug!(state = %self.state, ?cause, "deactivation request ignored");
            return Ok(self.state);
        }
        if self.cooldown.is_active() {
            let remaining = self.cooldown.remaining().unwrap_or_default();
            let minutes = remaining.as_secs().div_ceil(60).max(1);
            warn!(remaining_secs = remaining.as_secs(), "deactivation rejected: cooldown active");
            self.notifier.notify(Notice::critical(
                "Cannot Deactivate",
                format!("Please wait {minutes} minutes before deactivating safety mode."),
            ));
            return Err(SafetyError::CooldownActive {
                remaining_secs: remaining.as_secs(),
            });
        }
        self.pending_cause = cause;
        self.commit(SafetyState::PendingDeactivation, cause);
        self.notifier.notify(Notice::info(
            "Deactivate Safety Mode",
            "Enter your PIN to deactivate safety mode.",
        ));
        Ok(self.state)
    }

    fn commit(&mut self, to: SafetyState, cause: TransitionCause) {
        let from = self.state;
        self.state = to;
        info!(%from, %to, ?cause, "safety state changed");
        self.transitions.push(Transition { from, to, cause });
    }

    fn arm_cooldown(&mut self, dwell: std::time::Duration) {
        let generation = self.cooldown.engage(dwell);
        info!(generation, dwell_secs = dwell.as_secs(), "cooldown armed");
        self.timer.arm(generation, dwell);
    }

    fn disarm_cooldown(&mut self) {
        if self.cooldown.is_active() {
            self.cooldown.clear();
            self.timer.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{DateTime, TimeDelta, Utc};

    use super::*;
    use crate::cooldown::{RecordingCooldownTimer, TimerCall};
    use crate::notifier::RecordingNotifier;
    use crate::pin_verifier::{PinCodes, StaticPinVerifier};

    const ACTIVATE: &str = "1234";
    const DEACTIVATE: &str = "2222";

    struct Harness {
        ctl: SafetyController,
        notices: RecordingNotifier,
        timer: RecordingCooldownTimer,
    }

    fn harness_with(config: ControllerConfig) -> Harness {
        let notices = RecordingNotifier::new();
        let timer = RecordingCooldownTimer::new();
        let ctl = SafetyController::new(
            config,
            Box::new(StaticPinVerifier::new(PinCodes::new(ACTIVATE, DEACTIVATE))),
            Box::new(notices.clone()),
            Box::new(timer.clone()),
        );
        Harness {
            ctl,
            notices,
            timer,
        }
    }

    fn harness() -> Harness {
        harness_with(ControllerConfig::default())
    }

    fn no_cooldown() -> ControllerConfig {
        ControllerConfig {
            cooldown: CooldownPolicy::Off,
            ..ControllerConfig::default()
        }
    }

    fn revert_on_failure() -> ControllerConfig {
        ControllerConfig {
            pin_failure: PinFailurePolicy::Revert,
            ..no_cooldown()
        }
    }

    fn sample(kmh: f64) -> SpeedSample {
        SpeedSample::new(kmh, DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(1))
    }

    fn enabled(h: &mut Harness) {
        h.ctl.request_activation();
        h.ctl.submit_pin(ACTIVATE).unwrap();
        assert_eq!(h.ctl.state(), SafetyState::Enabled);
    }

    // ------------------------------------------------------------------ activation

    #[test]
    fn activation_with_correct_pin_enables() {
        let mut h = harness();
        assert_eq!(h.ctl.request_activation(), SafetyState::PendingActivation);
        assert_eq!(h.ctl.submit_pin(ACTIVATE), Ok(SafetyState::Enabled));
        assert!(h.notices.titles().contains(&"Safety Mode Activated".to_string()));
        assert!(h.notices.titles().contains(&"Safety Mode Active".to_string()));
    }

    #[test]
    fn activation_request_raises_challenge() {
        let mut h = harness();
        h.ctl.request_activation();
        assert_eq!(h.notices.last().unwrap().title, "Activate Safety Mode");
    }

    #[test]
    fn activation_request_is_noop_when_not_disabled() {
        let mut h = harness();
        h.ctl.request_activation();
        let before = h.notices.notices().len();
        assert_eq!(h.ctl.request_activation(), SafetyState::PendingActivation);
        assert_eq!(h.notices.notices().len(), before);

        h.ctl.submit_pin(ACTIVATE).unwrap();
        assert_eq!(h.ctl.request_activation(), SafetyState::Enabled);
    }

    #[test]
    fn deactivate_code_does_not_activate() {
        let mut h = harness();
        h.ctl.request_activation();
        assert_eq!(
            h.ctl.submit_pin(DEACTIVATE),
            Err(SafetyError::PinRejected(PinMode::Activate))
        );
        assert_eq!(h.ctl.state(), SafetyState::PendingActivation);
    }

    // ------------------------------------------------------------------ wrong PINs

    #[test]
    fn wrong_pin_with_retry_policy_keeps_challenge_open() {
        let mut h = harness();
        h.ctl.request_activation();
        for _ in 0..5 {
            assert!(h.ctl.submit_pin("0000").is_err());
            assert_eq!(h.ctl.state(), SafetyState::PendingActivation);
        }
        assert_eq!(h.notices.last().unwrap().title, "Incorrect PIN");
        assert_eq!(h.ctl.submit_pin(ACTIVATE), Ok(SafetyState::Enabled));
    }

    #[test]
    fn wrong_pin_with_revert_policy_returns_to_prior_state() {
        let mut h = harness_with(revert_on_failure());
        h.ctl.request_activation();
        assert!(h.ctl.submit_pin("0000").is_err());
        assert_eq!(h.ctl.state(), SafetyState::Disabled);

        enabled(&mut h);
        h.ctl.request_deactivation().unwrap();
        assert!(h.ctl.submit_pin("0000").is_err());
        assert_eq!(h.ctl.state(), SafetyState::Enabled);
    }

    #[test]
    fn wrong_pin_never_reaches_target_state() {
        for config in [no_cooldown(), revert_on_failure()] {
            let mut h = harness_with(config);
            h.ctl.request_activation();
            h.ctl.submit_pin("9999").unwrap_err();
            assert_ne!(h.ctl.state(), SafetyState::Enabled);

            let mut h = harness_with(h.ctl.config().clone());
            enabled(&mut h);
            h.ctl.request_deactivation().unwrap();
            h.ctl.submit_pin(ACTIVATE).unwrap_err();
            assert_ne!(h.ctl.state(), SafetyState::Disabled);
        }
    }

    #[test]
    fn submit_pin_without_challenge_is_an_error() {
        let mut h = harness();
        assert_eq!(h.ctl.submit_pin(ACTIVATE), Err(SafetyError::NoPendingChallenge));
        assert_eq!(h.ctl.state(), SafetyState::Disabled);
    }

    #[test]
    fn cancel_reverts_pending_challenge() {
        let mut h = harness_with(no_cooldown());
        h.ctl.request_activation();
        assert_eq!(h.ctl.cancel_pin_entry(), SafetyState::Disabled);

        enabled(&mut h);
        h.ctl.request_deactivation().unwrap();
        assert_eq!(h.ctl.cancel_pin_entry(), SafetyState::Enabled);
        assert_eq!(h.ctl.cancel_pin_entry(), SafetyState::Enabled);
    }

    // ------------------------------------------------------------------ cooldown

    #[test]
    fn deactivation_rejected_while_cooldown_active() {
        let mut h = harness();
        enabled(&mut h);
        assert!(h.ctl.is_cooldown_active());

        let result = h.ctl.request_deactivation();
        assert!(matches!(result, Err(SafetyError::CooldownActive { .. })));
        assert_eq!(h.ctl.state(), SafetyState::Enabled);

        let notice = h.notices.last().unwrap();
        assert_eq!(notice.title, "Cannot Deactivate");
        assert!(notice.description.contains("15 minutes"));
    }

    #[test]
    fn deactivation_after_cooldown_elapsed_disables() {
        let mut h = harness();
        enabled(&mut h);
        let generation = h.timer.last_generation().expect("activation arms the timer");
        assert_eq!(
            h.timer.calls()[0],
            TimerCall::Arm {
                generation,
                duration: CooldownPolicy::DEFAULT_DWELL
            }
        );

        assert!(h.ctl.on_cooldown_elapsed(generation));
        assert_eq!(h.ctl.request_deactivation(), Ok(SafetyState::PendingDeactivation));
        assert_eq!(h.ctl.submit_pin(DEACTIVATE), Ok(SafetyState::Disabled));
        assert_eq!(h.notices.last().unwrap().title, "Safety Mode Deactivated");
    }

    #[test]
    fn off_policy_allows_immediate_deactivation() {
        let mut h = harness_with(no_cooldown());
        enabled(&mut h);
        assert!(!h.ctl.is_cooldown_active());
        assert!(h.timer.calls().is_empty());
        assert_eq!(h.ctl.request_deactivation(), Ok(SafetyState::PendingDeactivation));
    }

    #[test]
    fn accident_only_policy_leaves_manual_activation_unlocked() {
        let mut h = harness_with(ControllerConfig {
            cooldown: CooldownPolicy::AccidentOnly(Duration::from_secs(60)),
            ..ControllerConfig::default()
        });
        enabled(&mut h);
        assert!(!h.ctl.is_cooldown_active());

        h.ctl.on_accident_signal();
        assert!(h.ctl.is_cooldown_active());
        assert!(h.ctl.request_deactivation().is_err());
    }

    #[test]
    fn stale_cooldown_expiry_is_ignored() {
        let mut h = harness();
        enabled(&mut h);
        let first = h.timer.last_generation().unwrap();
        h.ctl.on_accident_signal();
        let second = h.timer.last_generation().unwrap();
        assert_ne!(first, second);

        assert!(!h.ctl.on_cooldown_elapsed(first));
        assert!(h.ctl.is_cooldown_active());
        assert!(h.ctl.on_cooldown_elapsed(second));
        assert!(!h.ctl.is_cooldown_active());
    }

    // ------------------------------------------------------------------ speed

    #[test]
    fn speed_above_threshold_requests_activation() {
        let mut h = harness();
        assert_eq!(h.ctl.on_speed_sample(&sample(25.0)), SafetyState::PendingActivation);
        let t = h.ctl.drain_transitions();
        assert_eq!(t.last().unwrap().cause, TransitionCause::SpeedThreshold);
    }

    #[test]
    fn speed_at_threshold_does_not_trigger() {
        let mut h = harness();
        assert_eq!(h.ctl.on_speed_sample(&sample(20.0)), SafetyState::Disabled);
        assert_eq!(h.ctl.on_speed_sample(&sample(3.0)), SafetyState::Disabled);
    }

    #[test]
    fn speed_is_ignored_unless_disabled() {
        let mut h = harness();
        enabled(&mut h);
        assert_eq!(h.ctl.on_speed_sample(&sample(90.0)), SafetyState::Enabled);
    }

    #[test]
    fn speed_after_reverted_challenge_requests_again() {
        let mut h = harness_with(revert_on_failure());
        h.ctl.on_speed_sample(&sample(30.0));
        h.ctl.submit_pin("0000").unwrap_err();
        assert_eq!(h.ctl.state(), SafetyState::Disabled);
        assert_eq!(h.ctl.on_speed_sample(&sample(31.0)), SafetyState::PendingActivation);
    }

    #[test]
    fn invalid_speed_samples_are_dropped() {
        let mut h = harness();
        assert_eq!(h.ctl.on_speed_sample(&sample(f64::NAN)), SafetyState::Disabled);
        assert_eq!(h.ctl.on_speed_sample(&sample(-50.0)), SafetyState::Disabled);
        assert!(h.ctl.drain_transitions().is_empty());
    }

    // ------------------------------------------------------------------ accident

    #[test]
    fn accident_forces_enabled_without_pin() {
        let mut h = harness();
        assert_eq!(h.ctl.on_accident_signal(), SafetyState::Enabled);
        assert!(h.ctl.is_cooldown_active());
        let notice = h.notices.last().unwrap();
        assert_eq!(notice.severity, drivesafe_types::Severity::Critical);
        assert_eq!(
            h.ctl.drain_transitions(),
            vec![Transition {
                from: SafetyState::Disabled,
                to: SafetyState::Enabled,
                cause: TransitionCause::Accident,
            }]
        );
    }

    #[test]
    fn accident_clears_pending_challenge() {
        let mut h = harness_with(no_cooldown());
        enabled(&mut h);
        h.ctl.request_deactivation().unwrap();
        assert_eq!(h.ctl.on_accident_signal(), SafetyState::Enabled);
        assert_eq!(h.ctl.submit_pin(DEACTIVATE), Err(SafetyError::NoPendingChallenge));
    }

    #[test]
    fn accident_during_activation_prompt_enables_without_pin() {
        let mut h = harness();
        h.ctl.request_activation();
        h.ctl.drain_transitions();
        assert_eq!(h.ctl.on_accident_signal(), SafetyState::Enabled);
        assert_eq!(
            h.ctl.drain_transitions(),
            vec![Transition {
                from: SafetyState::PendingActivation,
                to: SafetyState::Enabled,
                cause: TransitionCause::Accident,
            }]
        );
        assert_eq!(h.ctl.submit_pin(ACTIVATE), Err(SafetyError::NoPendingChallenge));
        assert!(h.ctl.is_cooldown_active());
    }

    #[test]
    fn accident_while_enabled_resets_cooldown() {
        let mut h = harness();
        enabled(&mut h);
        h.ctl.drain_transitions();
        h.ctl.on_accident_signal();
        assert!(h.ctl.drain_transitions().is_empty());
        let arms = h
            .timer
            .calls()
            .into_iter()
            .filter(|c| matches!(c, TimerCall::Arm { .. }))
            .count();
        assert_eq!(arms, 2);
    }

    // ------------------------------------------------------------------ override

    #[test]
    fn emergency_override_respects_cooldown() {
        let mut h = harness();
        enabled(&mut h);

        let result = h.ctl.on_emergency_override();
        assert!(matches!(result, Err(SafetyError::CooldownActive { .. })));
        assert_eq!(h.ctl.state(), SafetyState::Enabled);
        let titles = h.notices.titles();
        assert!(titles.contains(&"Emergency Override".to_string()));
        assert_eq!(titles.last().map(String::as_str), Some("Cannot Deactivate"));
        assert_eq!(h.ctl.submit_pin(DEACTIVATE), Err(SafetyError::NoPendingChallenge));
    }

    #[test]
    fn emergency_override_cannot_undo_accident_lock() {
        let mut h = harness();
        h.ctl.on_accident_signal();
        assert!(h.ctl.on_emergency_override().is_err());
        assert_eq!(h.ctl.submit_pin(DEACTIVATE), Err(SafetyError::NoPendingChallenge));
        assert_eq!(h.ctl.state(), SafetyState::Enabled);
        assert!(h.ctl.is_cooldown_active());
    }

    #[test]
    fn emergency_override_after_cooldown_still_needs_pin() {
        let mut h = harness_with(no_cooldown());
        enabled(&mut h);

        assert_eq!(h.ctl.on_emergency_override(), Ok(SafetyState::PendingDeactivation));
        assert!(h.notices.titles().contains(&"Emergency Override".to_string()));
        assert!(h.ctl.submit_pin("0000").is_err());
        assert_eq!(h.ctl.state(), SafetyState::PendingDeactivation);
        assert_eq!(h.ctl.submit_pin(DEACTIVATE), Ok(SafetyState::Disabled));
        assert_eq!(
            h.ctl.drain_transitions().last().map(|t| t.cause),
            Some(TransitionCause::EmergencyOverride)
        );
    }

    #[test]
    fn emergency_override_is_noop_when_disabled() {
        let mut h = harness();
        assert_eq!(h.ctl.on_emergency_override(), Ok(SafetyState::Disabled));
        assert!(h.notices.notices().is_empty());
    }

    // ------------------------------------------------------------------ bookkeeping

    #[test]
    fn transitions_are_recorded_in_order() {
        let mut h = harness_with(no_cooldown());
        enabled(&mut h);
        h.ctl.request_deactivation().unwrap();
        h.ctl.submit_pin(DEACTIVATE).unwrap();
        let states: Vec<_> = h.ctl.drain_transitions().into_iter().map(|t| t.to).collect();
        assert_eq!(
            states,
            vec![
                SafetyState::PendingActivation,
                SafetyState::Enabled,
                SafetyState::PendingDeactivation,
                SafetyState::Disabled,
            ]
        );
        assert!(h.ctl.drain_transitions().is_empty());
    }

    #[test]
    fn shutdown_cancels_timer() {
        let mut h = harness();
        enabled(&mut h);
        h.ctl.shutdown();
        assert!(!h.ctl.is_cooldown_active());
        assert_eq!(h.timer.calls().last(), Some(&TimerCall::Cancel));
    }
}

//! [`PinVerifier`] – the capability that decides whether a submitted PIN is
//! good for a given [`PinMode`].
//!
//! The controller never sees the expected codes; it only asks the injected
//! verifier.  [`StaticPinVerifier`] compares against a [`PinCodes`] pair held
//! in memory and wiped on drop.  Lockout or secure-storage policies wrap or
//! replace it without touching the controller (see
//! [`RateLimitedVerifier`][crate::rate_limit::RateLimitedVerifier]).

use std::fmt;

use drivesafe_types::PinMode;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Decides whether `code` unlocks `mode`.
pub trait PinVerifier: Send + Sync {
    fn verify(&self, mode: PinMode, code: &str) -> bool;
}

/// Expected PIN per mode.  Zeroized on drop and redacted in `Debug`.
///
/// # Example
///
/// ```
/// use drivesafe_kernel::pin_verifier::{PinCodes, PinVerifier, StaticPinVerifier};
/// use drivesafe_types::PinMode;
///
/// let verifier = StaticPinVerifier::new(PinCodes::new("1234", "2222"));
/// assert!(verifier.verify(PinMode::Activate, "1234"));
/// assert!(!verifier.verify(PinMode::Deactivate, "1234"));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct PinCodes {
    #[serde(default = "default_activate")]
    pub activate: String,
    #[serde(default = "default_deactivate")]
    pub deactivate: String,
}

fn default_activate() -> String {
    "1234".to_string()
}
fn default_deactivate() -> String {
    "2222".to_string()
}

impl PinCodes {
    pub fn new(activate: impl Into<String>, deactivate: impl Into<String>) -> Self {
        Self {
            activate: activate.into(),
            deactivate: deactivate.into(),
        }
    }

    /// The code expected for `mode`.
    pub fn expected(&self, mode: PinMode) -> &str {
        match mode {
            PinMode::Activate => &self.activate,
            PinMode::Deactivate => &self.deactivate,
        }
    }
}

impl Default for PinCodes {
    fn default() -> Self {
        Self::new(default_activate(), default_deactivate())
    }
}

impl fmt::Debug for PinCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinCodes")
            .field("activate", &"<redacted>")
            .field("deactivate", &"<redacted>")
            .finish()
    }
}

/// Compares submissions against a fixed [`PinCodes`] pair.
#[derive(Debug, Default)]
pub struct StaticPinVerifier {
    codes: PinCodes,
}

impl StaticPinVerifier {
    pub fn new(codes: PinCodes) -> Self {
        Self { codes }
    }
}

impl PinVerifier for StaticPinVerifier {
    fn verify(&self, mode: PinMode, code: &str) -> bool {
        let expected = self.codes.expected(mode);
        // Empty expected codes never match, even an empty submission.
        !expected.is_empty() && expected == code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_codes_match_their_modes() {
        let v = StaticPinVerifier::default();
        assert!(v.verify(PinMode::Activate, "1234"));
        assert!(v.verify(PinMode::Deactivate, "2222"));
    }

    #[test]
    fn codes_are_not_interchangeable() {
        let v = StaticPinVerifier::default();
        assert!(!v.verify(PinMode::Activate, "2222"));
        assert!(!v.verify(PinMode::Deactivate, "1234"));
    }

    #[test]
    fn wrong_and_partial_codes_rejected() {
        let v = StaticPinVerifier::new(PinCodes::new("98765", "11111"));
        assert!(!v.verify(PinMode::Activate, "9876"));
        assert!(!v.verify(PinMode::Activate, "987650"));
        assert!(!v.verify(PinMode::Activate, ""));
        assert!(v.verify(PinMode::Activate, "98765"));
    }

    #[test]
    fn empty_expected_code_never_matches() {
        let v = StaticPinVerifier::new(PinCodes::new("", "2222"));
        assert!(!v.verify(PinMode::Activate, ""));
    }

    #[test]
    fn debug_output_redacts_codes() {
        let codes = PinCodes::new("4321", "8765");
        let dbg = format!("{codes:?}");
        assert!(!dbg.contains("4321"));
        assert!(!dbg.contains("8765"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let codes: PinCodes = toml::from_str("activate = \"5555\"").unwrap();
        assert_eq!(codes.expected(PinMode::Activate), "5555");
        assert_eq!(codes.expected(PinMode::Deactivate), "2222");
    }
}

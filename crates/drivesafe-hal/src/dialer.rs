//! Emergency calling.  Dialing never touches safety-mode state.

use std::sync::{Arc, Mutex};

use drivesafe_types::SafetyError;
use tracing::info;

/// Pan-European emergency number.
pub const DEFAULT_EMERGENCY_NUMBER: &str = "112";

/// Platform capability that starts a phone call.
pub trait EmergencyDialer: Send + Sync {
    /// # Errors
    ///
    /// [`SafetyError::Dial`] if the call could not be initiated.
    fn dial(&self, number: &str) -> Result<(), SafetyError>;
}

/// Build the `tel:` URI for `number`.
///
/// # Errors
///
/// [`SafetyError::Dial`] for an empty number or one containing characters
/// other than digits, `+`, `*` and `#`.
pub fn tel_uri(number: &str) -> Result<String, SafetyError> {
    let number = number.trim();
    if number.is_empty() {
        return Err(SafetyError::Dial("empty number".to_string()));
    }
    if !number
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '*' | '#'))
    {
        return Err(SafetyError::Dial(format!("invalid number '{number}'")));
    }
    Ok(format!("tel:{number}"))
}

/// Hands a `tel:` URI to the platform.  On a headless host this only logs it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelUriDialer;

impl EmergencyDialer for TelUriDialer {
    fn dial(&self, number: &str) -> Result<(), SafetyError> {
        let uri = tel_uri(number)?;
        info!(%uri, "placing emergency call");
        Ok(())
    }
}

/// Records every dialed number.
#[derive(Debug, Default, Clone)]
pub struct RecordingDialer {
    dialed: Arc<Mutex<Vec<String>>>,
}

impl RecordingDialer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dialed(&self) -> Vec<String> {
        self.dialed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl EmergencyDialer for RecordingDialer {
    fn dial(&self, number: &str) -> Result<(), SafetyError> {
        tel_uri(number)?;
        self.dialed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(number.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tel_uri_for_default_number() {
        assert_eq!(tel_uri(DEFAULT_EMERGENCY_NUMBER).unwrap(), "tel:112");
    }

    #[test]
    fn tel_uri_rejects_garbage() {
        assert!(matches!(tel_uri(""), Err(SafetyError::Dial(_))));
        assert!(matches!(tel_uri("11a"), Err(SafetyError::Dial(_))));
        assert!(tel_uri("+44 112").is_err());
        assert!(tel_uri("*#06#").is_ok());
    }

    #[test]
    fn tel_uri_dialer_accepts_valid_number() {
        assert!(TelUriDialer.dial("112").is_ok());
        assert!(TelUriDialer.dial("nope").is_err());
    }

    #[test]
    fn recording_dialer_keeps_history() {
        let d = RecordingDialer::new();
        d.dial("112").unwrap();
        d.dial("999").unwrap();
        assert!(d.dial("").is_err());
        assert_eq!(d.dialed(), vec!["112".to_string(), "999".to_string()]);
    }
}

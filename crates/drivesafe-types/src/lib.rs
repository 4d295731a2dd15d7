use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Safety-mode state machine. `Disabled` and `Enabled` are stable; the two
/// pending states wait for a PIN before committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SafetyState {
    #[default]
    Disabled,
    PendingActivation,
    Enabled,
    PendingDeactivation,
}

impl SafetyState {
    /// `true` for the two states that await PIN confirmation.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::PendingActivation | Self::PendingDeactivation)
    }

    /// The PIN mode a pending state is waiting on.
    pub fn pending_mode(self) -> Option<PinMode> {
        match self {
            Self::PendingActivation => Some(PinMode::Activate),
            Self::PendingDeactivation => Some(PinMode::Deactivate),
            _ => None,
        }
    }
}

impl fmt::Display for SafetyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyState::Disabled => write!(f, "disabled"),
            SafetyState::PendingActivation => write!(f, "pending activation"),
            SafetyState::Enabled => write!(f, "enabled"),
            SafetyState::PendingDeactivation => write!(f, "pending deactivation"),
        }
    }
}

/// Which PIN a challenge expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinMode {
    Activate,
    Deactivate,
}

impl PinMode {
    /// Stable state committed when the PIN for this mode is accepted.
    pub fn target(self) -> SafetyState {
        match self {
            PinMode::Activate => SafetyState::Enabled,
            PinMode::Deactivate => SafetyState::Disabled,
        }
    }

    /// Stable state the challenge started from.
    pub fn origin(self) -> SafetyState {
        match self {
            PinMode::Activate => SafetyState::Disabled,
            PinMode::Deactivate => SafetyState::Enabled,
        }
    }
}

impl fmt::Display for PinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinMode::Activate => write!(f, "activate"),
            PinMode::Deactivate => write!(f, "deactivate"),
        }
    }
}

/// Why safety mode changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    /// Toggle pressed by the driver.
    Manual,
    /// Speed crossed the auto-activation threshold.
    SpeedThreshold,
    /// Accident heuristic fired; PIN bypassed.
    Accident,
    /// Emergency override button.
    EmergencyOverride,
}

/// How loudly a [`Notice`] should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
}

/// A human-readable status message for the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notice {
    pub fn new(title: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
        }
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, Severity::Info)
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, Severity::Warning)
    }

    pub fn critical(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, Severity::Critical)
    }
}

/// One speed reading in km/h.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedSample {
    pub speed_kmh: f64,
    pub timestamp: DateTime<Utc>,
}

impl SpeedSample {
    pub fn new(speed_kmh: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            speed_kmh,
            timestamp,
        }
    }

    /// Finite and non-negative.
    pub fn is_valid(&self) -> bool {
        self.speed_kmh.is_finite() && self.speed_kmh >= 0.0
    }
}

/// WGS-84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPosition {
    /// Map centre used until the first fix arrives.
    pub const DEFAULT_CENTER: GeoPosition = GeoPosition {
        latitude: 51.505,
        longitude: -0.09,
    };

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl Default for GeoPosition {
    fn default() -> Self {
        Self::DEFAULT_CENTER
    }
}

/// Unified event wrapper for the in-process event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "drivesafe-runtime::session"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Speed(SpeedSample),
    Position(GeoPosition),
    StateChanged {
        from: SafetyState,
        to: SafetyState,
        cause: TransitionCause,
    },
    AccidentDetected {
        drop_kmh: f64,
        elapsed_ms: i64,
    },
    Notice(Notice),
    /// Auto-response sent to someone who messaged the driver.
    AutoReply {
        recipient: String,
        message: String,
    },
    EmergencyCall {
        number: String,
    },
}

/// Error type shared by every DriveSafe crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SafetyError {
    #[error("Incorrect PIN for {0}")]
    PinRejected(PinMode),

    #[error("Deactivation blocked by cooldown: {remaining_secs}s remaining")]
    CooldownActive { remaining_secs: u64 },

    #[error("No PIN challenge is pending")]
    NoPendingChallenge,

    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("Map initialisation failed: {0}")]
    MapInit(String),

    #[error("Emergency call failed: {0}")]
    Dial(String),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}

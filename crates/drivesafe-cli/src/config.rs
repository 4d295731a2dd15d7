//! Configuration Vault – reads/writes `~/.drivesafe/config.toml`.
//!
//! The file holds the two safety-mode PINs, so it is written owner-only.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use drivesafe_hal::DEFAULT_EMERGENCY_NUMBER;
use drivesafe_hal::sim::{DEFAULT_TICK, MAX_SIM_SPEED_KMH};
use drivesafe_kernel::messages::DEFAULT_AUTO_RESPONSE;
use drivesafe_kernel::{
    AccidentThresholds, ControllerConfig, CooldownPolicy, PinCodes, PinFailurePolicy,
};
use drivesafe_runtime::SessionConfig;
use serde::{Deserialize, Serialize};

/// Which entries into safety mode lock deactivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownMode {
    Off,
    AccidentOnly,
    #[default]
    AnyActivation,
}

impl std::fmt::Display for CooldownMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CooldownMode::Off => write!(f, "off"),
            CooldownMode::AccidentOnly => write!(f, "accident_only"),
            CooldownMode::AnyActivation => write!(f, "any_activation"),
        }
    }
}

/// Persisted user configuration stored in `~/.drivesafe/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Speeds strictly above this (km/h) prompt for activation.
    #[serde(default = "default_activation_speed")]
    pub activation_speed_kmh: f64,

    #[serde(default = "default_accident_drop")]
    pub accident_drop_kmh: f64,

    #[serde(default = "default_accident_window")]
    pub accident_window_secs: u64,

    #[serde(default)]
    pub cooldown_mode: CooldownMode,

    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    #[serde(default)]
    pub pin_failure: PinFailurePolicy,

    /// PIN attempts allowed per minute; `0` disables the limit.
    #[serde(default)]
    pub pin_attempts_per_minute: u32,

    #[serde(default = "default_emergency_number")]
    pub emergency_number: String,

    #[serde(default = "default_auto_response")]
    pub auto_response: String,

    /// Simulated sampler period.
    #[serde(default = "default_sample_interval")]
    pub sample_interval_ms: u64,

    #[serde(default = "default_max_sim_speed")]
    pub max_sim_speed_kmh: f64,

    /// JSON-lines GPS replay to use instead of the simulator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_replay: Option<PathBuf>,

    /// Endpoint returning `{"token": "..."}` for the map view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_token_url: Option<String>,

    /// Activation / deactivation codes.  Redacted in `Debug`.  Kept last so
    /// it serialises as the trailing `[pins]` table.
    #[serde(default)]
    pub pins: PinCodes,
}

fn default_activation_speed() -> f64 {
    20.0
}
fn default_accident_drop() -> f64 {
    90.0
}
fn default_accident_window() -> u64 {
    10
}
fn default_cooldown_secs() -> u64 {
    CooldownPolicy::DEFAULT_DWELL.as_secs()
}
fn default_emergency_number() -> String {
    DEFAULT_EMERGENCY_NUMBER.to_string()
}
fn default_auto_response() -> String {
    DEFAULT_AUTO_RESPONSE.to_string()
}
fn default_sample_interval() -> u64 {
    DEFAULT_TICK.as_millis() as u64
}
fn default_max_sim_speed() -> f64 {
    MAX_SIM_SPEED_KMH
}

impl Default for Config {
    fn default() -> Self {
        Self {
            activation_speed_kmh: default_activation_speed(),
            accident_drop_kmh: default_accident_drop(),
            accident_window_secs: default_accident_window(),
            cooldown_mode: CooldownMode::default(),
            cooldown_secs: default_cooldown_secs(),
            pin_failure: PinFailurePolicy::default(),
            pin_attempts_per_minute: 0,
            emergency_number: default_emergency_number(),
            auto_response: default_auto_response(),
            sample_interval_ms: default_sample_interval(),
            max_sim_speed_kmh: default_max_sim_speed(),
            gps_replay: None,
            map_token_url: None,
            pins: PinCodes::default(),
        }
    }
}

impl Config {
    pub fn cooldown_policy(&self) -> CooldownPolicy {
        let dwell = Duration::from_secs(self.cooldown_secs);
        match self.cooldown_mode {
            CooldownMode::Off => CooldownPolicy::Off,
            CooldownMode::AccidentOnly => CooldownPolicy::AccidentOnly(dwell),
            CooldownMode::AnyActivation => CooldownPolicy::AnyActivation(dwell),
        }
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    /// Session settings derived from this file.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            controller: ControllerConfig {
                activation_speed_kmh: self.activation_speed_kmh,
                cooldown: self.cooldown_policy(),
                pin_failure: self.pin_failure,
                emergency_number: self.emergency_number.clone(),
            },
            accident: AccidentThresholds {
                min_drop_kmh: self.accident_drop_kmh,
                window: Duration::from_secs(self.accident_window_secs),
            },
            auto_response: self.auto_response.clone(),
            ..SessionConfig::default()
        }
    }
}

/// A usable PIN: 4 to 8 ASCII digits.
pub fn is_valid_pin(pin: &str) -> bool {
    (4..=8).contains(&pin.len()) && pin.chars().all(|c| c.is_ascii_digit())
}

/// Return the path to `~/.drivesafe/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".drivesafe").join("config.toml")
}

/// Load the config from disk with environment overrides applied.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    Ok(load_from(&config_path())?.map(|mut cfg| {
        apply_env_overrides(&mut cfg);
        cfg
    }))
}

/// The on-disk config, or defaults (with environment overrides) when the
/// file is missing or unreadable.
pub fn load_or_default() -> Config {
    match load() {
        Ok(Some(cfg)) => cfg,
        Ok(None) | Err(_) => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `DRIVESAFE_*` environment variable overrides to `cfg`.
/// Unparseable values are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `DRIVESAFE_ACTIVATE_PIN` | `pins.activate` |
/// | `DRIVESAFE_DEACTIVATE_PIN` | `pins.deactivate` |
/// | `DRIVESAFE_ACTIVATION_SPEED` | `activation_speed_kmh` |
/// | `DRIVESAFE_COOLDOWN_SECS` | `cooldown_secs` |
/// | `DRIVESAFE_EMERGENCY_NUMBER` | `emergency_number` |
/// | `DRIVESAFE_GPS_REPLAY` | `gps_replay` |
/// | `DRIVESAFE_MAP_TOKEN_URL` | `map_token_url` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("DRIVESAFE_ACTIVATE_PIN")
        && is_valid_pin(&v)
    {
        cfg.pins.activate = v;
    }
    if let Ok(v) = std::env::var("DRIVESAFE_DEACTIVATE_PIN")
        && is_valid_pin(&v)
    {
        cfg.pins.deactivate = v;
    }
    if let Ok(v) = std::env::var("DRIVESAFE_ACTIVATION_SPEED")
        && let Ok(kmh) = v.parse::<f64>()
        && kmh.is_finite()
        && kmh >= 0.0
    {
        cfg.activation_speed_kmh = kmh;
    }
    if let Ok(v) = std::env::var("DRIVESAFE_COOLDOWN_SECS")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.cooldown_secs = secs;
    }
    if let Ok(v) = std::env::var("DRIVESAFE_EMERGENCY_NUMBER") {
        cfg.emergency_number = v;
    }
    if let Ok(v) = std::env::var("DRIVESAFE_GPS_REPLAY") {
        cfg.gps_replay = Some(PathBuf::from(v));
    }
    if let Ok(v) = std::env::var("DRIVESAFE_MAP_TOKEN_URL") {
        cfg.map_token_url = Some(v);
    }
}

/// Save the config to disk, creating `~/.drivesafe/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    // Owner-only read/write (rw-------) on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_pins() {
        let mut cfg = Config::default();
        cfg.pins = PinCodes::new("918273", "564738");
        let debug_str = format!("{:?}", cfg);
        assert!(!debug_str.contains("918273"));
        assert!(!debug_str.contains("564738"));
        assert!(debug_str.contains("<redacted>"));
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600, "config file must have 0o600 permissions");

        let parent = path.parent().expect("config file has a parent");
        let dir_mode = fs::metadata(parent).expect("dir metadata").permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700, "config directory must have 0o700 permissions");
    }

    #[test]
    fn roundtrip_custom_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = Config::default();
        cfg.pins = PinCodes::new("4321", "8765");
        cfg.cooldown_mode = CooldownMode::AccidentOnly;
        cfg.cooldown_secs = 60;
        cfg.pin_failure = PinFailurePolicy::Revert;
        cfg.gps_replay = Some(PathBuf::from("/tmp/drive.jsonl"));
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.pins, PinCodes::new("4321", "8765"));
        assert_eq!(loaded.cooldown_mode, CooldownMode::AccidentOnly);
        assert_eq!(loaded.pin_failure, PinFailurePolicy::Revert);
        assert_eq!(
            loaded.cooldown_policy(),
            CooldownPolicy::AccidentOnly(Duration::from_secs(60))
        );
        assert_eq!(loaded.gps_replay, Some(PathBuf::from("/tmp/drive.jsonl")));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "activation_speed_kmh = 30.0\n").expect("write");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.activation_speed_kmh, 30.0);
        assert_eq!(loaded.pins, PinCodes::default());
        assert_eq!(loaded.cooldown_policy(), CooldownPolicy::default());
        assert_eq!(loaded.emergency_number, "112");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "cooldown_mode = \"sometimes\"\n").expect("write");
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn config_path_points_to_drivesafe_dir() {
        let p = config_path_for_home("/home/driver");
        assert_eq!(p, PathBuf::from("/home/driver/.drivesafe/config.toml"));
    }

    #[test]
    fn session_config_carries_thresholds() {
        let mut cfg = Config::default();
        cfg.activation_speed_kmh = 15.0;
        cfg.accident_window_secs = 4;
        cfg.emergency_number = "911".into();
        let session = cfg.session_config();
        assert_eq!(session.controller.activation_speed_kmh, 15.0);
        assert_eq!(session.controller.emergency_number, "911");
        assert_eq!(session.accident.window, Duration::from_secs(4));
        assert_eq!(session.auto_response, DEFAULT_AUTO_RESPONSE);
    }

    #[test]
    fn pin_validation() {
        assert!(is_valid_pin("1234"));
        assert!(is_valid_pin("12345678"));
        assert!(!is_valid_pin("123"));
        assert!(!is_valid_pin("123456789"));
        assert!(!is_valid_pin("12a4"));
        assert!(!is_valid_pin(""));
    }

    #[test]
    fn env_override_changes_activation_pin() {
        // SAFETY: each env test touches its own variable.
        unsafe { std::env::set_var("DRIVESAFE_ACTIVATE_PIN", "5555") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.pins.activate, "5555");
        unsafe { std::env::remove_var("DRIVESAFE_ACTIVATE_PIN") };
    }

    #[test]
    fn env_override_ignores_invalid_pin() {
        // SAFETY: each env test touches its own variable.
        unsafe { std::env::set_var("DRIVESAFE_DEACTIVATE_PIN", "12") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.pins.deactivate, "2222");
        unsafe { std::env::remove_var("DRIVESAFE_DEACTIVATE_PIN") };
    }

    #[test]
    fn env_override_ignores_negative_speed() {
        // SAFETY: each env test touches its own variable.
        unsafe { std::env::set_var("DRIVESAFE_ACTIVATION_SPEED", "-5") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.activation_speed_kmh, 20.0);
        unsafe { std::env::remove_var("DRIVESAFE_ACTIVATION_SPEED") };
    }

    #[test]
    fn env_override_changes_cooldown() {
        // SAFETY: each env test touches its own variable.
        unsafe { std::env::set_var("DRIVESAFE_COOLDOWN_SECS", "120") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(
            cfg.cooldown_policy(),
            CooldownPolicy::AnyActivation(Duration::from_secs(120))
        );
        unsafe { std::env::remove_var("DRIVESAFE_COOLDOWN_SECS") };
    }

    #[test]
    fn env_override_sets_replay_path() {
        // SAFETY: each env test touches its own variable.
        unsafe { std::env::set_var("DRIVESAFE_GPS_REPLAY", "/data/commute.jsonl") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.gps_replay, Some(PathBuf::from("/data/commute.jsonl")));
        unsafe { std::env::remove_var("DRIVESAFE_GPS_REPLAY") };
    }
}

//! Session configuration
//!
//! Defaults can be overridden from the environment (`QR_SCAN_*`) and then by
//! the caller's own flags.

use crate::error::ConfigError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which camera a session should open
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceSelector {
    /// Whatever the platform considers the default camera
    #[default]
    Default,
    /// Camera by enumeration index
    Index(u32),
    /// Camera by human-readable name
    Name(String),
}

impl FromStr for DeviceSelector {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("default") {
            return Ok(DeviceSelector::Default);
        }
        let digits = s.strip_prefix("index:").unwrap_or(s);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return digits
                .parse::<u32>()
                .map(DeviceSelector::Index)
                .map_err(|_| ConfigError::InvalidValue {
                    key: "device".to_string(),
                    value: s.to_string(),
                });
        }
        Ok(DeviceSelector::Name(s.to_string()))
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Default => f.write_str("default"),
            DeviceSelector::Index(i) => write!(f, "index:{}", i),
            DeviceSelector::Name(name) => f.write_str(name),
        }
    }
}

/// Tunables for one scan session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Camera to open
    pub device: DeviceSelector,
    /// Longest wait for one frame; also the cancellation check interval
    pub frame_timeout: Duration,
    /// Decode results slower than this are discarded
    pub decode_budget: Duration,
    /// Longest wait for a camera to finish opening
    pub open_timeout: Duration,
    /// Retry undecodable frames once with contrast stretch + Otsu binarization
    pub enhance: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            device: DeviceSelector::Default,
            frame_timeout: Duration::from_millis(100),
            decode_budget: Duration::from_millis(250),
            open_timeout: Duration::from_secs(5),
            enhance: true,
        }
    }
}

impl ScanConfig {
    /// Defaults overridden by `QR_SCAN_DEVICE`, `QR_SCAN_FRAME_TIMEOUT_MS`,
    /// `QR_SCAN_DECODE_BUDGET_MS`, `QR_SCAN_OPEN_TIMEOUT_MS` and `QR_SCAN_ENHANCE`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ScanConfig::from_env`] with an injectable variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup("QR_SCAN_DEVICE") {
            config.device = value.parse()?;
        }
        if let Some(value) = lookup("QR_SCAN_FRAME_TIMEOUT_MS") {
            config.frame_timeout = parse_millis("QR_SCAN_FRAME_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("QR_SCAN_DECODE_BUDGET_MS") {
            config.decode_budget = parse_millis("QR_SCAN_DECODE_BUDGET_MS", &value)?;
        }
        if let Some(value) = lookup("QR_SCAN_OPEN_TIMEOUT_MS") {
            config.open_timeout = parse_millis("QR_SCAN_OPEN_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("QR_SCAN_ENHANCE") {
            config.enhance = parse_bool_u8("QR_SCAN_ENHANCE", &value)?;
        }
        Ok(config)
    }

    /// Camera to open
    pub fn device(mut self, device: DeviceSelector) -> Self {
        self.device = device;
        self
    }

    /// Longest wait for one frame, which also bounds cancel latency
    pub fn frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    /// Discard decode results that took longer than `budget`
    pub fn decode_budget(mut self, budget: Duration) -> Self {
        self.decode_budget = budget;
        self
    }

    /// Give up on a camera that has not started streaming after `timeout`
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Toggle the enhancement retry
    pub fn enhance(mut self, enhance: bool) -> Self {
        self.enhance = enhance;
        self
    }
}

fn parse_millis(key: &str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_bool_u8(key: &str, value: &str) -> Result<bool, ConfigError> {
    value
        .trim()
        .parse::<u8>()
        .map(|v| v != 0)
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

/// Optional downscale bound for images loaded by the tools (`QR_MAX_DIM`, 0 = off)
pub fn max_dim_from_env() -> Option<u32> {
    match std::env::var("QR_MAX_DIM") {
        Ok(value) => match value.trim().parse::<u32>() {
            Ok(0) => None,
            Ok(v) => Some(v),
            Err(_) => None,
        },
        Err(_) => None,
    }
}

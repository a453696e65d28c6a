//! Driver configuration.
//!
//! All knobs have defaults matching the behavior this driver was tuned with, so an
//! empty TOML document is a valid configuration:
//!
//! ```
//! use padhost::config::DriverConfig;
//!
//! let cfg = DriverConfig::from_toml_str("player = 2\ntimeout_streak_limit = 250").unwrap();
//! assert_eq!(cfg.player, 2);
//! assert_eq!(cfg.poll_ratio_percent, 75);
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// Player number shown on the gamepad's LEDs (1..=4).
    pub player: u8,
    /// Timeout for control transfers (descriptor reads).
    pub control_timeout_ms: u32,
    /// Largest HID report descriptor that will be fetched; larger ones keep only metadata.
    pub hid_report_ceiling: usize,
    /// Largest configuration descriptor blob that will be fetched.
    pub max_configuration_len: usize,
    /// Throwaway reads issued after XInput init to drain stale reports.
    pub drain_reads: u8,
    pub drain_timeout_ms: u32,
    /// Timeout for interrupt OUT writes (LED and handshake commands).
    pub write_timeout_ms: u32,
    /// Reads waited per SwitchPro handshake step before giving up.
    pub handshake_attempts: u8,
    pub handshake_timeout_ms: u32,
    /// Poll target as a percentage of the endpoint's effective interval.
    pub poll_ratio_percent: u32,
    /// Consecutive read timeouts treated as a disconnect. `None` never gives up.
    pub timeout_streak_limit: Option<u32>,
    /// Fall back to raw HID passthrough when a SwitchPro handshake fails.
    pub switch_pro_failover: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            player: 1,
            control_timeout_ms: 300,
            hid_report_ceiling: 512,
            max_configuration_len: 1024,
            drain_reads: 8,
            drain_timeout_ms: 5,
            write_timeout_ms: 100,
            handshake_attempts: 8,
            handshake_timeout_ms: 10,
            poll_ratio_percent: 75,
            timeout_streak_limit: None,
            switch_pro_failover: true,
        }
    }
}

impl DriverConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: DriverConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=4).contains(&self.player) {
            return Err(Error::InvalidConfig(format!(
                "player must be in 1..=4, got {}",
                self.player
            )));
        }
        if !(1..=100).contains(&self.poll_ratio_percent) {
            return Err(Error::InvalidConfig(format!(
                "poll_ratio_percent must be in 1..=100, got {}",
                self.poll_ratio_percent
            )));
        }
        if self.handshake_attempts == 0 {
            return Err(Error::InvalidConfig(
                "handshake_attempts must be at least 1".into(),
            ));
        }
        if self.max_configuration_len < 9 {
            return Err(Error::InvalidConfig(
                "max_configuration_len must hold at least a 9-byte header".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let cfg = DriverConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, DriverConfig::default());
    }

    #[test]
    fn rejects_out_of_range_player() {
        let err = DriverConfig::from_toml_str("player = 5").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = DriverConfig::from_toml_str("plyer = 2").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn reads_optional_streak_limit() {
        let cfg = DriverConfig::from_toml_str("timeout_streak_limit = 40").unwrap();
        assert_eq!(cfg.timeout_streak_limit, Some(40));
    }
}

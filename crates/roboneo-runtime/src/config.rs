//! Runtime configuration
//!
//! Loaded from a JSON file that may carry `//` and `/* */` comments
//! (`config.jsonc`). Every key is optional and falls back to the
//! defaults below. The capitalised key names of older config files
//! (`Expression_pins`, `Frame_cache_limit`, ...) are accepted as aliases.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use json_comments::StripComments;
use serde::{Deserialize, Serialize};

use roboneo_core::{period_from_hz, FaceError, FaceResult};
use roboneo_link::SessionConfig;

/// Which display adapter drives the local panel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayKind {
    /// True-colour blocks in the terminal
    #[default]
    Terminal,
    /// Unicorn HAT HD over SPI
    UnicornHat,
}

/// Face runtime configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Expression name to trigger input pin
    #[serde(alias = "Expression_pins")]
    pub expressions: BTreeMap<String, u8>,
    /// Expression shown at startup and after a momentary release
    #[serde(alias = "Default")]
    pub default: Option<String>,
    /// Keep the last pressed expression after release
    #[serde(alias = "Sticky")]
    pub sticky: bool,
    /// Animations with fewer frames than this are decoded up front
    #[serde(alias = "Frame_cache_limit")]
    pub frame_cache_limit: usize,
    /// Render rate in Hz
    #[serde(alias = "Update_rate")]
    pub update_rate: f64,
    /// Link send rate in Hz
    pub link_send_rate: f64,
    #[serde(alias = "Port")]
    pub port: PathBuf,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// Panel rotation in degrees, a multiple of 90
    #[serde(alias = "Rotation")]
    pub rotation: u16,
    #[serde(alias = "Flip_horizontal")]
    pub flip_horizontal: bool,
    #[serde(alias = "Flip_vertical")]
    pub flip_vertical: bool,
    pub display: DisplayKind,
    pub spi_device: PathBuf,
    /// Directory of `<expression>.gif` / `<expression>.ppm` files
    pub assets_dir: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            expressions: BTreeMap::new(),
            default: None,
            sticky: false,
            frame_cache_limit: 128,
            update_rate: 30.0,
            link_send_rate: 20.0,
            port: PathBuf::from("/dev/serial0"),
            baud_rate: 115_200,
            read_timeout_ms: 100,
            rotation: 0,
            flip_horizontal: false,
            flip_vertical: false,
            display: DisplayKind::Terminal,
            spi_device: PathBuf::from("/dev/spidev0.0"),
            assets_dir: PathBuf::from("expressions"),
        }
    }
}

impl RuntimeConfig {
    /// Read and validate a config file
    pub fn load(path: &Path) -> FaceResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FaceError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_json(&text)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate JSON config text. Comments are blanked out before
    /// parsing, so reported error positions still match the file.
    pub fn from_json(text: &str) -> FaceResult<Self> {
        let stripped = StripComments::new(text.as_bytes());
        let config: RuntimeConfig =
            serde_json::from_reader(stripped).map_err(|e| FaceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FaceResult<()> {
        if self.expressions.is_empty() {
            return Err(FaceError::Config("no expressions configured".into()));
        }
        if let Some(default) = &self.default {
            if !self.expressions.contains_key(default) {
                return Err(FaceError::Config(format!(
                    "default expression '{}' is not configured",
                    default
                )));
            }
        }
        if period_from_hz(self.update_rate).is_none() {
            return Err(FaceError::Config(format!(
                "update_rate must be positive, got {}",
                self.update_rate
            )));
        }
        if period_from_hz(self.link_send_rate).is_none() {
            return Err(FaceError::Config(format!(
                "link_send_rate must be positive, got {}",
                self.link_send_rate
            )));
        }
        if self.read_timeout_ms == 0 {
            return Err(FaceError::Config("read_timeout_ms must be positive".into()));
        }
        if self.rotation % 90 != 0 {
            return Err(FaceError::Config(format!(
                "rotation must be a multiple of 90, got {}",
                self.rotation
            )));
        }
        Ok(())
    }

    /// Expression names in a stable order
    pub fn expression_names(&self) -> Vec<String> {
        self.expressions.keys().cloned().collect()
    }

    pub fn render_interval(&self) -> Duration {
        period_from_hz(self.update_rate).unwrap_or(Duration::from_millis(33))
    }

    pub fn session_config(&self) -> SessionConfig {
        let defaults = SessionConfig::default();
        SessionConfig {
            send_interval: period_from_hz(self.link_send_rate).unwrap_or(defaults.send_interval),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.frame_cache_limit, 128);
        assert_eq!(config.update_rate, 30.0);
        assert_eq!(config.link_send_rate, 20.0);
        assert_eq!(config.port, PathBuf::from("/dev/serial0"));
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.display, DisplayKind::Terminal);
        assert!(!config.sticky);
    }

    #[test]
    fn test_parse_minimal() {
        let config = RuntimeConfig::from_json(
            r#"{ "expressions": { "happy": 17, "sad": 27 }, "default": "happy" }"#,
        )
        .unwrap();
        assert_eq!(config.expression_names(), vec!["happy", "sad"]);
        assert_eq!(config.default.as_deref(), Some("happy"));
        assert_eq!(config.frame_cache_limit, 128);
    }

    #[test]
    fn test_parse_legacy_keys() {
        let config = RuntimeConfig::from_json(
            r#"{
                "Expression_pins": { "blink": 4 },
                "Default": "blink",
                "Sticky": true,
                "Frame_cache_limit": 16,
                "Update_rate": 60,
                "Port": "/dev/ttyAMA0",
                "Rotation": 180,
                "Flip_horizontal": true,
                "Flip_vertical": false,
                "display": "unicorn_hat"
            }"#,
        )
        .unwrap();
        assert!(config.sticky);
        assert_eq!(config.frame_cache_limit, 16);
        assert_eq!(config.update_rate, 60.0);
        assert_eq!(config.port, PathBuf::from("/dev/ttyAMA0"));
        assert_eq!(config.rotation, 180);
        assert_eq!(config.display, DisplayKind::UnicornHat);
    }

    #[test]
    fn test_parse_commented_config() {
        let config = RuntimeConfig::from_json(
            r#"{
                // GPIO pin per expression
                "Expression_pins": { "happy": 17, /* temporary */ "sad": 27 },
                "Default": "happy", // shown at boot
                /* "Sticky": true, */
                "Port": "/dev/ttyAMA0"
            }"#,
        )
        .unwrap();
        assert_eq!(config.expression_names(), vec!["happy", "sad"]);
        assert_eq!(config.default.as_deref(), Some("happy"));
        assert!(!config.sticky);
        assert_eq!(config.port, PathBuf::from("/dev/ttyAMA0"));
    }

    #[test]
    fn test_load_commented_file() {
        let path = std::env::temp_dir().join(format!("roboneo-config-{}.jsonc", std::process::id()));
        std::fs::write(&path, "// face config\n{ \"expressions\": { \"blink\": 4 } }\n").unwrap();
        let config = RuntimeConfig::load(&path).unwrap();
        assert_eq!(config.expression_names(), vec!["blink"]);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_rejects_empty_expressions() {
        assert!(matches!(
            RuntimeConfig::from_json("{}"),
            Err(FaceError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_default() {
        let result = RuntimeConfig::from_json(r#"{ "expressions": { "happy": 1 }, "default": "angry" }"#);
        assert!(matches!(result, Err(FaceError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_rates_and_rotation() {
        let mut config = RuntimeConfig::default();
        config.expressions.insert("happy".into(), 1);
        assert!(config.validate().is_ok());

        config.update_rate = 0.0;
        assert!(config.validate().is_err());
        config.update_rate = 30.0;

        config.link_send_rate = -1.0;
        assert!(config.validate().is_err());
        config.link_send_rate = 20.0;

        config.rotation = 45;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            RuntimeConfig::from_json("{ not json"),
            Err(FaceError::Config(_))
        ));
    }

    #[test]
    fn test_session_config_from_rates() {
        let mut config = RuntimeConfig::default();
        config.link_send_rate = 10.0;
        config.read_timeout_ms = 250;
        let session = config.session_config();
        assert_eq!(session.send_interval, Duration::from_millis(100));
        assert_eq!(session.read_timeout, Duration::from_millis(250));
    }
}

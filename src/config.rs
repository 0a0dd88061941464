//! Configuration management for the stereo vision streaming core

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::types::JpegConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete stereo vision core configuration, as loaded by the CLI harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, rename = "vision")]
    pub vision: VisionConfig,
}

/// Stereo vision streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Target address of the detection gRPC service, e.g. "127.0.0.1:50051"
    #[serde(default = "default_grpc_target")]
    pub grpc_target: String,

    /// Left camera configuration
    #[serde(default)]
    pub camera_left: CameraConfig,

    /// Right camera configuration
    #[serde(default)]
    pub camera_right: CameraConfig,

    /// JPEG quality applied to both cameras (1-100)
    #[serde(default = "default_quality")]
    pub jpeg_quality: i32,

    /// Minimum detection score forwarded to `on_result`
    #[serde(default)]
    pub score_threshold: f32,

    /// Prefix used to build the `image_id` reported with each result
    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,

    /// Base identifier distinguishing concurrent stereo sessions on the wire
    #[serde(default = "default_stream_base")]
    pub stream_base: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            grpc_target: default_grpc_target(),
            camera_left: CameraConfig::default_left(),
            camera_right: CameraConfig::default_right(),
            jpeg_quality: default_quality(),
            score_threshold: 0.0,
            image_prefix: default_image_prefix(),
            stream_base: default_stream_base(),
        }
    }
}

/// Per-camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Enable this camera slot
    #[serde(default)]
    pub enabled: bool,

    /// Camera identifier as returned by enumeration, e.g. "/dev/video0"
    #[serde(default)]
    pub device: String,

    /// Frame width in pixels (0 = platform default)
    #[serde(default)]
    pub width: u32,

    /// Frame height in pixels (0 = platform default)
    #[serde(default)]
    pub height: u32,

    /// Frames per second (0 = platform default)
    #[serde(default)]
    pub fps: u32,
}

impl CameraConfig {
    fn default_left() -> Self {
        Self {
            enabled: false,
            device: String::new(),
            width: 0,
            height: 0,
            fps: 0,
        }
    }

    fn default_right() -> Self {
        Self::default_left()
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::default_left()
    }
}

// Default value functions
fn default_grpc_target() -> String {
    "127.0.0.1:50051".to_string()
}
fn default_quality() -> i32 {
    JpegConfig::DEFAULT_QUALITY as i32
}
fn default_image_prefix() -> String {
    "img".to_string()
}
fn default_stream_base() -> String {
    "default".to_string()
}

impl Config {
    /// Loads configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let cfg = &self.vision;

        if cfg.grpc_target.is_empty() {
            return Err(ConfigError::Invalid("grpc_target must not be empty".into()));
        }

        if !cfg.camera_left.enabled && !cfg.camera_right.enabled {
            return Err(ConfigError::Invalid(
                "at least one of camera_left / camera_right must be enabled".into(),
            ));
        }

        if cfg.camera_left.enabled {
            self.validate_camera(&cfg.camera_left, "camera_left")?;
        }
        if cfg.camera_right.enabled {
            self.validate_camera(&cfg.camera_right, "camera_right")?;
        }

        if cfg.jpeg_quality < 0 || cfg.jpeg_quality > 100 {
            return Err(ConfigError::Invalid(format!(
                "jpeg_quality must be between 0 and 100, got {}",
                cfg.jpeg_quality
            )));
        }

        Ok(())
    }

    fn validate_camera(&self, cam: &CameraConfig, name: &str) -> Result<(), ConfigError> {
        if cam.device.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "{}: device must not be empty when enabled",
                name
            )));
        }
        Ok(())
    }

    /// Saves configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vision: VisionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.vision.camera_left.enabled);
        assert_eq!(config.vision.jpeg_quality, 70);
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
[vision]
grpc_target = "192.168.1.50:50051"
jpeg_quality = 80
score_threshold = 0.5
image_prefix = "stereo"
stream_base = "rig1"

[vision.camera_left]
enabled = true
device = "/dev/video0"
width = 1280
height = 720
fps = 30

[vision.camera_right]
enabled = true
device = "/dev/video1"
width = 1280
height = 720
fps = 30
        "#;

        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.vision.grpc_target, "192.168.1.50:50051");
        assert_eq!(config.vision.jpeg_quality, 80);
        assert_eq!(config.vision.score_threshold, 0.5);
        assert_eq!(config.vision.image_prefix, "stereo");
        assert!(config.vision.camera_left.enabled);
        assert_eq!(config.vision.camera_left.width, 1280);
        assert!(config.vision.camera_right.enabled);
    }

    #[test]
    fn test_rejects_no_cameras() {
        let toml = r#"
[vision]
grpc_target = "127.0.0.1:50051"
        "#;
        assert!(Config::from_str(toml).is_err());
    }

    #[test]
    fn test_rejects_enabled_camera_without_device() {
        let toml = r#"
[vision]
grpc_target = "127.0.0.1:50051"

[vision.camera_left]
enabled = true
        "#;
        assert!(Config::from_str(toml).is_err());
    }

    #[test]
    fn test_rejects_bad_quality() {
        let toml = r#"
[vision]
grpc_target = "127.0.0.1:50051"
jpeg_quality = 150

[vision.camera_left]
enabled = true
device = "/dev/video0"
        "#;
        assert!(Config::from_str(toml).is_err());
    }

    #[test]
    fn test_load_and_save_round_trip_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.vision.camera_left.enabled = true;
        config.vision.camera_left.device = "/dev/video0".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.vision.camera_left.device, "/dev/video0");
        assert!(loaded.vision.camera_left.enabled);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/path/config.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = Config::from_str(&toml_str);
        // default config has no cameras enabled, so parse re-validation fails
        // the same way the original did; exercise serialize/deserialize only.
        assert!(parsed.is_err());
        let _ = toml_str;
    }
}

//! Binding configuration
//!
//! Settings live in a single TOML file:
//!
//! ```toml
//! library = "/opt/trtc/lib/libctrtc.so"
//!
//! [log]
//! console_enabled = false
//! compress_enabled = true
//! level = "info"
//! dir = "/var/log/trtc"
//!
//! [recv]
//! auto_audio = true
//! auto_video = false
//!
//! [encoder]
//! resolution = "1280x720"
//! fps = 20
//! bitrate = 1200
//! ```
//!
//! Every section and key is optional.

use crate::error::{CloudError, Result};
use crate::types::{LogLevel, VideoEncoderParam};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// SDK shared library to load instead of the default search
    pub library: Option<PathBuf>,

    /// SDK-side logging
    pub log: LogConfig,

    /// Remote stream receive mode
    pub recv: RecvConfig,

    /// Encoder settings pushed before entering a room
    pub encoder: Option<VideoEncoderParam>,
}

/// SDK-side logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Print SDK logs to the console
    pub console_enabled: bool,

    /// Compress SDK log files
    pub compress_enabled: bool,

    /// SDK log verbosity
    pub level: LogLevel,

    /// Directory for SDK log files, SDK default if unset
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: false,
            compress_enabled: true,
            level: LogLevel::Info,
            dir: None,
        }
    }
}

/// Whether remote streams are pulled as soon as they appear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecvConfig {
    /// Pull remote audio automatically
    pub auto_audio: bool,

    /// Pull remote video automatically
    pub auto_video: bool,
}

impl Default for RecvConfig {
    fn default() -> Self {
        Self {
            auto_audio: true,
            auto_video: true,
        }
    }
}

impl CloudConfig {
    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Config`] on malformed TOML or unknown values
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CloudError::Config(e.to_string()))
    }

    /// Read configuration from a file
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Config`] if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CloudError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Render as TOML
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Config`] if a value cannot be represented
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CloudError::Config(e.to_string()))
    }
}

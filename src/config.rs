//! Configuration for the camera viewer
//!
//! Loads configuration from a TOML file, either the path given on the
//! command line or `~/.config/x-ipc-viewer/config.toml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{WmError, WmResult};
use crate::layout::{Layout, Rect};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Fill color for areas not covered by video (hex: 0xRRGGBB)
    #[serde(default)]
    pub background: u32,
    /// Ask the running window manager to show the viewer fullscreen
    #[serde(default = "default_true")]
    pub fullscreen: bool,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub windows: Vec<WindowConfig>,
}

/// Layout selection: `layout = "auto"` or `[layout] manual = [...]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayoutConfig {
    Auto(AutoMarker),
    Manual { manual: Vec<Rect> },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoMarker {
    Auto,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig::Auto(AutoMarker::Auto)
    }
}

impl LayoutConfig {
    #[cfg(test)]
    pub fn is_auto(&self) -> bool {
        matches!(self, LayoutConfig::Auto(_))
    }

    pub fn to_layout(&self) -> Layout {
        match self {
            LayoutConfig::Auto(_) => Layout::Grid,
            LayoutConfig::Manual { manual } => Layout::Manual(manual.clone()),
        }
    }
}

/// Settings shared by every player instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Hardware decoding and GPU video output
    #[serde(default)]
    pub gpu: bool,
    /// Player executable
    #[serde(default = "default_binary")]
    pub binary: String,
    /// How long to wait for a player to open its IPC socket
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            gpu: false,
            binary: default_binary(),
            startup_timeout_ms: default_startup_timeout(),
        }
    }
}

/// One camera
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Primary (full resolution) stream
    pub main: String,
    /// Secondary (low resolution) stream, shown while the tile is small
    #[serde(default)]
    pub sub: Option<String>,
    /// Extra flags passed to the player verbatim
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub low_latency: bool,
    /// Where the main stream is drawn inside the tile; whole tile if unset
    #[serde(default)]
    pub main_rect: Option<Rect>,
    /// Where the sub stream is drawn inside the tile; falls back to `main_rect`
    #[serde(default)]
    pub sub_rect: Option<Rect>,
}

fn default_true() -> bool {
    true
}

fn default_binary() -> String {
    "mpv".to_string()
}

fn default_startup_timeout() -> u64 {
    5000
}

impl Config {
    /// Load configuration from `path`, or from the default location
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file {:?}", config_path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file {:?}", config_path))?;

        info!("Configuration loaded from {:?}", config_path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the path to the default config file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("x-ipc-viewer");

        Ok(config_dir.join("config.toml"))
    }

    /// Reject documents that cannot produce a working mosaic
    pub fn validate(&self) -> WmResult<()> {
        if self.windows.is_empty() {
            return Err(WmError::Configuration("no windows configured".into()));
        }

        for (i, window) in self.windows.iter().enumerate() {
            if window.main.trim().is_empty() {
                return Err(WmError::Configuration(format!(
                    "window {} has an empty main stream url",
                    i
                )));
            }
            if matches!(&window.sub, Some(sub) if sub.trim().is_empty()) {
                return Err(WmError::Configuration(format!(
                    "window {} has an empty sub stream url",
                    i
                )));
            }
        }

        self.layout.to_layout().validate(self.windows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        background = 0x101010

        [player]
        gpu = true

        [[windows]]
        main = "rtsp://cam1/main"
        sub = "rtsp://cam1/sub"
        low_latency = true

        [[windows]]
        main = "rtsp://cam2/main"
        flags = ["--no-audio"]
        main_rect = { x = 0, y = 0, width = 320, height = 240 }
    "#;

    #[test]
    fn test_parse_auto_layout() {
        let config = Config::parse(SAMPLE).unwrap();
        assert!(config.layout.is_auto());
        assert!(config.fullscreen);
        assert_eq!(config.background, 0x101010);
        assert!(config.player.gpu);
        assert_eq!(config.player.binary, "mpv");
        assert_eq!(config.windows.len(), 2);
        assert_eq!(config.windows[0].sub.as_deref(), Some("rtsp://cam1/sub"));
        assert_eq!(config.windows[1].flags, vec!["--no-audio".to_string()]);
        assert_eq!(config.windows[1].main_rect, Some(Rect::new(0, 0, 320, 240)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_explicit_auto() {
        let config = Config::parse("layout = \"auto\"\n[[windows]]\nmain = \"a\"").unwrap();
        assert_eq!(config.layout.to_layout(), Layout::Grid);
    }

    #[test]
    fn test_manual_layout_count_mismatch() {
        let doc = r#"
            [layout]
            manual = [
                { x = 0, y = 0, width = 960, height = 1080 },
                { x = 960, y = 0, width = 960, height = 1080 },
            ]

            [[windows]]
            main = "a"
            [[windows]]
            main = "b"
            [[windows]]
            main = "c"
        "#;
        let config = Config::parse(doc).unwrap();
        assert!(!config.layout.is_auto());
        assert!(matches!(config.validate(), Err(WmError::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_empty() {
        let config = Config::parse("").unwrap();
        assert!(matches!(config.validate(), Err(WmError::Configuration(_))));

        let config = Config::parse("[[windows]]\nmain = \" \"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("x-ipc-viewer-does-not-exist.toml");
        assert!(Config::load(Some(&path)).is_err());
    }
}

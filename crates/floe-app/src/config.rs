// SPDX-License-Identifier: CEPL-1.0
use floe_render::RenderConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_CONFIG: &str = "floe.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config `{}`", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "Floe".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub render: RenderConfig,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads `path`; a file that does not exist yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(path, &text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn log_summary(&self, path: &Path) {
        info!(
            "config {}: window {}x{} `{}`, api {:?}, vsync {} ({:?}), validation {}",
            path.display(),
            self.window.width,
            self.window.height,
            self.window.title,
            self.render.api,
            self.render.vsync,
            self.render.vsync_mode,
            self.render.validation
        );
    }
}

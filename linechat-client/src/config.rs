//! Client configuration loading
//!
//! Loads connection settings from `config.toml`, then applies CLI overrides.

use std::path::{Path, PathBuf};

use linechat_utils::{LinechatError, Result};
use serde::Deserialize;

use crate::cli::Args;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8189;
pub const DEFAULT_NICKNAME: &str = "Guest";

/// Client settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server host name or address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Prefix for outgoing chat lines
    pub nickname: String,
    /// Where received images are written; `None` disables saving
    pub save_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            nickname: DEFAULT_NICKNAME.into(),
            save_dir: None,
        }
    }
}

impl ClientConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| LinechatError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content).map_err(|message| LinechatError::ConfigParse {
            path: path.to_path_buf(),
            message,
        })
    }

    fn parse(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Apply command-line overrides
    pub fn merge_args(mut self, args: &Args) -> Self {
        if let Some(host) = &args.host {
            self.host = host.clone();
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(nick) = &args.nick {
            self.nickname = nick.clone();
        }
        if let Some(dir) = &args.save_dir {
            self.save_dir = Some(dir.clone());
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(LinechatError::config("host must not be empty"));
        }
        if self.port == 0 {
            return Err(LinechatError::config("port must be non-zero"));
        }
        if self.nickname.contains('\n') {
            return Err(LinechatError::config("nickname must not contain a newline"));
        }
        Ok(())
    }
}

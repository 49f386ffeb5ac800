//! Command-line argument parsing for the linechat client
//!
//! Uses clap for argument parsing with derive macros. Every connection
//! option is optional here; unset values fall back to the config file.

use clap::Parser;
use std::path::PathBuf;

/// linechat - line-based TCP chat client with image sharing
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Server host
    #[arg(long, env = "LINECHAT_HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', env = "LINECHAT_PORT")]
    pub port: Option<u16>,

    /// Nickname prefixed to outgoing messages
    #[arg(long, short = 'n')]
    pub nick: Option<String>,

    /// Path to the config file (default: $XDG_CONFIG_HOME/linechat/config.toml)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Save received images into this directory
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// Write verbose logs to the log file instead of stderr
    #[arg(long, default_value_t = false)]
    pub log_file: bool,
}

impl Args {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Config file to load
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(linechat_utils::config_file)
    }
}

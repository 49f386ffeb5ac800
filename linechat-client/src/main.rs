//! linechat client
//!
//! Connects to a chat server and bridges stdin/stdout to the connection.

use linechat_client::chat;
use linechat_client::cli::Args;
use linechat_client::config::ClientConfig;
use linechat_utils::{init_logging_with_config, LogConfig, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    let log_config = if args.log_file {
        LogConfig::debug_file()
    } else {
        LogConfig::client()
    };
    init_logging_with_config(log_config)?;
    tracing::info!("linechat client starting");
    tracing::debug!("CLI args: {:?}", args);

    let config = ClientConfig::load(&args.config_path())?.merge_args(&args);
    config.validate()?;

    match chat::run(config).await {
        Ok(()) => {
            tracing::info!("linechat client exiting normally");
            Ok(())
        }
        Err(e) => {
            tracing::error!("linechat client error: {}", e);
            eprintln!("Error: {}", e);
            Err(e)
        }
    }
}

//! Terminal chat front end
//!
//! Reads commands from stdin, sends them over a [`Connection`], and prints
//! connection events as transcript lines on stdout.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use linechat_protocol::Message;
use linechat_utils::{LinechatError, Result};

use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionEvent, SendError};

/// A parsed line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    /// Plain chat text
    Say(String),
    /// `/image <path>`
    Image(PathBuf),
    /// `/quit`
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_input(line: &str) -> Option<InputCommand> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed == "/quit" {
        return Some(InputCommand::Quit);
    }

    if let Some(path) = trimmed.strip_prefix("/image ") {
        let path = path.trim();
        if !path.is_empty() {
            return Some(InputCommand::Image(PathBuf::from(path)));
        }
    }

    Some(InputCommand::Say(line.to_string()))
}

/// Outgoing chat line: `<nick>: <text>`
pub fn format_outgoing(nickname: &str, text: &str) -> String {
    format!("{}: {}", nickname, text)
}

/// Transcript line for an event
pub fn describe_event(event: &ConnectionEvent) -> String {
    match event {
        ConnectionEvent::Ready => "Connection established...".to_string(),
        ConnectionEvent::Received(Message::Text { raw }) => raw.clone(),
        ConnectionEvent::Received(Message::Image { name, payload }) => {
            format!("Received image: {} ({} bytes)", name, payload.len())
        }
        ConnectionEvent::Exception(err) => format!("Connection error: {}", err),
        ConnectionEvent::Disconnected => "Connection closed".to_string(),
    }
}

/// Local file name for a received image; drops any directory components
pub fn image_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "image".to_string())
}

/// Read a file for sending; returns its file name and contents
pub async fn read_image(path: &Path) -> Result<(String, Vec<u8>)> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| LinechatError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| LinechatError::config(format!("{} is not a file", path.display())))?;

    Ok((name, bytes))
}

/// Write a received image into `dir`, creating it if needed
pub async fn save_image(dir: &Path, name: &str, payload: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| LinechatError::FileWrite {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let path = dir.join(image_file_name(name));
    tokio::fs::write(&path, payload)
        .await
        .map_err(|e| LinechatError::FileWrite {
            path: path.clone(),
            source: e,
        })?;

    Ok(path)
}

fn report_send(result: std::result::Result<(), SendError>) {
    if let Err(e) = result {
        println!("Send failed: {}", e);
    }
}

/// Run the interactive client until the connection is closed
pub async fn run(config: ClientConfig) -> Result<()> {
    let (connection, mut events) = Connection::open_with_events(&config.host, config.port).await?;
    info!(id = %connection.id(), "Chat session started as {}", config.nickname);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                println!("{}", describe_event(&event));

                if let ConnectionEvent::Received(Message::Image { name, payload }) = &event {
                    if let Some(dir) = &config.save_dir {
                        match save_image(dir, name, payload).await {
                            Ok(path) => println!("Saved image to {}", path.display()),
                            Err(e) => println!("Failed to save image: {}", e),
                        }
                    }
                }

                if event.is_disconnect() {
                    break;
                }
            }

            line = stdin.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        handle_input(&connection, &config.nickname, &line).await;
                    }
                    Ok(None) => {
                        info!("Input closed, disconnecting");
                        stdin_open = false;
                        connection.close().await;
                    }
                    Err(e) => {
                        warn!("Failed to read input: {}", e);
                        stdin_open = false;
                        connection.close().await;
                    }
                }
            }
        }
    }

    Ok(())
}

async fn handle_input(connection: &Connection, nickname: &str, line: &str) {
    match parse_input(line) {
        None => {}
        Some(InputCommand::Say(text)) => {
            report_send(connection.send_string(&format_outgoing(nickname, &text)).await);
        }
        Some(InputCommand::Image(path)) => match read_image(&path).await {
            Ok((name, bytes)) => report_send(connection.send_image(&name, &bytes).await),
            Err(e) => println!("Failed to read image: {}", e),
        },
        Some(InputCommand::Quit) => connection.close().await,
    }
}

//! ShellTile CLI
//!
//! Command-line interface for controlling the ShellTile daemon.
//!
//! Commands are sent to the daemon via IPC (named pipe).

use anyhow::Result;
use clap::{Parser, Subcommand};
use shelltile_core_layout::LayoutKind;
use shelltile_ipc::{IpcCommand, IpcResponse};
use std::time::Duration;

/// How long to wait for the daemon to answer.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "shelltile-cli")]
#[command(author, version, about = "Control the ShellTile window tiler")]
struct Cli {
    /// Print the raw JSON response
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Switch layout and retile (grid, horizontal, vertical, main-and-deck)
    Layout {
        /// Layout name
        layout: LayoutKind,
    },
    /// Retile with the current layout
    Retile,
    /// Show the current layout settings and window count
    Query,
    /// Reload configuration
    Reload,
    /// Stop the daemon
    Stop,
}

impl Commands {
    fn to_ipc(&self) -> IpcCommand {
        match self {
            Commands::Layout { layout } => IpcCommand::SetLayout { layout: *layout },
            Commands::Retile => IpcCommand::Retile,
            Commands::Query => IpcCommand::QueryState,
            Commands::Reload => IpcCommand::Reload,
            Commands::Stop => IpcCommand::Stop,
        }
    }
}

/// Human-readable rendering of a successful response.
fn format_response(response: &IpcResponse) -> String {
    match response {
        IpcResponse::Ok => "OK".to_string(),
        IpcResponse::Error { message } => format!("Error: {}", message),
        IpcResponse::Retiled {
            layout,
            windows,
            applied,
            skipped,
        } => {
            let mut out = format!("Tiled {} of {} windows ({})", applied, windows, layout);
            if *skipped > 0 {
                out.push_str(&format!(", {} skipped", skipped));
            }
            out
        }
        IpcResponse::State {
            layout,
            padding,
            main_ratio,
            grid_outer_padding,
            tileable_windows,
        } => format!(
            "layout:             {}\n\
             padding:            {}\n\
             main_ratio:         {}\n\
             grid_outer_padding: {}\n\
             tileable_windows:   {}",
            layout, padding, main_ratio, grid_outer_padding, tileable_windows
        ),
    }
}

#[cfg(windows)]
async fn send_command(cmd: &IpcCommand) -> Result<IpcResponse> {
    use anyhow::Context;
    use shelltile_ipc::{decode_line, encode_line, MAX_IPC_MESSAGE_SIZE, PIPE_NAME};
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::windows::named_pipe::ClientOptions;

    const ERROR_PIPE_BUSY: i32 = 231;
    const CONNECT_ATTEMPTS: u32 = 20;

    let mut attempt = 0;
    let pipe = loop {
        match ClientOptions::new().open(PIPE_NAME) {
            Ok(pipe) => break pipe,
            Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) && attempt < CONNECT_ATTEMPTS => {
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to connect to {}. Is the shelltile daemon running?", PIPE_NAME)
                })
            }
        }
    };

    let (reader, mut writer) = tokio::io::split(pipe);
    writer.write_all(encode_line(cmd)?.as_bytes()).await?;
    writer.flush().await?;

    let mut reader = BufReader::new(reader.take(MAX_IPC_MESSAGE_SIZE as u64));
    let mut line = String::new();
    tokio::time::timeout(RESPONSE_TIMEOUT, reader.read_line(&mut line))
        .await
        .context("Timed out waiting for the daemon")??;
    if line.trim().is_empty() {
        anyhow::bail!("Daemon closed the connection without responding");
    }

    Ok(decode_line(&line)?)
}

#[cfg(not(windows))]
async fn send_command(_cmd: &IpcCommand) -> Result<IpcResponse> {
    anyhow::bail!("shelltile only runs on Windows")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let response = send_command(&cli.command.to_ipc()).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else if !response.is_error() {
        println!("{}", format_response(&response));
    }

    if let IpcResponse::Error { message } = response {
        anyhow::bail!("{}", message);
    }
    Ok(())
}

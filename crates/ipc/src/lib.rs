//! ShellTile IPC Protocol
//!
//! Shared types for daemon-CLI communication over Windows named pipes.
//! Each request and each response is one JSON object on one line.

use serde::{Deserialize, Serialize};
use shelltile_core_layout::LayoutKind;
use thiserror::Error;

/// Named pipe path for IPC communication.
pub const PIPE_NAME: &str = r"\\.\pipe\shelltile";

/// Maximum size of a single request line. Longer input is cut off.
pub const MAX_IPC_MESSAGE_SIZE: usize = 64 * 1024;

/// Errors from encoding or decoding protocol lines.
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Invalid message: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Commands that can be sent from the CLI to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcCommand {
    /// Switch to a layout and retile.
    SetLayout {
        /// The layout to switch to.
        layout: LayoutKind,
    },
    /// Retile with the current layout.
    Retile,
    /// Query the current layout settings and tileable window count.
    QueryState,
    /// Reload configuration from file.
    Reload,
    /// Stop the daemon.
    Stop,
}

/// Responses from the daemon to the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IpcResponse {
    /// Command executed successfully.
    Ok,
    /// Command failed with an error.
    Error {
        /// Error message describing what went wrong.
        message: String,
    },
    /// Result of a retile pass.
    Retiled {
        layout: LayoutKind,
        /// Tileable windows found.
        windows: usize,
        /// Windows moved.
        applied: usize,
        /// Windows skipped.
        skipped: usize,
    },
    /// State query response.
    State {
        layout: LayoutKind,
        padding: i32,
        main_ratio: f64,
        grid_outer_padding: bool,
        /// Windows that would be tiled right now.
        tileable_windows: usize,
    },
}

impl IpcResponse {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Whether this response reports a failure.
    pub fn is_error(&self) -> bool {
        matches!(self, IpcResponse::Error { .. })
    }
}

/// Serialize a message as one protocol line, including the trailing newline.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, IpcError> {
    serde_json::to_string(message)
        .map(|json| json + "\n")
        .map_err(IpcError::Encode)
}

/// Parse one protocol line. Surrounding whitespace is ignored.
pub fn decode_line<T: for<'de> Deserialize<'de>>(line: &str) -> Result<T, IpcError> {
    serde_json::from_str(line.trim()).map_err(IpcError::Decode)
}

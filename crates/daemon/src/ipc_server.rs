//! Named pipe IPC server.
//!
//! One JSON command per connection, one JSON response back, both newline
//! terminated.

use crate::event_loop::DaemonEvent;
use anyhow::Result;
use shelltile_ipc::{decode_line, encode_line, IpcCommand, IpcResponse, MAX_IPC_MESSAGE_SIZE};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// IPC read timeout - clients must send within this period.
pub const IPC_READ_TIMEOUT: Duration = Duration::from_secs(5);

const SERIALIZATION_ERROR_LINE: &str =
    "{\"status\":\"error\",\"message\":\"Internal serialization error\"}\n";

fn response_line(response: &IpcResponse) -> String {
    encode_line(response).unwrap_or_else(|e| {
        warn!("Failed to serialize IPC response: {}", e);
        SERIALIZATION_ERROR_LINE.to_string()
    })
}

/// Handle a single client connection.
pub async fn handle_client<T>(stream: T, event_tx: mpsc::Sender<DaemonEvent>) -> Result<()>
where
    T: AsyncRead + AsyncWrite,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader.take(MAX_IPC_MESSAGE_SIZE as u64));
    let mut line = String::new();

    let bytes_read = match tokio::time::timeout(IPC_READ_TIMEOUT, reader.read_line(&mut line)).await
    {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => return Err(e.into()),
        // Client did not send in time.
        Err(_) => return Ok(()),
    };
    if bytes_read == 0 {
        return Ok(());
    }

    debug!("Received command: {}", line.trim());

    let cmd: IpcCommand = match decode_line(&line) {
        Ok(cmd) => cmd,
        Err(e) => {
            let response = IpcResponse::error(format!("Invalid command: {}", e));
            writer.write_all(response_line(&response).as_bytes()).await?;
            return Ok(());
        }
    };

    let is_stop = matches!(cmd, IpcCommand::Stop);
    let (resp_tx, resp_rx) = oneshot::channel();

    if event_tx
        .send(DaemonEvent::IpcCommand {
            cmd,
            responder: resp_tx,
        })
        .await
        .is_err()
    {
        let response = IpcResponse::error("Daemon is shutting down");
        writer.write_all(response_line(&response).as_bytes()).await?;
        return Ok(());
    }

    let response = resp_rx
        .await
        .unwrap_or_else(|_| IpcResponse::error("Failed to get response from daemon"));
    writer.write_all(response_line(&response).as_bytes()).await?;
    writer.flush().await?;

    if is_stop {
        let _ = event_tx.send(DaemonEvent::Shutdown).await;
    }

    Ok(())
}

#[cfg(windows)]
pub use pipe::{check_already_running, run_ipc_server};

#[cfg(windows)]
mod pipe {
    use super::handle_client;
    use crate::event_loop::DaemonEvent;
    use shelltile_ipc::PIPE_NAME;
    use std::time::Duration;
    use tokio::net::windows::named_pipe::{ClientOptions, PipeMode, ServerOptions};
    use tokio::sync::mpsc;
    use tracing::{debug, error, warn};

    /// Run the IPC server, accepting connections and dispatching commands.
    pub async fn run_ipc_server(event_tx: mpsc::Sender<DaemonEvent>) {
        let mut is_first_instance = true;

        loop {
            let server = match ServerOptions::new()
                .first_pipe_instance(is_first_instance)
                .pipe_mode(PipeMode::Byte)
                .create(PIPE_NAME)
            {
                Ok(s) => {
                    is_first_instance = false;
                    s
                }
                Err(e) => {
                    error!("Failed to create named pipe server: {}", e);
                    if is_first_instance {
                        error!("Is another shelltile daemon already running?");
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            debug!("Waiting for client connection on {}", PIPE_NAME);

            if let Err(e) = server.connect().await {
                error!("Failed to accept client connection: {}", e);
                continue;
            }

            debug!("Client connected");

            let event_tx = event_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_client(server, event_tx).await {
                    warn!("Client handler error: {}", e);
                }
            });
        }
    }

    /// Check if another daemon instance is already running by probing the named pipe.
    pub fn check_already_running() -> bool {
        ClientOptions::new().open(PIPE_NAME).is_ok()
    }
}

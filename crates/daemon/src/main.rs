//! ShellTile Daemon
//!
//! Main daemon process for the ShellTile window tiler.
//!
//! Responsibilities:
//! - Receive shell notifications and retile once they settle
//! - Handle IPC commands from the CLI
//! - Dispatch global hotkeys
//! - Reload configuration on request

#![cfg_attr(not(windows), allow(dead_code))]

mod config;
mod debounce;
mod event_loop;
mod ipc_server;
mod state;

use anyhow::Result;
use config::Config;
use tracing_subscriber::FmtSubscriber;

/// Load the config before logging exists, falling back to defaults.
fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {:#}. Using defaults.", e);
        Config::default()
    })
}

fn init_logging(config: &Config) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(windows)]
#[tokio::main]
async fn main() -> Result<()> {
    daemon::run().await
}

#[cfg(not(windows))]
fn main() -> Result<()> {
    anyhow::bail!("shelltile only runs on Windows")
}

#[cfg(windows)]
mod daemon {
    use crate::config;
    use crate::event_loop::{hotkey_bindings, DaemonEvent, EventLoop, LoopAction};
    use crate::ipc_server::{check_already_running, run_ipc_server};
    use crate::state::AppState;
    use anyhow::Result;
    use shelltile_engine::Notification;
    use shelltile_ipc::{IpcCommand, PIPE_NAME};
    use shelltile_platform_win32::{
        install_shell_hook, register_hotkeys, HotkeyHandle, HotkeyId, Win32WindowSystem,
    };
    use std::collections::HashMap;
    use tokio::sync::mpsc;
    use tracing::{error, info, warn};

    /// Registered hotkeys. Dropping it unregisters them.
    struct HotkeyState {
        handle: Option<HotkeyHandle>,
        mapping: HashMap<HotkeyId, IpcCommand>,
    }

    /// Register hotkeys from config.
    ///
    /// Called at startup and after every successful reload.
    fn setup_hotkeys(config: &config::Config, event_tx: mpsc::Sender<DaemonEvent>) -> HotkeyState {
        let bindings = hotkey_bindings(config);
        let mapping = bindings.mapping;

        if bindings.hotkeys.is_empty() {
            info!("No hotkeys configured");
            return HotkeyState {
                handle: None,
                mapping,
            };
        }

        match register_hotkeys(bindings.hotkeys) {
            Ok((handle, hotkey_receiver)) => {
                info!("Registered {} global hotkeys", handle.registered_count());

                // Detached: exits once the handle is dropped and the sender closes.
                if let Err(e) =
                    spawn_forwarding_thread("hotkey-fwd", hotkey_receiver, event_tx, DaemonEvent::Hotkey)
                {
                    warn!("{}", e);
                }

                HotkeyState {
                    handle: Some(handle),
                    mapping,
                }
            }
            Err(e) => {
                warn!("Failed to register hotkeys: {}. Global shortcuts disabled.", e);
                HotkeyState {
                    handle: None,
                    mapping,
                }
            }
        }
    }

    /// Spawn a named thread that forwards a std channel into the event loop.
    fn spawn_forwarding_thread<T: Send + 'static>(
        name: &str,
        receiver: std::sync::mpsc::Receiver<T>,
        sender: mpsc::Sender<DaemonEvent>,
        map_fn: impl Fn(T) -> DaemonEvent + Send + 'static,
    ) -> Result<std::thread::JoinHandle<()>> {
        let thread_name = name.to_string();
        std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                while let Ok(event) = receiver.recv() {
                    if sender.blocking_send(map_fn(event)).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| anyhow::anyhow!("Failed to spawn {} thread: {}", thread_name, e))
    }

    pub async fn run() -> Result<()> {
        let mut config = crate::load_config();
        crate::init_logging(&config)?;

        for w in config.validate() {
            warn!("Config: {} - {}", w.field, w.message);
        }

        info!("ShellTile daemon starting...");
        info!("Version: {}", env!("CARGO_PKG_VERSION"));

        if check_already_running() {
            error!(
                "Another shelltile instance is already running (pipe {} is active)",
                PIPE_NAME
            );
            return Ok(());
        }

        info!(
            "Configuration loaded: layout={}, padding={}, main_ratio={}, settle_delay_ms={}",
            config.layout.default_layout,
            config.layout.padding,
            config.layout.main_ratio,
            config.behavior.settle_delay_ms
        );

        let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(100);
        let mut thread_handles: Vec<std::thread::JoinHandle<()>> = Vec::new();

        let mut state = AppState::new(Win32WindowSystem::new(), config.clone());
        if config.behavior.retile_on_start {
            if let Some(report) = state.retile() {
                info!(
                    "Initial retile: {} windows, {} placed, {} skipped",
                    report.windows, report.applied, report.skipped
                );
            }
        }
        let mut event_loop = EventLoop::new(state, event_tx.clone());

        let shell_hook = match install_shell_hook() {
            Ok((handle, receiver)) => {
                info!("Shell hook installed");
                match spawn_forwarding_thread(
                    "shell-fwd",
                    receiver,
                    event_tx.clone(),
                    |n: Notification| DaemonEvent::Shell(n),
                ) {
                    Ok(thread) => thread_handles.push(thread),
                    Err(e) => warn!("{}", e),
                }
                Some(handle)
            }
            Err(e) => {
                warn!("Failed to install shell hook: {}. Automatic retiling disabled.", e);
                None
            }
        };

        let mut hotkey_state = setup_hotkeys(&config, event_tx.clone());
        event_loop.set_hotkey_mapping(hotkey_state.mapping.clone());

        let ipc_tx = event_tx.clone();
        tokio::spawn(async move {
            run_ipc_server(ipc_tx).await;
        });
        info!("IPC server listening on {}", PIPE_NAME);

        {
            let shutdown_tx = event_tx.clone();
            tokio::spawn(async move {
                if let Ok(()) = tokio::signal::ctrl_c().await {
                    info!("Ctrl+C received, initiating shutdown...");
                    let _ = shutdown_tx.send(DaemonEvent::Shutdown).await;
                }
            });
        }

        info!("Ready. Use shelltile-cli to send commands.");

        while let Some(event) = event_rx.recv().await {
            match event_loop.handle_event(event) {
                LoopAction::Continue => {}
                LoopAction::HotkeysChanged => {
                    // Unregister first so the same combinations can be taken again.
                    drop(hotkey_state);
                    hotkey_state = setup_hotkeys(event_loop.state().config(), event_tx.clone());
                    event_loop.set_hotkey_mapping(hotkey_state.mapping.clone());
                }
                LoopAction::Shutdown => break,
            }
        }

        // Stopping the hook threads closes their channels, which ends the forwarders.
        drop(hotkey_state);
        drop(shell_hook);

        info!("Waiting for forwarding threads to exit...");
        for handle in thread_handles {
            let _ = handle.join();
        }

        info!("ShellTile daemon shutting down.");
        Ok(())
    }
}

//! The daemon's single event loop.
//!
//! Shell notifications, hotkeys, IPC commands and debounce expiries all
//! arrive on one channel and are handled here one at a time, so the
//! controller is never touched concurrently.

use crate::config::{self, Config};
use crate::debounce::RetileDebouncer;
use crate::state::AppState;
use shelltile_engine::{Notification, WindowSystem};
use shelltile_ipc::{IpcCommand, IpcResponse};
use shelltile_platform_win32::{parse_hotkey_string, Hotkey, HotkeyEvent, HotkeyId};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Events that the daemon event loop processes.
#[derive(Debug)]
pub enum DaemonEvent {
    /// An IPC command from a CLI client.
    IpcCommand {
        cmd: IpcCommand,
        responder: oneshot::Sender<IpcResponse>,
    },
    /// A shell hook notification.
    Shell(Notification),
    /// A global hotkey was pressed.
    Hotkey(HotkeyEvent),
    /// The settle delay elapsed without further notifications.
    RetileDue,
    /// Shutdown signal.
    Shutdown,
}

/// What the host should do after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    /// The config was reloaded; hotkeys must be registered again.
    HotkeysChanged,
    Shutdown,
}

/// Hotkeys to register, with the command each one triggers.
#[derive(Debug, Default)]
pub struct HotkeyBindings {
    pub hotkeys: Vec<Hotkey>,
    pub mapping: HashMap<HotkeyId, IpcCommand>,
}

/// Parse the `[hotkeys]` table. Invalid entries are skipped with a warning.
pub fn hotkey_bindings(config: &Config) -> HotkeyBindings {
    let mut entries: Vec<(&String, &String)> = config.hotkeys.bindings.iter().collect();
    entries.sort();

    let mut bindings = HotkeyBindings::default();
    let mut next_id: HotkeyId = 1;

    for (key_str, cmd_str) in entries {
        let (modifiers, vk) = match parse_hotkey_string(key_str) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Invalid hotkey string in config: {} ({})", key_str, e);
                continue;
            }
        };
        let Some(cmd) = config::parse_command(cmd_str) else {
            warn!("Unknown command in hotkey config: {} -> {}", key_str, cmd_str);
            continue;
        };

        debug!("Configured hotkey {}: {} -> {:?}", next_id, key_str, cmd_str);
        bindings.hotkeys.push(Hotkey::new(next_id, modifiers, vk));
        bindings.mapping.insert(next_id, cmd);
        next_id += 1;
    }

    bindings
}

/// Owns the daemon state and reacts to [`DaemonEvent`]s.
pub struct EventLoop<S> {
    state: AppState<S>,
    debouncer: RetileDebouncer,
    hotkey_mapping: HashMap<HotkeyId, IpcCommand>,
    event_tx: mpsc::Sender<DaemonEvent>,
}

impl<S: WindowSystem> EventLoop<S> {
    /// `event_tx` must feed the same channel the host drains into
    /// [`EventLoop::handle_event`]; debounce expiries are delivered through it.
    pub fn new(state: AppState<S>, event_tx: mpsc::Sender<DaemonEvent>) -> Self {
        let debouncer = RetileDebouncer::new(state.config().settle_delay());
        Self {
            state,
            debouncer,
            hotkey_mapping: HashMap::new(),
            event_tx,
        }
    }

    pub fn state(&self) -> &AppState<S> {
        &self.state
    }

    pub fn set_hotkey_mapping(&mut self, mapping: HashMap<HotkeyId, IpcCommand>) {
        self.hotkey_mapping = mapping;
    }

    pub fn is_retile_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Handle one event.
    pub fn handle_event(&mut self, event: DaemonEvent) -> LoopAction {
        match event {
            DaemonEvent::IpcCommand { cmd, responder } => {
                let is_reload = matches!(cmd, IpcCommand::Reload);
                let response = self.execute(cmd);
                let reloaded = is_reload && matches!(response, IpcResponse::Ok);

                if responder.send(response).is_err() {
                    debug!("Client disconnected before receiving IPC response");
                }
                if reloaded {
                    return LoopAction::HotkeysChanged;
                }
            }
            DaemonEvent::Shell(notification) => {
                if self.state.notify(notification) {
                    self.debouncer.schedule(&self.event_tx, DaemonEvent::RetileDue);
                }
            }
            DaemonEvent::Hotkey(hotkey_event) => {
                let Some(cmd) = self.hotkey_mapping.get(&hotkey_event.id).cloned() else {
                    warn!("Unknown hotkey ID: {}", hotkey_event.id);
                    return LoopAction::Continue;
                };
                debug!("Hotkey {} triggered, executing {:?}", hotkey_event.id, cmd);
                let is_reload = matches!(cmd, IpcCommand::Reload);
                let response = self.execute(cmd);
                if let IpcResponse::Error { message } = &response {
                    warn!("Hotkey command failed: {}", message);
                } else if is_reload {
                    return LoopAction::HotkeysChanged;
                }
            }
            DaemonEvent::RetileDue => {
                debug!("Settle delay elapsed, retiling");
                self.state.retile();
            }
            DaemonEvent::Shutdown => {
                info!("Shutdown signal received");
                self.debouncer.cancel();
                return LoopAction::Shutdown;
            }
        }
        LoopAction::Continue
    }

    fn execute(&mut self, cmd: IpcCommand) -> IpcResponse {
        let is_reload = matches!(cmd, IpcCommand::Reload);
        // A direct command supersedes any pending debounced pass.
        if !matches!(cmd, IpcCommand::QueryState | IpcCommand::Stop | IpcCommand::Reload) {
            self.debouncer.cancel();
        }
        let response = self.state.handle_command(cmd);
        if is_reload {
            self.debouncer.set_delay(self.state.config().settle_delay());
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelltile_core_layout::{LayoutKind, Rect};
    use shelltile_engine::fake::FakeWindowSystem;
    use std::time::Duration;

    fn event_loop(n: u64) -> (EventLoop<FakeWindowSystem>, mpsc::Receiver<DaemonEvent>) {
        let system = FakeWindowSystem::new();
        for id in 1..=n {
            system.push_app(id, &format!("window {id}"));
        }
        let (tx, rx) = mpsc::channel(16);
        (EventLoop::new(AppState::new(system, Config::default()), tx), rx)
    }

    fn ipc(cmd: IpcCommand) -> (DaemonEvent, oneshot::Receiver<IpcResponse>) {
        let (responder, rx) = oneshot::channel();
        (DaemonEvent::IpcCommand { cmd, responder }, rx)
    }

    #[test]
    fn test_hotkey_bindings_from_defaults() {
        let bindings = hotkey_bindings(&Config::default());
        assert_eq!(bindings.hotkeys.len(), 10);
        assert_eq!(bindings.mapping.len(), 10);

        // Sorted by hotkey string, so ids are stable.
        assert_eq!(
            bindings.mapping.get(&1),
            Some(&IpcCommand::SetLayout {
                layout: LayoutKind::Grid
            })
        );
        assert_eq!(bindings.mapping.get(&5), Some(&IpcCommand::Retile));
        assert_eq!(
            bindings.mapping.get(&9),
            Some(&IpcCommand::SetLayout {
                layout: LayoutKind::MainAndDeck
            })
        );
        assert_eq!(bindings.mapping.get(&10), Some(&IpcCommand::Retile));
    }

    #[test]
    fn test_hotkey_bindings_skip_invalid_entries() {
        let mut config = Config::default();
        config.hotkeys.bindings.clear();
        config
            .hotkeys
            .bindings
            .insert("Alt+Shift+Q".to_string(), "no_such_command".to_string());
        config
            .hotkeys
            .bindings
            .insert("Hyper+Q".to_string(), "retile".to_string());
        config
            .hotkeys
            .bindings
            .insert("Ctrl+Alt+R".to_string(), "reload".to_string());

        let bindings = hotkey_bindings(&config);
        assert_eq!(bindings.hotkeys.len(), 1);
        assert_eq!(bindings.mapping.get(&1), Some(&IpcCommand::Reload));
    }

    #[tokio::test]
    async fn test_ipc_command_gets_response() {
        let (mut event_loop, _rx) = event_loop(3);
        let (event, response) = ipc(IpcCommand::SetLayout {
            layout: LayoutKind::Horizontal,
        });

        assert_eq!(event_loop.handle_event(event), LoopAction::Continue);
        assert!(matches!(
            response.await,
            Ok(IpcResponse::Retiled { windows: 3, applied: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_notification_burst_retiles_once() {
        let (mut event_loop, mut rx) = event_loop(2);

        for id in [1, 2, 1, 2] {
            event_loop.handle_event(DaemonEvent::Shell(Notification::Redraw(id)));
        }
        assert!(event_loop.is_retile_pending());
        assert!(event_loop.state().controller().system().ops().is_empty());

        let due = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .ok()
            .flatten();
        assert!(matches!(due, Some(DaemonEvent::RetileDue)));
        event_loop.handle_event(DaemonEvent::RetileDue);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(rx.try_recv().is_err());
        let system = event_loop.state().controller().system();
        assert_eq!(system.rect_of(1), Some(Rect::new(0, 0, 1912, 512)));
    }

    #[tokio::test]
    async fn test_activation_from_own_pass_does_not_rearm() {
        let (mut event_loop, _rx) = event_loop(3);
        event_loop.handle_event(DaemonEvent::RetileDue);
        let raised = event_loop.state().controller().system().enumerate_windows().unwrap()[0];

        event_loop.handle_event(DaemonEvent::Shell(Notification::WindowActivated(raised)));
        assert!(!event_loop.is_retile_pending());

        event_loop.handle_event(DaemonEvent::Shell(Notification::WindowCreated(9)));
        assert!(event_loop.is_retile_pending());
    }

    #[tokio::test]
    async fn test_other_notifications_do_not_schedule() {
        let (mut event_loop, _rx) = event_loop(1);
        event_loop.handle_event(DaemonEvent::Shell(Notification::Other(3)));
        assert!(!event_loop.is_retile_pending());
    }

    #[tokio::test]
    async fn test_hotkey_runs_mapped_command() {
        let (mut event_loop, _rx) = event_loop(2);
        event_loop.set_hotkey_mapping(hotkey_bindings(&Config::default()).mapping);

        // Alt+Shift+3 is the third sorted binding: layout_vertical.
        let action = event_loop.handle_event(DaemonEvent::Hotkey(HotkeyEvent { id: 3 }));
        assert_eq!(action, LoopAction::Continue);
        assert_eq!(
            event_loop.state().controller().layout(),
            LayoutKind::Vertical
        );

        let action = event_loop.handle_event(DaemonEvent::Hotkey(HotkeyEvent { id: 99 }));
        assert_eq!(action, LoopAction::Continue);
    }

    #[tokio::test]
    async fn test_direct_command_cancels_pending_retile() {
        let (mut event_loop, _rx) = event_loop(1);
        event_loop.handle_event(DaemonEvent::Shell(Notification::WindowCreated(1)));
        assert!(event_loop.is_retile_pending());

        let (event, _response) = ipc(IpcCommand::Retile);
        event_loop.handle_event(event);
        assert!(!event_loop.is_retile_pending());
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_hotkeys() {
        let (mut event_loop, _rx) = event_loop(1);
        let path = std::env::temp_dir().join("shelltile-no-such-dir").join("config.toml");
        event_loop.state = AppState::new(FakeWindowSystem::new(), Config::default())
            .with_config_path(path);

        let (event, response) = ipc(IpcCommand::Reload);
        assert_eq!(event_loop.handle_event(event), LoopAction::Continue);
        assert!(response.await.map(|r| r.is_error()).unwrap_or(false));
    }

    #[tokio::test]
    async fn test_successful_reload_requests_hotkey_refresh() {
        let (mut event_loop, _rx) = event_loop(1);
        let path = std::env::temp_dir().join(format!(
            "shelltile-loop-reload-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[behavior]\nsettle_delay_ms = 300\n").unwrap();
        event_loop.state = AppState::new(FakeWindowSystem::new(), Config::default())
            .with_config_path(&path);

        let (event, response) = ipc(IpcCommand::Reload);
        assert_eq!(event_loop.handle_event(event), LoopAction::HotkeysChanged);
        assert_eq!(response.await.ok(), Some(IpcResponse::Ok));
        assert_eq!(event_loop.debouncer.delay(), Duration::from_millis(300));

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_shutdown() {
        let (mut event_loop, _rx) = event_loop(0);
        assert_eq!(event_loop.handle_event(DaemonEvent::Shutdown), LoopAction::Shutdown);
    }
}

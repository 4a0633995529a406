//! Daemon state and command dispatch.

use crate::config::Config;
use anyhow::Result;
use shelltile_core_layout::WindowId;
use shelltile_engine::{Command, Controller, Notification, RetileReport, WindowSystem};
use shelltile_ipc::{IpcCommand, IpcResponse};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Shortest time activations of just-raised windows are ignored.
const MIN_ECHO_WINDOW: Duration = Duration::from_millis(250);

/// Windows raised by the last pass. The shell reports their activation
/// back to us; those notifications must not schedule another pass.
struct PassEcho {
    windows: HashSet<WindowId>,
    until: Instant,
}

impl PassEcho {
    fn covers(&self, notification: Notification, now: Instant) -> bool {
        let echoed = match notification {
            Notification::WindowActivated(id) | Notification::Redraw(id) => {
                self.windows.contains(&id)
            }
            _ => false,
        };
        echoed && now < self.until
    }
}

/// Everything the event loop owns.
pub struct AppState<S> {
    controller: Controller<S>,
    config: Config,
    /// Explicit config file; `None` searches the standard locations.
    config_path: Option<PathBuf>,
    echo: Option<PassEcho>,
}

impl<S: WindowSystem> AppState<S> {
    /// Create state from an already validated config.
    pub fn new(system: S, config: Config) -> Self {
        let controller = Controller::new(system, config.tiling_config(), config.window_filter());
        Self {
            controller,
            config,
            config_path: None,
            echo: None,
        }
    }

    /// Reload from this file instead of the standard locations.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn controller(&self) -> &Controller<S> {
        &self.controller
    }

    /// Whether a shell notification should (re)start the settle timer.
    ///
    /// Activations and redraws of windows the last pass raised are ignored
    /// for a short while after the pass.
    pub fn notify(&mut self, notification: Notification) -> bool {
        if let Some(echo) = &self.echo {
            if echo.covers(notification, Instant::now()) {
                debug!("Ignoring {:?} caused by the last retile", notification);
                return false;
            }
        }
        self.controller.notify(notification)
    }

    /// Run a retile pass, logging failures. Returns the report on success.
    pub fn retile(&mut self) -> Option<RetileReport> {
        match self.controller.retile() {
            Ok(report) => {
                self.remember_pass(&report);
                Some(report)
            }
            Err(e) => {
                error!("Retile failed: {}", e);
                None
            }
        }
    }

    fn remember_pass(&mut self, report: &RetileReport) {
        let window = self.config.settle_delay().max(MIN_ECHO_WINDOW);
        self.echo = Some(PassEcho {
            windows: report.raised.iter().copied().collect(),
            until: Instant::now() + window,
        });
    }

    /// Execute an IPC or hotkey command and build the response.
    pub fn handle_command(&mut self, cmd: IpcCommand) -> IpcResponse {
        debug!("Handling command {:?}", cmd);
        match cmd {
            IpcCommand::SetLayout { layout } => self.run(Command::SelectLayout(layout)),
            IpcCommand::Retile => self.run(Command::ForceRetile),
            IpcCommand::QueryState => self.query_state(),
            IpcCommand::Reload => match self.reload() {
                Ok(()) => IpcResponse::Ok,
                Err(e) => {
                    warn!("Config reload failed: {:#}", e);
                    IpcResponse::error(format!("Failed to reload config: {:#}", e))
                }
            },
            // The event loop shuts down after the response is sent.
            IpcCommand::Stop => IpcResponse::Ok,
        }
    }

    fn run(&mut self, command: Command) -> IpcResponse {
        match self.controller.handle_command(command) {
            Ok(report) => {
                self.remember_pass(&report);
                IpcResponse::Retiled {
                    layout: report.layout,
                    windows: report.windows,
                    applied: report.applied,
                    skipped: report.skipped,
                }
            }
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    fn query_state(&self) -> IpcResponse {
        let tiling = self.controller.config();
        match self.controller.window_set() {
            Ok(set) => IpcResponse::State {
                layout: tiling.layout,
                padding: tiling.padding,
                main_ratio: tiling.main_ratio,
                grid_outer_padding: tiling.grid_outer_padding,
                tileable_windows: set.len(),
            },
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    /// Re-read the config file and apply it.
    pub fn reload(&mut self) -> Result<()> {
        let config = match &self.config_path {
            Some(path) => Config::load_from_path(path)?,
            None => Config::load()?,
        };
        self.apply_config(config);
        info!("Configuration reloaded");
        Ok(())
    }

    /// Validate and apply a new config. The current layout selection is kept.
    pub fn apply_config(&mut self, mut config: Config) {
        for w in config.validate() {
            warn!("Config: {} - {}", w.field, w.message);
        }

        let mut tiling = config.tiling_config();
        tiling.layout = self.controller.layout();
        self.controller.set_config(tiling);
        self.controller.set_filter(config.window_filter());
        self.config = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelltile_core_layout::{LayoutKind, Rect};
    use shelltile_engine::fake::FakeWindowSystem;

    fn state_with(n: u64) -> AppState<FakeWindowSystem> {
        let system = FakeWindowSystem::new();
        for id in 1..=n {
            system.push_app(id, &format!("window {id}"));
        }
        AppState::new(system, Config::default())
    }

    fn temp_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "shelltile-{}-{}.toml",
            name,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_set_layout_retiles() {
        let mut state = state_with(3);
        let response = state.handle_command(IpcCommand::SetLayout {
            layout: LayoutKind::Horizontal,
        });

        assert_eq!(
            response,
            IpcResponse::Retiled {
                layout: LayoutKind::Horizontal,
                windows: 3,
                applied: 3,
                skipped: 0,
            }
        );
        let system = state.controller().system();
        assert_eq!(system.rect_of(2), Some(Rect::new(644, 4, 632, 1032)));
    }

    #[test]
    fn test_retile_reports_skips() {
        let mut state = state_with(2);
        state.controller().system().fail_moves_for(1);

        match state.handle_command(IpcCommand::Retile) {
            IpcResponse::Retiled {
                layout,
                windows,
                applied,
                skipped,
            } => {
                assert_eq!(layout, LayoutKind::Grid);
                assert_eq!((windows, applied, skipped), (2, 1, 1));
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_enumeration_failure_is_error_response() {
        let mut state = state_with(2);
        state.controller().system().set_enumeration_fails(true);

        assert!(state.handle_command(IpcCommand::Retile).is_error());
        assert!(state.handle_command(IpcCommand::QueryState).is_error());
        assert!(state.retile().is_none());

        state.controller().system().set_enumeration_fails(false);
        assert_eq!(state.retile().map(|r| r.applied), Some(2));
    }

    #[test]
    fn test_query_state() {
        let mut state = state_with(4);
        state.handle_command(IpcCommand::SetLayout {
            layout: LayoutKind::MainAndDeck,
        });
        state.controller().system().clear_ops();

        let response = state.handle_command(IpcCommand::QueryState);
        assert_eq!(
            response,
            IpcResponse::State {
                layout: LayoutKind::MainAndDeck,
                padding: 4,
                main_ratio: 0.6,
                grid_outer_padding: false,
                tileable_windows: 4,
            }
        );
        // Queries never move windows.
        assert!(state.controller().system().ops().is_empty());
    }

    #[test]
    fn test_notify_filters_other_codes() {
        let mut state = state_with(1);
        assert!(state.notify(Notification::WindowCreated(9)));
        assert!(!state.notify(Notification::Other(13)));
    }

    #[test]
    fn test_activation_of_raised_window_is_ignored() {
        let mut state = state_with(3);
        let report = state.retile().unwrap();
        assert_eq!(report.raised, vec![1, 2, 3]);

        assert!(!state.notify(Notification::WindowActivated(1)));
        assert!(!state.notify(Notification::Redraw(3)));
        // New and unrelated windows still count.
        assert!(state.notify(Notification::WindowCreated(4)));
        assert!(state.notify(Notification::WindowActivated(4)));
        assert!(state.notify(Notification::WindowDestroyed(2)));
    }

    #[test]
    fn test_command_pass_also_ignores_its_activations() {
        let mut state = state_with(2);
        state.handle_command(IpcCommand::SetLayout {
            layout: LayoutKind::Vertical,
        });
        assert!(!state.notify(Notification::WindowActivated(2)));
    }

    #[test]
    fn test_activation_counts_again_after_echo_window() {
        let mut state = state_with(1);
        let mut config = Config::default();
        config.behavior.settle_delay_ms = 0;
        state.apply_config(config);

        state.retile();
        assert!(!state.notify(Notification::WindowActivated(1)));

        std::thread::sleep(MIN_ECHO_WINDOW + Duration::from_millis(50));
        assert!(state.notify(Notification::WindowActivated(1)));
    }

    #[test]
    fn test_apply_config_keeps_layout_selection() {
        let mut state = state_with(2);
        state.handle_command(IpcCommand::SetLayout {
            layout: LayoutKind::Vertical,
        });

        let mut config = Config::default();
        config.layout.default_layout = LayoutKind::Grid;
        config.layout.padding = 0;
        config.filter.ignored_classes = vec!["Progman".to_string()];
        state.apply_config(config);

        let tiling = state.controller().config();
        assert_eq!(tiling.layout, LayoutKind::Vertical);
        assert_eq!(tiling.padding, 0);
        assert_eq!(
            state.controller().filter().ignored_classes(),
            &["Progman".to_string()]
        );
    }

    #[test]
    fn test_apply_config_validates() {
        let mut state = state_with(0);
        let mut config = Config::default();
        config.layout.main_ratio = 1.5;
        config.layout.padding = -1;
        state.apply_config(config);

        assert_eq!(state.config().layout.main_ratio, 0.6);
        assert_eq!(state.controller().config().padding, 0);
    }

    #[test]
    fn test_reload_from_file() {
        let path = temp_config(
            "reload",
            r#"
                [layout]
                padding = 12
                grid_outer_padding = true

                [behavior]
                settle_delay_ms = 250
            "#,
        );
        let mut state = state_with(1).with_config_path(&path);

        assert_eq!(state.handle_command(IpcCommand::Reload), IpcResponse::Ok);
        assert_eq!(state.controller().config().padding, 12);
        assert!(state.controller().config().grid_outer_padding);
        assert_eq!(state.config().behavior.settle_delay_ms, 250);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_reload_bad_file_keeps_config() {
        let path = temp_config("bad-reload", "[layout\npadding = ");
        let mut state = state_with(1).with_config_path(&path);

        let response = state.handle_command(IpcCommand::Reload);
        assert!(response.is_error());
        assert_eq!(state.controller().config().padding, 4);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_stop_acknowledged() {
        let mut state = state_with(1);
        assert_eq!(state.handle_command(IpcCommand::Stop), IpcResponse::Ok);
        assert!(state.controller().system().ops().is_empty());
    }
}

//! Configuration management for the ShellTile daemon.
//!
//! Configuration is loaded from TOML files in the following locations (in order):
//! 1. `%APPDATA%/shelltile/config.toml` (Windows standard)
//! 2. `~/.config/shelltile/config.toml` (Unix-style, for WSL compatibility)
//! 3. `./config.toml` (current directory, for development)

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use shelltile_core_layout::{
    LayoutKind, TilingConfig, DEFAULT_BORDER_SIZE, DEFAULT_MAIN_RATIO, DEFAULT_PADDING,
};
use shelltile_engine::{WindowFilter, DEFAULT_IGNORED_CLASSES};
use shelltile_ipc::IpcCommand;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Smallest accepted main-window ratio (exclusive).
const MIN_MAIN_RATIO: f64 = 0.05;
/// Largest accepted main-window ratio (exclusive).
const MAX_MAIN_RATIO: f64 = 0.95;
/// Longest accepted settle delay.
const MAX_SETTLE_DELAY_MS: u64 = 5000;

/// Main configuration structure for ShellTile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Layout configuration.
    pub layout: LayoutConfig,
    /// Behavior configuration.
    pub behavior: BehaviorConfig,
    /// Which windows are never tiled.
    pub filter: FilterConfig,
    /// Hotkey bindings.
    pub hotkeys: HotkeyConfig,
}

/// Layout-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Layout used at startup.
    #[serde(default)]
    pub default_layout: LayoutKind,

    /// Gap between windows and around the work area in pixels.
    #[serde(default = "default_padding")]
    pub padding: i32,

    /// Share of the work-area width given to the main window.
    #[serde(default = "default_main_ratio")]
    pub main_ratio: f64,

    /// Pad the grid away from the work-area edge like the other layouts.
    #[serde(default)]
    pub grid_outer_padding: bool,

    /// Keep tiled windows clear of the taskbar. Reserved.
    #[serde(default = "default_true")]
    pub skip_taskbar: bool,

    /// Border size in pixels. Reserved.
    #[serde(default = "default_border_size")]
    pub border_size: i32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            default_layout: LayoutKind::default(),
            padding: default_padding(),
            main_ratio: default_main_ratio(),
            grid_outer_padding: false,
            skip_taskbar: true,
            border_size: default_border_size(),
        }
    }
}

/// Behavior-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Quiet period after the last window notification before retiling.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to tile existing windows as soon as the daemon starts.
    #[serde(default = "default_true")]
    pub retile_on_start: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            log_level: default_log_level(),
            retile_on_start: true,
        }
    }
}

/// Window classes that are never tiled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Exact window class names. Replaces the built-in list when set.
    #[serde(default = "default_ignored_classes")]
    pub ignored_classes: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            ignored_classes: default_ignored_classes(),
        }
    }
}

// Default value functions for serde
fn default_padding() -> i32 {
    DEFAULT_PADDING
}

fn default_main_ratio() -> f64 {
    DEFAULT_MAIN_RATIO
}

fn default_border_size() -> i32 {
    DEFAULT_BORDER_SIZE
}

fn default_true() -> bool {
    true
}

fn default_settle_delay() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ignored_classes() -> Vec<String> {
    DEFAULT_IGNORED_CLASSES.iter().map(|c| c.to_string()).collect()
}

/// Hotkey bindings configuration.
///
/// Each key is a hotkey string (e.g., "Alt+Shift+1") and each value is a
/// command. Supported commands:
/// - layout_grid, layout_horizontal, layout_vertical, layout_main_and_deck
/// - retile, reload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    /// Map of hotkey string to command name.
    #[serde(flatten)]
    pub bindings: HashMap<String, String>,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        let mut bindings = HashMap::new();

        // Layout selection in index order
        bindings.insert("Alt+Shift+1".to_string(), "layout_grid".to_string());
        bindings.insert("Alt+Shift+2".to_string(), "layout_horizontal".to_string());
        bindings.insert("Alt+Shift+3".to_string(), "layout_vertical".to_string());
        bindings.insert("Alt+Shift+4".to_string(), "layout_main_and_deck".to_string());

        bindings.insert("Alt+Shift+T".to_string(), "retile".to_string());

        // Classic bindings. The shell owns some Win combinations; those fail
        // to register and are skipped.
        bindings.insert("Win+1".to_string(), "layout_grid".to_string());
        bindings.insert("Win+2".to_string(), "layout_horizontal".to_string());
        bindings.insert("Win+3".to_string(), "layout_vertical".to_string());
        bindings.insert("Win+4".to_string(), "layout_main_and_deck".to_string());
        bindings.insert("Win+T".to_string(), "retile".to_string());

        Self { bindings }
    }
}

/// Parse a hotkey command name into an IpcCommand.
///
/// Returns None if the command is not recognized.
pub fn parse_command(cmd: &str) -> Option<IpcCommand> {
    let set_layout = |layout| Some(IpcCommand::SetLayout { layout });

    match cmd.trim().to_lowercase().as_str() {
        "layout_grid" => set_layout(LayoutKind::Grid),
        "layout_horizontal" => set_layout(LayoutKind::Horizontal),
        "layout_vertical" => set_layout(LayoutKind::Vertical),
        "layout_main_and_deck" => set_layout(LayoutKind::MainAndDeck),
        "retile" => Some(IpcCommand::Retile),
        "reload" => Some(IpcCommand::Reload),
        _ => None,
    }
}

/// A value that was out of range and got replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
}

impl Config {
    /// Load configuration from standard locations.
    ///
    /// Tries the following locations in order:
    /// 1. `%APPDATA%/shelltile/config.toml`
    /// 2. `~/.config/shelltile/config.toml`
    /// 3. `./config.toml`
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self> {
        let paths = config_paths();

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Clamp out-of-range values, returning one warning per fix.
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.layout.padding < 0 {
            warnings.push(ConfigWarning {
                field: "layout.padding",
                message: format!("{} is negative, using 0", self.layout.padding),
            });
            self.layout.padding = 0;
        }

        let ratio = self.layout.main_ratio;
        if !(ratio > MIN_MAIN_RATIO && ratio < MAX_MAIN_RATIO) {
            warnings.push(ConfigWarning {
                field: "layout.main_ratio",
                message: format!(
                    "{} is outside ({}, {}), using {}",
                    ratio, MIN_MAIN_RATIO, MAX_MAIN_RATIO, DEFAULT_MAIN_RATIO
                ),
            });
            self.layout.main_ratio = DEFAULT_MAIN_RATIO;
        }

        if self.behavior.settle_delay_ms > MAX_SETTLE_DELAY_MS {
            warnings.push(ConfigWarning {
                field: "behavior.settle_delay_ms",
                message: format!(
                    "{} exceeds {}, using {}",
                    self.behavior.settle_delay_ms, MAX_SETTLE_DELAY_MS, MAX_SETTLE_DELAY_MS
                ),
            });
            self.behavior.settle_delay_ms = MAX_SETTLE_DELAY_MS;
        }

        warnings
    }

    /// The layout engine's view of this configuration.
    pub fn tiling_config(&self) -> TilingConfig {
        TilingConfig {
            layout: self.layout.default_layout,
            padding: self.layout.padding,
            main_ratio: self.layout.main_ratio,
            skip_taskbar: self.layout.skip_taskbar,
            border_size: self.layout.border_size,
            grid_outer_padding: self.layout.grid_outer_padding,
        }
    }

    /// The window filter built from `[filter]`.
    pub fn window_filter(&self) -> WindowFilter {
        WindowFilter::with_ignored_classes(self.filter.ignored_classes.iter().cloned())
    }

    /// Debounce delay for window notifications.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.behavior.settle_delay_ms)
    }

    /// The configured `tracing` level, `INFO` if unrecognized.
    pub fn log_level(&self) -> tracing::Level {
        match self.behavior.log_level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        }
    }
}

/// Get all possible config file paths in priority order.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. Windows standard: %APPDATA%/shelltile/config.toml
    if let Some(proj_dirs) = ProjectDirs::from("com", "shelltile", "shelltile") {
        paths.push(proj_dirs.config_dir().join("config.toml"));
    }

    // 2. Unix-style: ~/.config/shelltile/config.toml
    if let Some(home) = dirs_home() {
        paths.push(home.join(".config").join("shelltile").join("config.toml"));
    }

    // 3. Current directory: ./config.toml
    paths.push(PathBuf::from("config.toml"));

    paths
}

/// Get the user's home directory.
fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

//! The reconciliation controller.
//!
//! Owns the tiling configuration and reacts to shell notifications and
//! commands by running a retile pass: rebuild the window set, compute the
//! layout against the current work area, apply the placements.
//!
//! The controller never sleeps. Whether a notification warrants a pass is
//! decided by [`Controller::notify`]; the host debounces bursts and calls
//! [`Controller::retile`] once things settle.

use crate::apply::apply_placements;
use crate::filter::WindowFilter;
use crate::window::{WindowSystem, WindowSystemError};
use crate::window_set::{build_window_set, WindowSet};
use shelltile_core_layout::{compute_layout, LayoutKind, TilingConfig, WindowId, WindowPlacement};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that abort a retile pass. The controller stays usable afterwards.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("Failed to enumerate windows: {0}")]
    Enumeration(#[source] WindowSystemError),

    #[error("Failed to query work area: {0}")]
    WorkArea(#[source] WindowSystemError),
}

/// A shell notification delivered by the event observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    WindowCreated(WindowId),
    WindowDestroyed(WindowId),
    WindowActivated(WindowId),
    Redraw(WindowId),
    /// Any other shell event, identified by its raw code.
    Other(u32),
}

impl Notification {
    /// Whether this kind of notification should trigger a retile.
    pub fn triggers_retile(&self) -> bool {
        !matches!(self, Notification::Other(_))
    }

    /// The window the notification refers to, if any.
    pub fn window(&self) -> Option<WindowId> {
        match *self {
            Notification::WindowCreated(id)
            | Notification::WindowDestroyed(id)
            | Notification::WindowActivated(id)
            | Notification::Redraw(id) => Some(id),
            Notification::Other(_) => None,
        }
    }
}

/// A keyboard or IPC command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Switch layout, then retile.
    SelectLayout(LayoutKind),
    /// Retile with the current layout.
    ForceRetile,
}

impl Command {
    /// `SelectLayout` from a selection index. Unknown indices select the grid.
    pub fn select_layout_index(index: usize) -> Self {
        let layout = LayoutKind::from_index(index).unwrap_or_else(|| {
            warn!("Unknown layout index {}, falling back to grid", index);
            LayoutKind::Grid
        });
        Command::SelectLayout(layout)
    }
}

/// Summary of one retile pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetileReport {
    /// Layout used for the pass.
    pub layout: LayoutKind,
    /// Number of tileable windows found.
    pub windows: usize,
    /// Placements applied.
    pub applied: usize,
    /// Placements skipped (stale handles, failed moves, degenerate geometry).
    pub skipped: usize,
    /// Windows the pass brought to the top, front-most first.
    pub raised: Vec<WindowId>,
}

impl RetileReport {
    fn empty(layout: LayoutKind) -> Self {
        Self {
            layout,
            windows: 0,
            applied: 0,
            skipped: 0,
            raised: Vec::new(),
        }
    }
}

/// Single-writer owner of the tiling state.
pub struct Controller<S> {
    system: S,
    config: TilingConfig,
    filter: WindowFilter,
}

impl<S: WindowSystem> Controller<S> {
    pub fn new(system: S, config: TilingConfig, filter: WindowFilter) -> Self {
        Self {
            system,
            config,
            filter,
        }
    }

    pub fn config(&self) -> &TilingConfig {
        &self.config
    }

    /// Replace the configuration (e.g. after a config reload).
    pub fn set_config(&mut self, config: TilingConfig) {
        self.config = config;
    }

    pub fn layout(&self) -> LayoutKind {
        self.config.layout
    }

    pub fn filter(&self) -> &WindowFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: WindowFilter) {
        self.filter = filter;
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    /// Record a notification. Returns `true` if a retile should follow.
    pub fn notify(&self, notification: Notification) -> bool {
        let retile = notification.triggers_retile();
        match notification.window() {
            Some(id) if retile => {
                debug!("{:?} for window {:#x} schedules a retile", notification, id)
            }
            _ => debug!("Ignoring {:?}", notification),
        }
        retile
    }

    /// Execute a command.
    pub fn handle_command(&mut self, command: Command) -> Result<RetileReport, ControllerError> {
        match command {
            Command::SelectLayout(layout) => {
                if layout != self.config.layout {
                    info!("Layout changed: {} -> {}", self.config.layout, layout);
                }
                self.config.layout = layout;
            }
            Command::ForceRetile => info!("Forced retile requested"),
        }
        self.retile()
    }

    /// The current tileable windows, without touching them.
    pub fn window_set(&self) -> Result<WindowSet, ControllerError> {
        build_window_set(&self.system, &self.filter).map_err(ControllerError::Enumeration)
    }

    /// Run one full pass: rebuild, compute, apply.
    pub fn retile(&self) -> Result<RetileReport, ControllerError> {
        let layout = self.config.layout;
        let window_set = self.window_set()?;
        if window_set.is_empty() {
            debug!("No windows to tile");
            return Ok(RetileReport::empty(layout));
        }

        let work_area = self.system.work_area().map_err(ControllerError::WorkArea)?;
        let layout_windows = window_set.layout_windows();
        let placements = compute_layout(layout, work_area, &self.config, &layout_windows);

        // Apply front-most first so raising keeps the stacking this pass read.
        let mut ordered: Vec<(u32, WindowPlacement)> = layout_windows
            .iter()
            .map(|w| w.z_rank)
            .zip(placements)
            .collect();
        ordered.sort_by_key(|(z_rank, _)| *z_rank);
        let placements: Vec<WindowPlacement> = ordered.into_iter().map(|(_, p)| p).collect();
        debug!(
            "Applying {} layout to {} windows in {}x{} work area",
            layout,
            window_set.len(),
            work_area.width(),
            work_area.height()
        );

        let applied = apply_placements(&self.system, &placements);
        for (id, e) in &applied.skipped {
            warn!(
                "Skipping window {:#x} '{}': {}",
                id,
                window_set.title_of(*id).unwrap_or_default(),
                e
            );
        }

        let report = RetileReport {
            layout,
            windows: window_set.len(),
            applied: applied.applied,
            skipped: applied.skipped_count(),
            raised: applied.raised,
        };
        info!(
            "Retiled {} windows with {} layout ({} skipped)",
            report.applied, layout, report.skipped
        );
        Ok(report)
    }
}

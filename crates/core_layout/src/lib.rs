//! ShellTile Core Layout Engine
//!
//! Platform-agnostic tiling geometry.
//!
//! Given a work area, a [`TilingConfig`] and an ordered list of windows, this
//! crate computes one [`WindowPlacement`] per window for each of the four
//! layouts:
//! - Grid: near-square grid, windows ordered by z-order rank
//! - Horizontal: one row, windows side by side
//! - Vertical: one column, windows stacked
//! - Main and deck: one large main window, the rest stacked beside it
//!
//! Nothing here touches the OS. Computed sizes are not clamped: a padding too
//! large for the window count yields non-positive sizes, which are returned
//! as-is for the caller to deal with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unique identifier for a window.
/// On Windows, this is the HWND cast to u64.
pub type WindowId = u64;

/// Default padding between windows and around the work area, in pixels.
pub const DEFAULT_PADDING: i32 = 4;

/// Default fraction of the work-area width given to the main window.
pub const DEFAULT_MAIN_RATIO: f64 = 0.6;

/// Default border size reserved for window styling.
pub const DEFAULT_BORDER_SIZE: i32 = 2;

/// Errors that can occur while parsing layout names.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutParseError {
    #[error("Unknown layout '{0}' (expected grid, horizontal, vertical or main_and_deck)")]
    UnknownLayout(String),
}

/// A rectangle in screen coordinates (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Get the right edge x-coordinate.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Get the bottom edge y-coordinate.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Whether both dimensions are strictly positive.
    pub fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// The usable screen region (excluding the taskbar), as edge coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkArea {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl WorkArea {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// The full work area shrunk by `padding` on every side.
    pub fn padded(&self, padding: i32) -> Rect {
        Rect::new(
            self.left + padding,
            self.top + padding,
            self.width() - padding * 2,
            self.height() - padding * 2,
        )
    }
}

impl From<WorkArea> for Rect {
    fn from(area: WorkArea) -> Self {
        Rect::new(area.left, area.top, area.width(), area.height())
    }
}

/// The available layout algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    /// Near-square grid ordered by z-order rank.
    #[default]
    Grid,
    /// Single row, left to right.
    Horizontal,
    /// Single column, top to bottom.
    Vertical,
    /// One main window plus a stacked deck.
    MainAndDeck,
}

impl LayoutKind {
    /// All layouts in selection-index order.
    pub const ALL: [LayoutKind; 4] = [
        LayoutKind::Grid,
        LayoutKind::Horizontal,
        LayoutKind::Vertical,
        LayoutKind::MainAndDeck,
    ];

    /// Map a selection index (0..=3) to a layout.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The selection index of this layout.
    pub fn index(self) -> usize {
        match self {
            LayoutKind::Grid => 0,
            LayoutKind::Horizontal => 1,
            LayoutKind::Vertical => 2,
            LayoutKind::MainAndDeck => 3,
        }
    }

    /// Stable lowercase name, as used in config files and IPC.
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutKind::Grid => "grid",
            LayoutKind::Horizontal => "horizontal",
            LayoutKind::Vertical => "vertical",
            LayoutKind::MainAndDeck => "main_and_deck",
        }
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutKind {
    type Err = LayoutParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "grid" => Ok(LayoutKind::Grid),
            "horizontal" => Ok(LayoutKind::Horizontal),
            "vertical" => Ok(LayoutKind::Vertical),
            "main_and_deck" | "main_deck" | "main" => Ok(LayoutKind::MainAndDeck),
            _ => Err(LayoutParseError::UnknownLayout(s.to_string())),
        }
    }
}

/// Process-wide tiling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilingConfig {
    /// The active layout.
    pub layout: LayoutKind,
    /// Pixels between windows and from the work-area edge.
    pub padding: i32,
    /// Fraction of the width given to the main window in [`LayoutKind::MainAndDeck`].
    pub main_ratio: f64,
    /// Reserved: keep tiled windows clear of the taskbar.
    pub skip_taskbar: bool,
    /// Reserved: border size applied when styling windows.
    pub border_size: i32,
    /// Apply outer padding at the grid origin like the other layouts.
    /// Off by default to keep the historical flush-to-edge grid.
    pub grid_outer_padding: bool,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            layout: LayoutKind::Grid,
            padding: DEFAULT_PADDING,
            main_ratio: DEFAULT_MAIN_RATIO,
            skip_taskbar: true,
            border_size: DEFAULT_BORDER_SIZE,
            grid_outer_padding: false,
        }
    }
}

/// A window as seen by the layout engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutWindow {
    /// The window identifier.
    pub id: WindowId,
    /// Z-order rank: number of windows in front of it. Lower is closer to the front.
    pub z_rank: u32,
}

impl LayoutWindow {
    pub fn new(id: WindowId, z_rank: u32) -> Self {
        Self { id, z_rank }
    }
}

/// Computed placement for a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPlacement {
    /// The window identifier.
    pub window_id: WindowId,
    /// The target rectangle in screen coordinates.
    pub rect: Rect,
}

impl WindowPlacement {
    pub fn new(window_id: WindowId, rect: Rect) -> Self {
        Self { window_id, rect }
    }
}

/// Grid shape for `count` windows: `rows = ceil(sqrt(n))`, `cols = ceil(n / rows)`.
///
/// Returns `(0, 0)` for an empty grid.
pub fn grid_dimensions(count: usize) -> (usize, usize) {
    if count == 0 {
        return (0, 0);
    }
    let mut rows = 1;
    while rows * rows < count {
        rows += 1;
    }
    let cols = count.div_ceil(rows);
    (rows, cols)
}

/// Compute placements for `windows` using the given layout.
///
/// Returns exactly one placement per input window, in input order. A single
/// window always fills the padded work area.
pub fn compute_layout(
    kind: LayoutKind,
    work_area: WorkArea,
    config: &TilingConfig,
    windows: &[LayoutWindow],
) -> Vec<WindowPlacement> {
    match windows {
        [] => Vec::new(),
        [only] => vec![WindowPlacement::new(only.id, work_area.padded(config.padding))],
        _ => match kind {
            LayoutKind::Grid => layout_grid(work_area, config, windows),
            LayoutKind::Horizontal => layout_horizontal(work_area, config, windows),
            LayoutKind::Vertical => layout_vertical(work_area, config, windows),
            LayoutKind::MainAndDeck => layout_main_and_deck(work_area, config, windows),
        },
    }
}

fn as_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn layout_grid(
    work_area: WorkArea,
    config: &TilingConfig,
    windows: &[LayoutWindow],
) -> Vec<WindowPlacement> {
    let pad = config.padding;
    let (rows, cols) = grid_dimensions(windows.len());
    let cell_width = work_area.width() / as_i32(cols) - pad * 2;
    let cell_height = work_area.height() / as_i32(rows) - pad * 2;
    let origin_offset = if config.grid_outer_padding { pad } else { 0 };

    // Slot assignment follows z-order; ties keep enumeration order.
    let mut slots: Vec<usize> = (0..windows.len()).collect();
    slots.sort_by_key(|&i| windows[i].z_rank);

    let mut rects = vec![Rect::new(0, 0, 0, 0); windows.len()];
    for (slot, &window_index) in slots.iter().enumerate() {
        let row = as_i32(slot / cols);
        let col = as_i32(slot % cols);
        rects[window_index] = Rect::new(
            work_area.left + origin_offset + col * (cell_width + pad * 2),
            work_area.top + origin_offset + row * (cell_height + pad * 2),
            cell_width,
            cell_height,
        );
    }

    windows
        .iter()
        .zip(rects)
        .map(|(w, rect)| WindowPlacement::new(w.id, rect))
        .collect()
}

fn layout_horizontal(
    work_area: WorkArea,
    config: &TilingConfig,
    windows: &[LayoutWindow],
) -> Vec<WindowPlacement> {
    let pad = config.padding;
    let width = work_area.width() / as_i32(windows.len()) - pad * 2;
    let height = work_area.height() - pad * 2;

    windows
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let x = work_area.left + as_i32(i) * (width + pad * 2) + pad;
            WindowPlacement::new(w.id, Rect::new(x, work_area.top + pad, width, height))
        })
        .collect()
}

fn layout_vertical(
    work_area: WorkArea,
    config: &TilingConfig,
    windows: &[LayoutWindow],
) -> Vec<WindowPlacement> {
    let pad = config.padding;
    let width = work_area.width() - pad * 2;
    let height = work_area.height() / as_i32(windows.len()) - pad * 2;

    windows
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let y = work_area.top + as_i32(i) * (height + pad * 2) + pad;
            WindowPlacement::new(w.id, Rect::new(work_area.left + pad, y, width, height))
        })
        .collect()
}

fn layout_main_and_deck(
    work_area: WorkArea,
    config: &TilingConfig,
    windows: &[LayoutWindow],
) -> Vec<WindowPlacement> {
    let pad = config.padding;
    let screen_width = work_area.width();
    let screen_height = work_area.height();

    let main_width = (f64::from(screen_width) * config.main_ratio).floor() as i32 - pad * 2;
    let deck_width = screen_width - main_width - pad * 3;
    let deck_height = screen_height / as_i32(windows.len() - 1) - pad * 2;
    let deck_x = work_area.left + main_width + pad * 2;

    let mut placements = Vec::with_capacity(windows.len());
    placements.push(WindowPlacement::new(
        windows[0].id,
        Rect::new(
            work_area.left + pad,
            work_area.top + pad,
            main_width,
            screen_height - pad * 2,
        ),
    ));

    for (j, w) in windows[1..].iter().enumerate() {
        let y = work_area.top + as_i32(j) * (deck_height + pad * 2) + pad;
        placements.push(WindowPlacement::new(
            w.id,
            Rect::new(deck_x, y, deck_width, deck_height),
        ));
    }

    placements
}

//! Window model and the OS collaborator interface.
//!
//! Windows are owned by the OS. The engine only ever holds a [`WindowId`]
//! and asks the [`WindowSystem`] about it; any handle may go stale between
//! two calls.

use serde::{Deserialize, Serialize};
use shelltile_core_layout::{Rect, WindowId, WorkArea};
use std::ops::BitAnd;
use thiserror::Error;

/// Errors reported by a [`WindowSystem`] implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WindowSystemError {
    #[error("Failed to enumerate windows: {0}")]
    EnumerationFailed(String),

    #[error("Window {0:#x} no longer exists")]
    WindowGone(WindowId),

    #[error("Failed to query {what}: {reason}")]
    QueryFailed { what: &'static str, reason: String },

    #[error("Operation '{operation}' failed on window {window:#x}: {reason}")]
    OperationFailed {
        operation: &'static str,
        window: WindowId,
        reason: String,
    },
}

impl WindowSystemError {
    /// Shorthand for [`WindowSystemError::OperationFailed`].
    pub fn operation(operation: &'static str, window: WindowId, reason: impl Into<String>) -> Self {
        Self::OperationFailed {
            operation,
            window,
            reason: reason.into(),
        }
    }
}

/// Window style bits (`GWL_STYLE`). Values match Win32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowStyle(pub u32);

impl WindowStyle {
    pub const MAXIMIZEBOX: WindowStyle = WindowStyle(0x0001_0000);
    pub const CAPTION: WindowStyle = WindowStyle(0x00C0_0000);
    pub const OVERLAPPEDWINDOW: WindowStyle = WindowStyle(0x00CF_0000);
    pub const VISIBLE: WindowStyle = WindowStyle(0x1000_0000);
    pub const MINIMIZE: WindowStyle = WindowStyle(0x2000_0000);
    pub const POPUP: WindowStyle = WindowStyle(0x8000_0000);

    /// True if any bit of `other` is set.
    pub fn intersects(self, other: WindowStyle) -> bool {
        self.0 & other.0 != 0
    }

    /// This style with the bits of `other` cleared.
    pub fn without(self, other: WindowStyle) -> WindowStyle {
        WindowStyle(self.0 & !other.0)
    }
}

impl BitAnd for WindowStyle {
    type Output = WindowStyle;

    fn bitand(self, rhs: WindowStyle) -> WindowStyle {
        WindowStyle(self.0 & rhs.0)
    }
}

/// Extended window style bits (`GWL_EXSTYLE`). Values match Win32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowExStyle(pub u32);

impl WindowExStyle {
    pub const TOOLWINDOW: WindowExStyle = WindowExStyle(0x0000_0080);

    /// True if any bit of `other` is set.
    pub fn intersects(self, other: WindowExStyle) -> bool {
        self.0 & other.0 != 0
    }
}

/// Snapshot of the attributes the filter needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    /// The window handle as u64.
    pub id: WindowId,
    /// Window title (diagnostics only).
    pub title: String,
    /// Window class name.
    pub class_name: String,
    /// Whether the window is visible.
    pub visible: bool,
    /// Whether the window is minimized.
    pub minimized: bool,
    /// `GWL_STYLE` bits.
    pub style: WindowStyle,
    /// `GWL_EXSTYLE` bits.
    pub ex_style: WindowExStyle,
}

/// The OS window query/mutation collaborator.
///
/// Calls are synchronous and the implementation is authoritative. Every
/// mutator must tolerate a handle that died since it was enumerated.
pub trait WindowSystem {
    /// All top-level windows, in the OS's enumeration order.
    fn enumerate_windows(&self) -> Result<Vec<WindowId>, WindowSystemError>;

    /// Current attributes of a window.
    fn window_info(&self, id: WindowId) -> Result<WindowInfo, WindowSystemError>;

    /// Number of windows in front of `id` in the z-order.
    fn z_order_rank(&self, id: WindowId) -> Result<u32, WindowSystemError>;

    /// The usable screen region, excluding reserved UI like the taskbar.
    fn work_area(&self) -> Result<WorkArea, WindowSystemError>;

    /// Whether `id` still refers to a live window.
    fn is_window(&self, id: WindowId) -> bool;

    /// Whether the window is currently maximized.
    fn is_maximized(&self, id: WindowId) -> bool;

    /// Restore a maximized window to its normal state.
    fn restore(&self, id: WindowId) -> Result<(), WindowSystemError>;

    /// Clear the maximize-box style bit.
    fn clear_maximize_box(&self, id: WindowId) -> Result<(), WindowSystemError>;

    /// Move and resize the window.
    fn move_window(&self, id: WindowId, rect: Rect) -> Result<(), WindowSystemError>;

    /// Ensure the window is shown.
    fn show(&self, id: WindowId) -> Result<(), WindowSystemError>;

    /// Raise the window to the top of the z-order.
    fn bring_to_top(&self, id: WindowId) -> Result<(), WindowSystemError>;
}

impl<T: WindowSystem + ?Sized> WindowSystem for &T {
    fn enumerate_windows(&self) -> Result<Vec<WindowId>, WindowSystemError> {
        (**self).enumerate_windows()
    }

    fn window_info(&self, id: WindowId) -> Result<WindowInfo, WindowSystemError> {
        (**self).window_info(id)
    }

    fn z_order_rank(&self, id: WindowId) -> Result<u32, WindowSystemError> {
        (**self).z_order_rank(id)
    }

    fn work_area(&self) -> Result<WorkArea, WindowSystemError> {
        (**self).work_area()
    }

    fn is_window(&self, id: WindowId) -> bool {
        (**self).is_window(id)
    }

    fn is_maximized(&self, id: WindowId) -> bool {
        (**self).is_maximized(id)
    }

    fn restore(&self, id: WindowId) -> Result<(), WindowSystemError> {
        (**self).restore(id)
    }

    fn clear_maximize_box(&self, id: WindowId) -> Result<(), WindowSystemError> {
        (**self).clear_maximize_box(id)
    }

    fn move_window(&self, id: WindowId, rect: Rect) -> Result<(), WindowSystemError> {
        (**self).move_window(id, rect)
    }

    fn show(&self, id: WindowId) -> Result<(), WindowSystemError> {
        (**self).show(id)
    }

    fn bring_to_top(&self, id: WindowId) -> Result<(), WindowSystemError> {
        (**self).bring_to_top(id)
    }
}

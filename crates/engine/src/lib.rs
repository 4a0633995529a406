//! ShellTile Engine
//!
//! Everything between the layout math and the OS:
//! - [`window`]: the [`WindowSystem`] collaborator trait and window attributes
//! - [`filter`]: which windows are tiled
//! - [`window_set`]: the per-pass set of tileable windows
//! - [`apply`]: pushing placements to windows, one at a time
//! - [`controller`]: the reconciliation loop tying it together
//!
//! The engine is OS-agnostic; the Win32 implementation of [`WindowSystem`]
//! lives in `shelltile-platform-win32`.

pub mod apply;
pub mod controller;
pub mod filter;
pub mod window;
pub mod window_set;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use apply::{apply_placement, apply_placements, ApplyError, ApplyReport};
pub use controller::{Command, Controller, ControllerError, Notification, RetileReport};
pub use filter::{WindowFilter, DEFAULT_IGNORED_CLASSES};
pub use window::{WindowExStyle, WindowInfo, WindowStyle, WindowSystem, WindowSystemError};
pub use window_set::{build_window_set, TileCandidate, WindowSet};

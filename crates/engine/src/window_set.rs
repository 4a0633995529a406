//! Building the set of windows for one tiling pass.

use crate::filter::WindowFilter;
use crate::window::{WindowSystem, WindowSystemError};
use shelltile_core_layout::{LayoutWindow, WindowId};
use tracing::debug;

/// A window that passed the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileCandidate {
    /// The window handle.
    pub id: WindowId,
    /// Z-order rank at enumeration time (`u32::MAX` if it could not be read).
    pub z_rank: u32,
    /// Title, for logging.
    pub title: String,
}

/// Tileable windows in enumeration order.
///
/// Rebuilt from scratch on every pass; never diffed against a previous set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowSet {
    windows: Vec<TileCandidate>,
}

impl WindowSet {
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn windows(&self) -> &[TileCandidate] {
        &self.windows
    }

    /// Window ids in set order.
    pub fn ids(&self) -> Vec<WindowId> {
        self.windows.iter().map(|w| w.id).collect()
    }

    /// The set as layout input.
    pub fn layout_windows(&self) -> Vec<LayoutWindow> {
        self.windows
            .iter()
            .map(|w| LayoutWindow::new(w.id, w.z_rank))
            .collect()
    }

    /// Title of a window in the set, if present.
    pub fn title_of(&self, id: WindowId) -> Option<&str> {
        self.windows
            .iter()
            .find(|w| w.id == id)
            .map(|w| w.title.as_str())
    }
}

impl FromIterator<TileCandidate> for WindowSet {
    fn from_iter<I: IntoIterator<Item = TileCandidate>>(iter: I) -> Self {
        Self {
            windows: iter.into_iter().collect(),
        }
    }
}

/// Enumerate top-level windows and keep the tileable ones, in enumeration order.
///
/// A window that disappears between enumeration and its attribute query is
/// skipped. Only a failure of the enumeration itself is an error.
pub fn build_window_set<S: WindowSystem>(
    system: &S,
    filter: &WindowFilter,
) -> Result<WindowSet, WindowSystemError> {
    let handles = system.enumerate_windows()?;
    let mut windows = Vec::new();

    for id in handles {
        let info = match system.window_info(id) {
            Ok(info) => info,
            Err(e) => {
                debug!("Skipping window {:#x} during enumeration: {}", id, e);
                continue;
            }
        };

        if !filter.is_tileable(&info) {
            continue;
        }

        let z_rank = system.z_order_rank(id).unwrap_or_else(|e| {
            debug!("No z-order rank for window {:#x}: {}", id, e);
            u32::MAX
        });

        debug!("Found window: '{}' ({}) rank {}", info.title, info.class_name, z_rank);
        windows.push(TileCandidate {
            id,
            z_rank,
            title: info.title,
        });
    }

    Ok(WindowSet { windows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeWindowSystem;
    use crate::window::{WindowExStyle, WindowInfo};

    #[test]
    fn test_empty_desktop_gives_empty_set() {
        let system = FakeWindowSystem::new();
        let set = build_window_set(&system, &WindowFilter::default()).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_keeps_enumeration_order() {
        let system = FakeWindowSystem::new();
        system.push_app(1, "one");
        system.push_app(2, "two");
        system.push_app(3, "three");
        system.set_enumeration_order(vec![3, 1, 2]);

        let set = build_window_set(&system, &WindowFilter::default()).unwrap();
        assert_eq!(set.ids(), vec![3, 1, 2]);
        // Ranks come from the z-order, not the enumeration order.
        let ranks: Vec<u32> = set.windows().iter().map(|w| w.z_rank).collect();
        assert_eq!(ranks, vec![2, 0, 1]);
    }

    #[test]
    fn test_filters_out_tool_windows() {
        let system = FakeWindowSystem::new();
        system.push_app(1, "editor");
        system.push_window(WindowInfo {
            ex_style: WindowExStyle::TOOLWINDOW,
            ..FakeWindowSystem::app_window(2, "palette")
        });
        system.push_window(WindowInfo {
            ex_style: WindowExStyle::TOOLWINDOW,
            visible: false,
            ..FakeWindowSystem::app_window(3, "hidden palette")
        });

        let set = build_window_set(&system, &WindowFilter::default()).unwrap();
        assert_eq!(set.ids(), vec![1]);
    }

    #[test]
    fn test_window_closing_mid_enumeration_is_skipped() {
        let system = FakeWindowSystem::new();
        system.push_app(1, "stays");
        system.push_app(2, "closes");
        system.push_app(3, "stays too");
        system.vanish_after_enumeration(2);

        let set = build_window_set(&system, &WindowFilter::default()).unwrap();
        assert_eq!(set.ids(), vec![1, 3]);
    }

    #[test]
    fn test_enumeration_failure_is_error() {
        let system = FakeWindowSystem::new();
        system.push_app(1, "one");
        system.set_enumeration_fails(true);

        let result = build_window_set(&system, &WindowFilter::default());
        assert!(matches!(result, Err(WindowSystemError::EnumerationFailed(_))));
    }

    #[test]
    fn test_layout_windows_and_titles() {
        let system = FakeWindowSystem::new();
        system.push_app(10, "front");
        system.push_app(20, "back");

        let set = build_window_set(&system, &WindowFilter::default()).unwrap();
        let layout = set.layout_windows();
        assert_eq!(layout[0], LayoutWindow::new(10, 0));
        assert_eq!(layout[1], LayoutWindow::new(20, 1));
        assert_eq!(set.title_of(20), Some("back"));
        assert_eq!(set.title_of(30), None);
    }
}

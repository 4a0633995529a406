//! The tileable-window heuristic.

use crate::window::{WindowExStyle, WindowInfo, WindowStyle};
use tracing::debug;

/// Shell and system window classes that are never tiled.
pub const DEFAULT_IGNORED_CLASSES: &[&str] = &[
    "Shell_TrayWnd",
    "DV2ControlHost",
    "Windows.UI.Core.CoreWindow",
    "Progman",
    "SysShadow",
    "Button",
];

/// Decides whether a window is a tiling candidate.
///
/// A window qualifies when it is visible, not minimized, has a standard
/// overlapped or captioned style, is neither a popup nor a tool window, and
/// its class is not in the deny-list. Class names are matched exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFilter {
    ignored_classes: Vec<String>,
}

impl Default for WindowFilter {
    fn default() -> Self {
        Self::with_ignored_classes(DEFAULT_IGNORED_CLASSES.iter().copied())
    }
}

impl WindowFilter {
    /// Create a filter with a custom deny-list of window classes.
    pub fn with_ignored_classes<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignored_classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    /// The configured deny-list.
    pub fn ignored_classes(&self) -> &[String] {
        &self.ignored_classes
    }

    /// Whether the window should be tiled.
    pub fn is_tileable(&self, window: &WindowInfo) -> bool {
        match self.rejection(window) {
            Some(reason) => {
                debug!(
                    "Not tiling {:#x} '{}' ({}): {}",
                    window.id, window.title, window.class_name, reason
                );
                false
            }
            None => true,
        }
    }

    /// Why the window is not a tiling candidate, or `None` if it is.
    pub fn rejection(&self, window: &WindowInfo) -> Option<&'static str> {
        if !window.visible {
            return Some("hidden");
        }
        if window.minimized {
            return Some("minimized");
        }
        if window.style.intersects(WindowStyle::POPUP) {
            return Some("popup");
        }
        if window.ex_style.intersects(WindowExStyle::TOOLWINDOW) {
            return Some("tool window");
        }
        let is_app_window = window.style.intersects(WindowStyle::OVERLAPPEDWINDOW)
            || window.style.intersects(WindowStyle::CAPTION);
        if !is_app_window {
            return Some("no caption");
        }
        if self.is_ignored_class(&window.class_name) {
            return Some("ignored class");
        }
        None
    }

    fn is_ignored_class(&self, class_name: &str) -> bool {
        self.ignored_classes.iter().any(|c| c == class_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_window() -> WindowInfo {
        WindowInfo {
            id: 1,
            title: "Untitled - Notepad".to_string(),
            class_name: "Notepad".to_string(),
            visible: true,
            minimized: false,
            style: WindowStyle::OVERLAPPEDWINDOW,
            ex_style: WindowExStyle::default(),
        }
    }

    #[test]
    fn test_standard_window_is_tileable() {
        assert!(WindowFilter::default().is_tileable(&app_window()));
    }

    #[test]
    fn test_rejection_reasons() {
        let filter = WindowFilter::default();
        assert_eq!(filter.rejection(&app_window()), None);
        assert_eq!(
            filter.rejection(&WindowInfo {
                minimized: true,
                ..app_window()
            }),
            Some("minimized")
        );
        assert_eq!(
            filter.rejection(&WindowInfo {
                ex_style: WindowExStyle::TOOLWINDOW,
                ..app_window()
            }),
            Some("tool window")
        );
        assert_eq!(
            filter.rejection(&WindowInfo {
                class_name: "Progman".to_string(),
                ..app_window()
            }),
            Some("ignored class")
        );
    }

    #[test]
    fn test_captioned_window_is_tileable() {
        let window = WindowInfo {
            style: WindowStyle::CAPTION,
            ..app_window()
        };
        assert!(WindowFilter::default().is_tileable(&window));
    }

    #[test]
    fn test_invisible_window_excluded() {
        let window = WindowInfo {
            visible: false,
            ..app_window()
        };
        assert!(!WindowFilter::default().is_tileable(&window));
    }

    #[test]
    fn test_minimized_window_excluded() {
        let window = WindowInfo {
            minimized: true,
            ..app_window()
        };
        assert!(!WindowFilter::default().is_tileable(&window));
    }

    #[test]
    fn test_popup_excluded_even_with_caption() {
        let window = WindowInfo {
            style: WindowStyle(WindowStyle::POPUP.0 | WindowStyle::CAPTION.0),
            ..app_window()
        };
        assert!(!WindowFilter::default().is_tileable(&window));
    }

    #[test]
    fn test_tool_window_excluded() {
        let window = WindowInfo {
            ex_style: WindowExStyle::TOOLWINDOW,
            ..app_window()
        };
        assert!(!WindowFilter::default().is_tileable(&window));
    }

    #[test]
    fn test_borderless_window_excluded() {
        let window = WindowInfo {
            style: WindowStyle::VISIBLE,
            ..app_window()
        };
        assert!(!WindowFilter::default().is_tileable(&window));
    }

    #[test]
    fn test_default_ignored_classes_excluded() {
        let filter = WindowFilter::default();
        for class in DEFAULT_IGNORED_CLASSES {
            let window = WindowInfo {
                class_name: class.to_string(),
                ..app_window()
            };
            assert!(!filter.is_tileable(&window), "{class} should be ignored");
        }
    }

    #[test]
    fn test_class_match_is_exact() {
        let window = WindowInfo {
            class_name: "Shell_TrayWnd2".to_string(),
            ..app_window()
        };
        assert!(WindowFilter::default().is_tileable(&window));
    }

    #[test]
    fn test_custom_ignored_classes() {
        let filter = WindowFilter::with_ignored_classes(["Notepad"]);
        assert!(!filter.is_tileable(&app_window()));
        assert_eq!(filter.ignored_classes(), &["Notepad".to_string()]);

        // The defaults no longer apply once replaced.
        let tray = WindowInfo {
            class_name: "Progman".to_string(),
            ..app_window()
        };
        assert!(filter.is_tileable(&tray));
    }
}

//! Applying computed placements to real windows.
//!
//! Best effort: each window is handled on its own, and a failure on one
//! never stops the rest of the batch.
//!
//! Raising happens after all moves, back to front, so a batch given in
//! front-to-back order leaves the tiled windows stacked as they were.

use crate::window::{WindowSystem, WindowSystemError};
use shelltile_core_layout::{Rect, WindowId, WindowPlacement};
use thiserror::Error;
use tracing::debug;

/// Why a single placement was not applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("Window {0:#x} is no longer valid")]
    Stale(WindowId),

    #[error("Placement for window {window:#x} has no area ({}x{})", .rect.width, .rect.height)]
    DegenerateGeometry { window: WindowId, rect: Rect },

    #[error(transparent)]
    Os(#[from] WindowSystemError),
}

/// Outcome of applying a batch of placements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Windows that were moved.
    pub applied: usize,
    /// Windows that were skipped, with the reason.
    pub skipped: Vec<(WindowId, ApplyError)>,
    /// Windows brought to the top, front-most first.
    pub raised: Vec<WindowId>,
}

impl ApplyReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Apply one placement.
///
/// The handle is re-validated first. Placements without a positive area are
/// refused and the window is left where it is. Restoring, style changes and
/// showing are best effort; only a failed move fails the call. The window is
/// not raised; see [`raise_front_to_back`].
pub fn apply_placement<S: WindowSystem>(
    system: &S,
    placement: &WindowPlacement,
) -> Result<(), ApplyError> {
    let id = placement.window_id;
    let rect = placement.rect;

    if !system.is_window(id) {
        return Err(ApplyError::Stale(id));
    }
    if !rect.has_area() {
        return Err(ApplyError::DegenerateGeometry { window: id, rect });
    }

    if system.is_maximized(id) {
        if let Err(e) = system.restore(id) {
            debug!("Failed to restore window {:#x}: {}", id, e);
        }
    }

    if let Err(e) = system.clear_maximize_box(id) {
        debug!("Failed to clear maximize box on {:#x}: {}", id, e);
    }

    system.move_window(id, rect)?;

    if let Err(e) = system.show(id) {
        debug!("Failed to show window {:#x}: {}", id, e);
    }

    debug!(
        "Tiled window {:#x} to ({}, {}) size ({}, {})",
        id, rect.x, rect.y, rect.width, rect.height
    );
    Ok(())
}

/// Bring `front_first` to the top so that its first window ends up front-most.
pub fn raise_front_to_back<S: WindowSystem>(system: &S, front_first: &[WindowId]) {
    for &id in front_first.iter().rev() {
        if let Err(e) = system.bring_to_top(id) {
            debug!("Failed to raise window {:#x}: {}", id, e);
        }
    }
}

/// Apply all placements, skipping windows that fail, then raise the moved
/// windows.
///
/// `placements` should be ordered front-most first.
pub fn apply_placements<S: WindowSystem>(
    system: &S,
    placements: &[WindowPlacement],
) -> ApplyReport {
    let mut report = ApplyReport::default();

    for placement in placements {
        match apply_placement(system, placement) {
            Ok(()) => {
                report.applied += 1;
                report.raised.push(placement.window_id);
            }
            Err(e) => {
                debug!("Placement for window {:#x} failed: {}", placement.window_id, e);
                report.skipped.push((placement.window_id, e));
            }
        }
    }

    raise_front_to_back(system, &report.raised);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeOp, FakeWindowSystem};
    use crate::window::WindowStyle;

    fn placement(id: WindowId, x: i32, y: i32, w: i32, h: i32) -> WindowPlacement {
        WindowPlacement::new(id, Rect::new(x, y, w, h))
    }

    #[test]
    fn test_apply_moves_and_shows() {
        let system = FakeWindowSystem::new();
        system.push_app(1, "one");

        apply_placement(&system, &placement(1, 4, 4, 632, 1032)).unwrap();

        assert_eq!(system.rect_of(1), Some(Rect::new(4, 4, 632, 1032)));
        assert_eq!(
            system.ops(),
            vec![
                FakeOp::ClearMaximizeBox(1),
                FakeOp::Move(1, Rect::new(4, 4, 632, 1032)),
                FakeOp::Show(1),
            ]
        );
    }

    #[test]
    fn test_batch_keeps_stacking_order() {
        let system = FakeWindowSystem::new();
        for id in 1..=3 {
            system.push_app(id, "app");
        }
        system.push_app(4, "untiled");

        let report = apply_placements(
            &system,
            &[
                placement(1, 0, 0, 100, 100),
                placement(2, 100, 0, 100, 100),
                placement(3, 200, 0, 100, 100),
            ],
        );

        assert_eq!(report.raised, vec![1, 2, 3]);
        assert_eq!(system.enumerate_windows().unwrap(), vec![1, 2, 3, 4]);
        let raises: Vec<FakeOp> = system
            .ops()
            .into_iter()
            .filter(|op| matches!(op, FakeOp::BringToTop(_)))
            .collect();
        assert_eq!(
            raises,
            vec![FakeOp::BringToTop(3), FakeOp::BringToTop(2), FakeOp::BringToTop(1)]
        );
    }

    #[test]
    fn test_raise_brings_window_to_front() {
        let system = FakeWindowSystem::new();
        system.push_app(1, "front");
        system.push_app(2, "back");

        raise_front_to_back(&system, &[2]);
        assert_eq!(system.enumerate_windows().unwrap(), vec![2, 1]);
        assert_eq!(system.z_order_rank(2), Ok(0));
    }

    #[test]
    fn test_apply_restores_maximized_window_first() {
        let system = FakeWindowSystem::new();
        system.push_app(1, "maximized");
        system.set_maximized(1, true);

        apply_placement(&system, &placement(1, 0, 0, 100, 100)).unwrap();

        assert_eq!(system.ops()[0], FakeOp::Restore(1));
        assert!(!system.is_maximized(1));
    }

    #[test]
    fn test_apply_clears_maximize_box() {
        let system = FakeWindowSystem::new();
        system.push_app(1, "one");
        assert!(system.style_of(1).unwrap().intersects(WindowStyle::MAXIMIZEBOX));

        apply_placement(&system, &placement(1, 0, 0, 100, 100)).unwrap();

        assert!(!system.style_of(1).unwrap().intersects(WindowStyle::MAXIMIZEBOX));
    }

    #[test]
    fn test_stale_window_is_noop() {
        let system = FakeWindowSystem::new();
        let result = apply_placement(&system, &placement(42, 0, 0, 100, 100));
        assert_eq!(result, Err(ApplyError::Stale(42)));
        assert!(system.ops().is_empty());
    }

    #[test]
    fn test_degenerate_geometry_is_refused() {
        let system = FakeWindowSystem::new();
        system.push_app(1, "one");

        let result = apply_placement(&system, &placement(1, 0, 0, -8, 500));
        assert!(matches!(result, Err(ApplyError::DegenerateGeometry { window: 1, .. })));
        assert_eq!(system.rect_of(1), Some(Rect::new(0, 0, 800, 600)));
        assert!(system.ops().is_empty());
    }

    #[test]
    fn test_batch_continues_after_failure() {
        let system = FakeWindowSystem::new();
        system.push_app(1, "one");
        system.push_app(2, "refuses to move");
        system.push_app(3, "three");
        system.fail_moves_for(2);

        let report = apply_placements(
            &system,
            &[
                placement(1, 0, 0, 100, 100),
                placement(2, 100, 0, 100, 100),
                placement(9, 200, 0, 100, 100),
                placement(3, 300, 0, 100, 100),
            ],
        );

        assert_eq!(report.applied, 2);
        assert_eq!(report.skipped_count(), 2);
        assert_eq!(report.skipped[0].0, 2);
        assert!(matches!(report.skipped[0].1, ApplyError::Os(_)));
        assert_eq!(report.skipped[1], (9, ApplyError::Stale(9)));
        assert_eq!(report.raised, vec![1, 3]);
        assert_eq!(system.rect_of(3), Some(Rect::new(300, 0, 100, 100)));
    }
}

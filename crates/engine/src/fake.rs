//! In-memory [`WindowSystem`] for tests.
//!
//! Windows live in a z-ordered list (front first); enumeration can be given
//! a separate order to mimic the OS. Raising a window moves it to the front
//! of that list. Every mutation is recorded.

use crate::window::{WindowExStyle, WindowInfo, WindowStyle, WindowSystem, WindowSystemError};
use shelltile_core_layout::{Rect, WindowId, WorkArea};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// A mutation performed through the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeOp {
    Restore(WindowId),
    ClearMaximizeBox(WindowId),
    Move(WindowId, Rect),
    Show(WindowId),
    BringToTop(WindowId),
}

#[derive(Debug, Clone)]
struct FakeWindow {
    info: WindowInfo,
    maximized: bool,
    rect: Rect,
}

#[derive(Debug, Default)]
struct FakeState {
    /// Front-most first.
    z_order: Vec<FakeWindow>,
    enumeration: Option<Vec<WindowId>>,
    work_area: Option<WorkArea>,
    enumeration_fails: bool,
    vanished_after_enumeration: HashSet<WindowId>,
    failing_moves: HashSet<WindowId>,
    ops: Vec<FakeOp>,
}

/// In-memory window system.
#[derive(Debug, Default)]
pub struct FakeWindowSystem {
    state: Mutex<FakeState>,
}

impl FakeWindowSystem {
    /// A 1920×1040 work area with no windows.
    pub fn new() -> Self {
        let fake = Self::default();
        fake.lock().work_area = Some(WorkArea::new(0, 0, 1920, 1040));
        fake
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// A visible, overlapped application window.
    pub fn app_window(id: WindowId, title: &str) -> WindowInfo {
        WindowInfo {
            id,
            title: title.to_string(),
            class_name: "ApplicationWindow".to_string(),
            visible: true,
            minimized: false,
            style: WindowStyle(WindowStyle::OVERLAPPEDWINDOW.0 | WindowStyle::VISIBLE.0),
            ex_style: WindowExStyle::default(),
        }
    }

    /// Add a window behind all existing ones.
    pub fn push_window(&self, info: WindowInfo) {
        self.lock().z_order.push(FakeWindow {
            info,
            maximized: false,
            rect: Rect::new(0, 0, 800, 600),
        });
    }

    /// Add a standard application window behind all existing ones.
    pub fn push_app(&self, id: WindowId, title: &str) {
        self.push_window(Self::app_window(id, title));
    }

    /// Remove a window entirely.
    pub fn close_window(&self, id: WindowId) {
        let mut state = self.lock();
        state.z_order.retain(|w| w.info.id != id);
        if let Some(order) = state.enumeration.as_mut() {
            order.retain(|&w| w != id);
        }
    }

    /// Override the enumeration order (defaults to z-order).
    pub fn set_enumeration_order(&self, order: Vec<WindowId>) {
        self.lock().enumeration = Some(order);
    }

    pub fn set_work_area(&self, area: Option<WorkArea>) {
        self.lock().work_area = area;
    }

    pub fn set_maximized(&self, id: WindowId, maximized: bool) {
        if let Some(w) = self.lock().z_order.iter_mut().find(|w| w.info.id == id) {
            w.maximized = maximized;
        }
    }

    pub fn set_enumeration_fails(&self, fails: bool) {
        self.lock().enumeration_fails = fails;
    }

    /// The window stays in enumeration results but is dead for every other call.
    pub fn vanish_after_enumeration(&self, id: WindowId) {
        self.lock().vanished_after_enumeration.insert(id);
    }

    /// Make `move_window` fail for this window.
    pub fn fail_moves_for(&self, id: WindowId) {
        self.lock().failing_moves.insert(id);
    }

    /// Current rectangle of a window.
    pub fn rect_of(&self, id: WindowId) -> Option<Rect> {
        self.lock()
            .z_order
            .iter()
            .find(|w| w.info.id == id)
            .map(|w| w.rect)
    }

    /// Current style bits of a window.
    pub fn style_of(&self, id: WindowId) -> Option<WindowStyle> {
        self.lock()
            .z_order
            .iter()
            .find(|w| w.info.id == id)
            .map(|w| w.info.style)
    }

    /// Recorded mutations, in call order.
    pub fn ops(&self) -> Vec<FakeOp> {
        self.lock().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.lock().ops.clear();
    }

    fn with_live<T>(
        &self,
        id: WindowId,
        f: impl FnOnce(&mut FakeState, usize) -> T,
    ) -> Result<T, WindowSystemError> {
        let mut state = self.lock();
        if state.vanished_after_enumeration.contains(&id) {
            return Err(WindowSystemError::WindowGone(id));
        }
        let index = state
            .z_order
            .iter()
            .position(|w| w.info.id == id)
            .ok_or(WindowSystemError::WindowGone(id))?;
        Ok(f(&mut *state, index))
    }
}

impl WindowSystem for FakeWindowSystem {
    fn enumerate_windows(&self) -> Result<Vec<WindowId>, WindowSystemError> {
        let state = self.lock();
        if state.enumeration_fails {
            return Err(WindowSystemError::EnumerationFailed("fake failure".to_string()));
        }
        Ok(match &state.enumeration {
            Some(order) => order.clone(),
            None => state.z_order.iter().map(|w| w.info.id).collect(),
        })
    }

    fn window_info(&self, id: WindowId) -> Result<WindowInfo, WindowSystemError> {
        self.with_live(id, |state, i| state.z_order[i].info.clone())
    }

    fn z_order_rank(&self, id: WindowId) -> Result<u32, WindowSystemError> {
        self.with_live(id, |_, i| i as u32)
    }

    fn work_area(&self) -> Result<WorkArea, WindowSystemError> {
        self.lock().work_area.ok_or_else(|| WindowSystemError::QueryFailed {
            what: "work area",
            reason: "unavailable".to_string(),
        })
    }

    fn is_window(&self, id: WindowId) -> bool {
        self.with_live(id, |_, _| ()).is_ok()
    }

    fn is_maximized(&self, id: WindowId) -> bool {
        self.with_live(id, |state, i| state.z_order[i].maximized)
            .unwrap_or(false)
    }

    fn restore(&self, id: WindowId) -> Result<(), WindowSystemError> {
        self.with_live(id, |state, i| {
            state.z_order[i].maximized = false;
            state.ops.push(FakeOp::Restore(id));
        })
    }

    fn clear_maximize_box(&self, id: WindowId) -> Result<(), WindowSystemError> {
        self.with_live(id, |state, i| {
            let style = state.z_order[i].info.style;
            state.z_order[i].info.style = style.without(WindowStyle::MAXIMIZEBOX);
            state.ops.push(FakeOp::ClearMaximizeBox(id));
        })
    }

    fn move_window(&self, id: WindowId, rect: Rect) -> Result<(), WindowSystemError> {
        self.with_live(id, |state, i| {
            if state.failing_moves.contains(&id) {
                return Err(WindowSystemError::operation("move", id, "access denied"));
            }
            state.z_order[i].rect = rect;
            state.ops.push(FakeOp::Move(id, rect));
            Ok(())
        })?
    }

    fn show(&self, id: WindowId) -> Result<(), WindowSystemError> {
        self.with_live(id, |state, _| state.ops.push(FakeOp::Show(id)))
    }

    fn bring_to_top(&self, id: WindowId) -> Result<(), WindowSystemError> {
        self.with_live(id, |state, i| {
            let window = state.z_order.remove(i);
            state.z_order.insert(0, window);
            state.ops.push(FakeOp::BringToTop(id));
        })
    }
}

//! [`WindowSystem`] over real top-level windows.

use crate::{hwnd_to_id, id_to_hwnd};
use shelltile_core_layout::{Rect, WindowId, WorkArea};
use shelltile_engine::{WindowExStyle, WindowInfo, WindowStyle, WindowSystem, WindowSystemError};
use std::ffi::c_void;
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, RECT};
use windows::Win32::UI::WindowsAndMessaging::{
    BringWindowToTop, EnumWindows, GetClassNameW, GetWindow, GetWindowLongW, GetWindowTextW,
    IsIconic, IsWindow, IsWindowVisible, IsZoomed, MoveWindow, SetWindowLongW, ShowWindow,
    SystemParametersInfoW, GWL_EXSTYLE, GWL_STYLE, GW_HWNDPREV, SPI_GETWORKAREA, SW_RESTORE,
    SW_SHOW, SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS,
};

/// Upper bound on the z-order walk, in case the window list changes under us.
const MAX_Z_ORDER_WALK: u32 = 10_000;

/// The live Win32 desktop.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32WindowSystem;

impl Win32WindowSystem {
    pub fn new() -> Self {
        Self
    }

    fn live_hwnd(&self, id: WindowId) -> Result<HWND, WindowSystemError> {
        let hwnd = id_to_hwnd(id);
        if unsafe { IsWindow(Some(hwnd)) }.as_bool() {
            Ok(hwnd)
        } else {
            Err(WindowSystemError::WindowGone(id))
        }
    }
}

unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let handles = &mut *(lparam.0 as *mut Vec<WindowId>);
    handles.push(hwnd_to_id(hwnd));
    BOOL(1)
}

fn read_utf16(fill: impl FnOnce(&mut [u16]) -> i32) -> String {
    let mut buf = [0u16; 256];
    let len = fill(&mut buf).clamp(0, buf.len() as i32) as usize;
    String::from_utf16_lossy(&buf[..len])
}

impl WindowSystem for Win32WindowSystem {
    fn enumerate_windows(&self) -> Result<Vec<WindowId>, WindowSystemError> {
        let mut handles: Vec<WindowId> = Vec::new();
        unsafe {
            EnumWindows(
                Some(collect_window),
                LPARAM(&mut handles as *mut Vec<WindowId> as isize),
            )
        }
        .map_err(|e| WindowSystemError::EnumerationFailed(e.to_string()))?;
        Ok(handles)
    }

    fn window_info(&self, id: WindowId) -> Result<WindowInfo, WindowSystemError> {
        let hwnd = self.live_hwnd(id)?;
        unsafe {
            let style = WindowStyle(GetWindowLongW(hwnd, GWL_STYLE) as u32);
            let ex_style = WindowExStyle(GetWindowLongW(hwnd, GWL_EXSTYLE) as u32);
            Ok(WindowInfo {
                id,
                title: read_utf16(|buf| GetWindowTextW(hwnd, buf)),
                class_name: read_utf16(|buf| GetClassNameW(hwnd, buf)),
                visible: IsWindowVisible(hwnd).as_bool(),
                minimized: IsIconic(hwnd).as_bool() || style.intersects(WindowStyle::MINIMIZE),
                style,
                ex_style,
            })
        }
    }

    fn z_order_rank(&self, id: WindowId) -> Result<u32, WindowSystemError> {
        let mut current = self.live_hwnd(id)?;
        let mut rank = 0;
        while rank < MAX_Z_ORDER_WALK {
            match unsafe { GetWindow(current, GW_HWNDPREV) } {
                Ok(prev) if !prev.is_invalid() => {
                    current = prev;
                    rank += 1;
                }
                _ => break,
            }
        }
        Ok(rank)
    }

    fn work_area(&self) -> Result<WorkArea, WindowSystemError> {
        let mut rect = RECT::default();
        unsafe {
            SystemParametersInfoW(
                SPI_GETWORKAREA,
                0,
                Some(&mut rect as *mut RECT as *mut c_void),
                SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
            )
        }
        .map_err(|e| WindowSystemError::QueryFailed {
            what: "work area",
            reason: e.to_string(),
        })?;
        Ok(WorkArea::new(rect.left, rect.top, rect.right, rect.bottom))
    }

    fn is_window(&self, id: WindowId) -> bool {
        self.live_hwnd(id).is_ok()
    }

    fn is_maximized(&self, id: WindowId) -> bool {
        unsafe { IsZoomed(id_to_hwnd(id)) }.as_bool()
    }

    fn restore(&self, id: WindowId) -> Result<(), WindowSystemError> {
        let hwnd = self.live_hwnd(id)?;
        // The return value is the previous visibility, not a failure flag.
        let _ = unsafe { ShowWindow(hwnd, SW_RESTORE) };
        Ok(())
    }

    fn clear_maximize_box(&self, id: WindowId) -> Result<(), WindowSystemError> {
        let hwnd = self.live_hwnd(id)?;
        unsafe {
            let style = WindowStyle(GetWindowLongW(hwnd, GWL_STYLE) as u32);
            if style.intersects(WindowStyle::MAXIMIZEBOX) {
                let cleared = style.without(WindowStyle::MAXIMIZEBOX);
                SetWindowLongW(hwnd, GWL_STYLE, cleared.0 as i32);
            }
        }
        Ok(())
    }

    fn move_window(&self, id: WindowId, rect: Rect) -> Result<(), WindowSystemError> {
        let hwnd = self.live_hwnd(id)?;
        unsafe { MoveWindow(hwnd, rect.x, rect.y, rect.width, rect.height, true) }
            .map_err(|e| WindowSystemError::operation("move", id, e.to_string()))
    }

    fn show(&self, id: WindowId) -> Result<(), WindowSystemError> {
        let hwnd = self.live_hwnd(id)?;
        let _ = unsafe { ShowWindow(hwnd, SW_SHOW) };
        Ok(())
    }

    fn bring_to_top(&self, id: WindowId) -> Result<(), WindowSystemError> {
        let hwnd = self.live_hwnd(id)?;
        unsafe { BringWindowToTop(hwnd) }
            .map_err(|e| WindowSystemError::operation("bring to top", id, e.to_string()))
    }
}

//! ShellTile Platform Win32
//!
//! Windows-specific window manipulation using Win32 APIs.
//!
//! This crate handles:
//! - [`Win32WindowSystem`]: the engine's `WindowSystem` backed by real HWNDs
//! - Shell hook notifications (window created, destroyed, activated, redrawn)
//! - Global hotkey registration
//!
//! Hotkey parsing and shell-code mapping are platform-independent and build
//! everywhere; the Win32 bindings only exist on Windows.

pub mod hotkeys;
pub mod shell_hook;

#[cfg(windows)]
mod window_system;

use thiserror::Error;

pub use hotkeys::{parse_hotkey_string, Hotkey, HotkeyEvent, HotkeyId, HotkeyParseError};
pub use shell_hook::notification_from_shell_code;

#[cfg(windows)]
pub use hotkeys::{register_hotkeys, HotkeyHandle};
#[cfg(windows)]
pub use shell_hook::{install_shell_hook, ShellHookHandle};
#[cfg(windows)]
pub use window_system::Win32WindowSystem;

/// Errors that can occur during Win32 operations.
#[derive(Debug, Error)]
pub enum Win32Error {
    #[error("Failed to install shell hook: {0}")]
    HookInstallFailed(String),

    #[error("Failed to register hotkeys: {0}")]
    HotkeyRegistrationFailed(String),

    #[error("Failed to spawn {name} thread: {reason}")]
    ThreadSpawnFailed { name: &'static str, reason: String },
}

/// Convert an HWND value to a [`shelltile_core_layout::WindowId`].
#[cfg(windows)]
pub(crate) fn hwnd_to_id(hwnd: windows::Win32::Foundation::HWND) -> shelltile_core_layout::WindowId {
    hwnd.0 as usize as u64
}

/// Convert a [`shelltile_core_layout::WindowId`] back to an HWND.
#[cfg(windows)]
pub(crate) fn id_to_hwnd(id: shelltile_core_layout::WindowId) -> windows::Win32::Foundation::HWND {
    windows::Win32::Foundation::HWND(id as usize as *mut std::ffi::c_void)
}

/// Pump the calling thread's message queue until `WM_QUIT` or an error.
#[cfg(windows)]
pub(crate) fn run_message_loop(mut on_message: impl FnMut(&windows::Win32::UI::WindowsAndMessaging::MSG)) {
    use windows::Win32::UI::WindowsAndMessaging::{DispatchMessageW, GetMessageW, TranslateMessage, MSG};

    let mut msg = MSG::default();
    loop {
        // 0 is WM_QUIT, -1 is an error.
        let result = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        if result.0 <= 0 {
            break;
        }
        on_message(&msg);
        unsafe {
            let _ = TranslateMessage(&msg);
            let _ = DispatchMessageW(&msg);
        }
    }
}

/// Ask a message-loop thread to exit.
#[cfg(windows)]
pub(crate) fn post_quit(thread_id: u32) {
    use windows::Win32::Foundation::{LPARAM, WPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{PostThreadMessageW, WM_QUIT};

    if let Err(e) = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
        tracing::debug!("Failed to post WM_QUIT to thread {}: {}", thread_id, e);
    }
}

//! Shell hook notifications.
//!
//! A hidden window registered with `RegisterShellHookWindow` receives the
//! shell's `SHELLHOOK` message for every top-level window change. The window
//! lives on its own thread with its own message loop and forwards each
//! message as a [`Notification`] over a channel.

use shelltile_core_layout::WindowId;
use shelltile_engine::Notification;

/// `HSHELL_WINDOWCREATED`
pub const HSHELL_WINDOWCREATED: u32 = 1;
/// `HSHELL_WINDOWDESTROYED`
pub const HSHELL_WINDOWDESTROYED: u32 = 2;
/// `HSHELL_WINDOWACTIVATED`
pub const HSHELL_WINDOWACTIVATED: u32 = 4;
/// `HSHELL_REDRAW`
pub const HSHELL_REDRAW: u32 = 6;
/// `HSHELL_RUDEAPPACTIVATED`, sent instead of `HSHELL_WINDOWACTIVATED` for
/// full-screen apps.
pub const HSHELL_RUDEAPPACTIVATED: u32 = 0x8004;

/// Map a shell hook code and its window to a [`Notification`].
pub fn notification_from_shell_code(code: u32, window: WindowId) -> Notification {
    match code {
        HSHELL_WINDOWCREATED => Notification::WindowCreated(window),
        HSHELL_WINDOWDESTROYED => Notification::WindowDestroyed(window),
        HSHELL_WINDOWACTIVATED | HSHELL_RUDEAPPACTIVATED => Notification::WindowActivated(window),
        HSHELL_REDRAW => Notification::Redraw(window),
        other => Notification::Other(other),
    }
}

#[cfg(windows)]
pub use imp::{install_shell_hook, ShellHookHandle};

#[cfg(windows)]
mod imp {
    use super::notification_from_shell_code;
    use crate::{post_quit, run_message_loop, Win32Error};
    use shelltile_engine::Notification;
    use std::cell::RefCell;
    use std::sync::mpsc;
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::WindowsAndMessaging::{
        CreateWindowExW, DefWindowProcW, DeregisterShellHookWindow, DestroyWindow,
        RegisterClassW, RegisterShellHookWindow, RegisterWindowMessageW, WINDOW_EX_STYLE,
        WINDOW_STYLE, WNDCLASSW,
    };

    struct HookContext {
        shell_message: u32,
        sender: mpsc::Sender<Notification>,
    }

    thread_local! {
        static HOOK_CONTEXT: RefCell<Option<HookContext>> = const { RefCell::new(None) };
    }

    fn wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    /// Keeps the shell hook alive. Dropping it deregisters the hook and
    /// stops the hook thread.
    pub struct ShellHookHandle {
        thread_id: u32,
        thread: Option<std::thread::JoinHandle<()>>,
    }

    impl Drop for ShellHookHandle {
        fn drop(&mut self) {
            post_quit(self.thread_id);
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
            tracing::debug!("Shell hook removed");
        }
    }

    /// Install the shell hook.
    ///
    /// Returns the handle and the receiving end of the notification channel.
    pub fn install_shell_hook(
    ) -> Result<(ShellHookHandle, mpsc::Receiver<Notification>), Win32Error> {
        let (event_tx, event_rx) = mpsc::channel();
        let (init_tx, init_rx) = mpsc::channel::<Result<u32, Win32Error>>();

        let thread = std::thread::Builder::new()
            .name("shell-hook".to_string())
            .spawn(move || match create_hook_window(event_tx) {
                Ok(hwnd) => {
                    let _ = init_tx.send(Ok(unsafe { GetCurrentThreadId() }));
                    run_message_loop(|_| {});
                    unsafe {
                        let _ = DeregisterShellHookWindow(hwnd);
                        let _ = DestroyWindow(hwnd);
                    }
                    HOOK_CONTEXT.with(|ctx| ctx.borrow_mut().take());
                }
                Err(e) => {
                    let _ = init_tx.send(Err(e));
                }
            })
            .map_err(|e| Win32Error::ThreadSpawnFailed {
                name: "shell-hook",
                reason: e.to_string(),
            })?;

        let thread_id = init_rx.recv().map_err(|_| {
            Win32Error::HookInstallFailed("Shell hook thread exited during setup".to_string())
        })??;

        tracing::debug!("Shell hook installed on thread {}", thread_id);
        Ok((
            ShellHookHandle {
                thread_id,
                thread: Some(thread),
            },
            event_rx,
        ))
    }

    fn create_hook_window(sender: mpsc::Sender<Notification>) -> Result<HWND, Win32Error> {
        let class_name = wide("ShellTileShellHook");
        let hook_message = wide("SHELLHOOK");

        unsafe {
            let instance = GetModuleHandleW(None)
                .map_err(|e| Win32Error::HookInstallFailed(format!("GetModuleHandleW: {e}")))?;

            let wc = WNDCLASSW {
                lpfnWndProc: Some(shell_hook_window_proc),
                hInstance: instance.into(),
                lpszClassName: PCWSTR(class_name.as_ptr()),
                ..Default::default()
            };
            RegisterClassW(&wc);

            // Never shown: a hidden top-level window still receives shell broadcasts.
            let hwnd = CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                PCWSTR(class_name.as_ptr()),
                PCWSTR(class_name.as_ptr()),
                WINDOW_STYLE::default(),
                0,
                0,
                0,
                0,
                None,
                None,
                Some(instance.into()),
                None,
            )
            .map_err(|e| Win32Error::HookInstallFailed(format!("CreateWindowExW: {e}")))?;

            let shell_message = RegisterWindowMessageW(PCWSTR(hook_message.as_ptr()));
            if shell_message == 0 {
                let _ = DestroyWindow(hwnd);
                return Err(Win32Error::HookInstallFailed(
                    "RegisterWindowMessageW(SHELLHOOK) failed".to_string(),
                ));
            }

            HOOK_CONTEXT.with(|ctx| {
                *ctx.borrow_mut() = Some(HookContext {
                    shell_message,
                    sender,
                })
            });

            if !RegisterShellHookWindow(hwnd).as_bool() {
                HOOK_CONTEXT.with(|ctx| ctx.borrow_mut().take());
                let _ = DestroyWindow(hwnd);
                return Err(Win32Error::HookInstallFailed(
                    "RegisterShellHookWindow failed".to_string(),
                ));
            }

            Ok(hwnd)
        }
    }

    /// Window procedure for the hook window.
    ///
    /// Wrapped with catch_unwind so a panic never unwinds into the OS.
    unsafe extern "system" fn shell_hook_window_proc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        let handled = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            forward_shell_message(msg, wparam, lparam)
        }));

        match handled {
            Ok(true) => LRESULT(0),
            Ok(false) => DefWindowProcW(hwnd, msg, wparam, lparam),
            Err(e) => {
                tracing::error!("Panic in shell_hook_window_proc: {:?}", e);
                DefWindowProcW(hwnd, msg, wparam, lparam)
            }
        }
    }

    fn forward_shell_message(msg: u32, wparam: WPARAM, lparam: LPARAM) -> bool {
        HOOK_CONTEXT.with(|ctx| {
            let ctx = ctx.borrow();
            match ctx.as_ref() {
                Some(ctx) if msg == ctx.shell_message => {
                    let notification =
                        notification_from_shell_code(wparam.0 as u32, lparam.0 as usize as u64);
                    if ctx.sender.send(notification).is_err() {
                        tracing::debug!("Shell notification receiver dropped");
                    }
                    true
                }
                _ => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_codes() {
        assert_eq!(
            notification_from_shell_code(HSHELL_WINDOWCREATED, 0x10),
            Notification::WindowCreated(0x10)
        );
        assert_eq!(
            notification_from_shell_code(HSHELL_WINDOWDESTROYED, 0x10),
            Notification::WindowDestroyed(0x10)
        );
        assert_eq!(
            notification_from_shell_code(HSHELL_REDRAW, 0x10),
            Notification::Redraw(0x10)
        );
    }

    #[test]
    fn test_rude_activation_is_activation() {
        assert_eq!(
            notification_from_shell_code(HSHELL_WINDOWACTIVATED, 7),
            Notification::WindowActivated(7)
        );
        assert_eq!(
            notification_from_shell_code(HSHELL_RUDEAPPACTIVATED, 7),
            Notification::WindowActivated(7)
        );
    }

    #[test]
    fn test_other_codes_do_not_retile() {
        // HSHELL_GETMINRECT, HSHELL_LANGUAGE, HSHELL_FLASH
        for code in [5, 8, 0x8006] {
            let notification = notification_from_shell_code(code, 1);
            assert_eq!(notification, Notification::Other(code));
            assert!(!notification.triggers_retile());
        }
    }
}

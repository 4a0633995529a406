//! Global hotkeys.
//!
//! Hotkey strings look like `"Alt+Shift+1"`: any number of modifiers
//! (`Win`, `Ctrl`, `Alt`, `Shift`) followed by exactly one key (`A`-`Z`,
//! `0`-`9`, `F1`-`F12`). Matching is case-insensitive.

use thiserror::Error;

/// `MOD_ALT`
pub const MOD_ALT: u32 = 0x0001;
/// `MOD_CONTROL`
pub const MOD_CONTROL: u32 = 0x0002;
/// `MOD_SHIFT`
pub const MOD_SHIFT: u32 = 0x0004;
/// `MOD_WIN`
pub const MOD_WIN: u32 = 0x0008;
/// `MOD_NOREPEAT`: holding the chord down fires once.
pub const MOD_NOREPEAT: u32 = 0x4000;

const VK_F1: u32 = 0x70;

/// Identifier passed to `RegisterHotKey` and reported back on `WM_HOTKEY`.
pub type HotkeyId = i32;

/// Errors from parsing a hotkey string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HotkeyParseError {
    #[error("Empty hotkey string")]
    Empty,

    #[error("Unknown key '{0}'")]
    UnknownKey(String),

    #[error("Hotkey '{0}' has no key, only modifiers")]
    MissingKey(String),

    #[error("Hotkey '{0}' has more than one key")]
    MultipleKeys(String),
}

/// A hotkey to register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    pub id: HotkeyId,
    /// `MOD_*` bits.
    pub modifiers: u32,
    /// Virtual-key code.
    pub vk: u32,
}

impl Hotkey {
    pub fn new(id: HotkeyId, modifiers: u32, vk: u32) -> Self {
        Self { id, modifiers, vk }
    }
}

/// A registered hotkey was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyEvent {
    pub id: HotkeyId,
}

fn modifier_bit(token: &str) -> Option<u32> {
    match token {
        "win" | "super" => Some(MOD_WIN),
        "ctrl" | "control" => Some(MOD_CONTROL),
        "alt" => Some(MOD_ALT),
        "shift" => Some(MOD_SHIFT),
        _ => None,
    }
}

fn virtual_key(token: &str) -> Option<u32> {
    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return match c {
            'a'..='z' => Some(c.to_ascii_uppercase() as u32),
            '0'..='9' => Some(c as u32),
            _ => None,
        };
    }

    let n: u32 = token.strip_prefix('f')?.parse().ok()?;
    (1..=12).contains(&n).then(|| VK_F1 + n - 1)
}

/// Parse a hotkey string into `(modifiers, virtual_key)`.
pub fn parse_hotkey_string(s: &str) -> Result<(u32, u32), HotkeyParseError> {
    if s.trim().is_empty() {
        return Err(HotkeyParseError::Empty);
    }

    let mut modifiers = 0;
    let mut key = None;
    for token in s.split('+').map(|t| t.trim().to_ascii_lowercase()) {
        if let Some(bit) = modifier_bit(&token) {
            modifiers |= bit;
            continue;
        }
        let vk = virtual_key(&token).ok_or_else(|| HotkeyParseError::UnknownKey(token.clone()))?;
        if key.replace(vk).is_some() {
            return Err(HotkeyParseError::MultipleKeys(s.to_string()));
        }
    }

    let vk = key.ok_or_else(|| HotkeyParseError::MissingKey(s.to_string()))?;
    Ok((modifiers, vk))
}

#[cfg(windows)]
pub use imp::{register_hotkeys, HotkeyHandle};

#[cfg(windows)]
mod imp {
    use super::{Hotkey, HotkeyEvent, HotkeyId, MOD_NOREPEAT};
    use crate::{post_quit, run_message_loop, Win32Error};
    use std::sync::mpsc;
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS,
    };
    use windows::Win32::UI::WindowsAndMessaging::WM_HOTKEY;

    /// Keeps hotkeys registered. Dropping it unregisters them all.
    pub struct HotkeyHandle {
        thread_id: u32,
        registered: usize,
        thread: Option<std::thread::JoinHandle<()>>,
    }

    impl HotkeyHandle {
        /// How many of the requested hotkeys were registered.
        pub fn registered_count(&self) -> usize {
            self.registered
        }
    }

    impl Drop for HotkeyHandle {
        fn drop(&mut self) {
            post_quit(self.thread_id);
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
            tracing::debug!("Hotkeys unregistered");
        }
    }

    /// Register global hotkeys on a dedicated thread.
    ///
    /// Hotkeys already taken by another program are skipped with a warning.
    /// Fails if none could be registered.
    pub fn register_hotkeys(
        hotkeys: Vec<Hotkey>,
    ) -> Result<(HotkeyHandle, mpsc::Receiver<HotkeyEvent>), Win32Error> {
        let (event_tx, event_rx) = mpsc::channel();
        let (init_tx, init_rx) = mpsc::channel::<(u32, usize)>();

        let thread = std::thread::Builder::new()
            .name("hotkeys".to_string())
            .spawn(move || {
                // Hotkeys without a window post WM_HOTKEY to this thread's queue.
                let registered: Vec<HotkeyId> = hotkeys
                    .iter()
                    .filter_map(|hotkey| {
                        let modifiers = HOT_KEY_MODIFIERS(hotkey.modifiers | MOD_NOREPEAT);
                        match unsafe { RegisterHotKey(None, hotkey.id, modifiers, hotkey.vk) } {
                            Ok(()) => Some(hotkey.id),
                            Err(e) => {
                                tracing::warn!("Failed to register hotkey {}: {}", hotkey.id, e);
                                None
                            }
                        }
                    })
                    .collect();

                let _ = init_tx.send((unsafe { GetCurrentThreadId() }, registered.len()));
                if registered.is_empty() {
                    return;
                }

                run_message_loop(|msg| {
                    if msg.message == WM_HOTKEY {
                        let _ = event_tx.send(HotkeyEvent {
                            id: msg.wParam.0 as HotkeyId,
                        });
                    }
                });

                for id in registered {
                    let _ = unsafe { UnregisterHotKey(None, id) };
                }
            })
            .map_err(|e| Win32Error::ThreadSpawnFailed {
                name: "hotkeys",
                reason: e.to_string(),
            })?;

        let (thread_id, registered) = init_rx.recv().map_err(|_| {
            Win32Error::HotkeyRegistrationFailed("Hotkey thread exited during setup".to_string())
        })?;

        if registered == 0 {
            let _ = thread.join();
            return Err(Win32Error::HotkeyRegistrationFailed(
                "No hotkey could be registered".to_string(),
            ));
        }

        Ok((
            HotkeyHandle {
                thread_id,
                registered,
                thread: Some(thread),
            },
            event_rx,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_layout_hotkeys() {
        assert_eq!(parse_hotkey_string("Alt+Shift+1"), Ok((MOD_ALT | MOD_SHIFT, 0x31)));
        assert_eq!(parse_hotkey_string("Alt+Shift+4"), Ok((MOD_ALT | MOD_SHIFT, 0x34)));
        assert_eq!(parse_hotkey_string("Alt+Shift+T"), Ok((MOD_ALT | MOD_SHIFT, 0x54)));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            parse_hotkey_string("ctrl+ALT+r"),
            parse_hotkey_string("Ctrl+Alt+R")
        );
        assert_eq!(parse_hotkey_string(" Win + g "), Ok((MOD_WIN, 0x47)));
    }

    #[test]
    fn test_parse_function_keys() {
        assert_eq!(parse_hotkey_string("F1"), Ok((0, 0x70)));
        assert_eq!(parse_hotkey_string("Shift+F12"), Ok((MOD_SHIFT, 0x7B)));
        assert_eq!(
            parse_hotkey_string("F13"),
            Err(HotkeyParseError::UnknownKey("f13".to_string()))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_hotkey_string(""), Err(HotkeyParseError::Empty));
        assert_eq!(
            parse_hotkey_string("Alt+Shift"),
            Err(HotkeyParseError::MissingKey("Alt+Shift".to_string()))
        );
        assert_eq!(
            parse_hotkey_string("Alt+A+B"),
            Err(HotkeyParseError::MultipleKeys("Alt+A+B".to_string()))
        );
        assert!(matches!(
            parse_hotkey_string("Hyper+X"),
            Err(HotkeyParseError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_hotkey_new() {
        let hotkey = Hotkey::new(3, MOD_ALT, 0x41);
        assert_eq!(hotkey.id, 3);
        assert_eq!(hotkey.modifiers, MOD_ALT);
        assert_eq!(hotkey.vk, 0x41);
    }
}

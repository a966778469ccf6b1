use crate::KeyEvent;
use std::mem;
use tracing::warn;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS, KEYEVENTF_KEYUP,
    VIRTUAL_KEY,
};

fn keyboard_input(event: &KeyEvent) -> INPUT {
    let flags = if event.up {
        KEYEVENTF_KEYUP
    } else {
        KEYBD_EVENT_FLAGS(0)
    };
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(event.key.0),
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

/// Inject the events as one batch so nothing interleaves with them.
pub(crate) fn send_key_events(events: &[KeyEvent]) {
    if events.is_empty() {
        return;
    }
    let inputs: Vec<INPUT> = events.iter().map(keyboard_input).collect();
    let sent = unsafe { SendInput(&inputs, mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        warn!(
            sent,
            expected = inputs.len(),
            "SendInput was partially blocked: {}",
            windows::core::Error::from_win32()
        );
    }
}

use super::input::send_key_events;
use super::remote;
use super::types::{from_hwnd, send_message, to_hwnd};
use crate::list_view::LVM_GETITEMCOUNT;
use crate::platforms::AutomationEngine;
use crate::{process, KeyEvent, RobotError, WindowRef};
use tracing::{debug, warn};
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    BringWindowToTop, EnumChildWindows, EnumWindows, GetClassNameW, GetWindowTextW,
    GetWindowThreadProcessId, IsIconic, IsWindowVisible, PostMessageW, SetForegroundWindow,
    ShowWindow, SW_RESTORE,
};

const WM_SETFOCUS: u32 = 0x0007;
const WM_GETTEXT: u32 = 0x000D;
const WM_SYSKEYDOWN: u32 = 0x0104;
const BM_CLICK: u32 = 0x00F5;

/// Context-code bit of a key message: the Alt key is held.
const ALT_HELD: isize = 1 << 29;

const CLASS_CAPACITY: usize = 256;
const TEXT_CAPACITY: usize = 512;

unsafe extern "system" fn collect_hwnd(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let handles = &mut *(lparam.0 as *mut Vec<isize>);
    handles.push(from_hwnd(hwnd));
    BOOL(1)
}

fn class_name(hwnd: HWND) -> String {
    let mut buf = [0u16; CLASS_CAPACITY];
    let len = unsafe { GetClassNameW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..len.max(0) as usize])
}

fn caption(hwnd: HWND) -> String {
    let mut buf = [0u16; TEXT_CAPACITY];
    let len = unsafe { GetWindowTextW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..len.max(0) as usize])
}

/// Control text straight from the control. `GetWindowTextW` does not ask
/// controls of other processes for it.
fn control_text(hwnd: HWND) -> String {
    let mut buf = [0u16; TEXT_CAPACITY];
    let len = send_message(
        hwnd,
        WM_GETTEXT,
        WPARAM(buf.len()),
        LPARAM(buf.as_mut_ptr() as isize),
    )
    .unwrap_or(0);
    let len = (len.max(0) as usize).min(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

fn describe(raw: isize, top_level: bool) -> WindowRef {
    let hwnd = to_hwnd(raw);
    let mut pid = 0u32;
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
    WindowRef {
        hwnd: raw,
        class: class_name(hwnd),
        text: if top_level { caption(hwnd) } else { control_text(hwnd) },
        visible: unsafe { IsWindowVisible(hwnd) }.as_bool(),
        pid,
    }
}

/// Desktop automation through plain Win32 window messages.
#[derive(Debug, Default)]
pub struct WindowsEngine;

impl WindowsEngine {
    pub fn new() -> Self {
        Self
    }
}

impl AutomationEngine for WindowsEngine {
    fn top_level_windows(&self) -> Vec<WindowRef> {
        let mut handles: Vec<isize> = Vec::new();
        unsafe {
            let _ = EnumWindows(
                Some(collect_hwnd),
                LPARAM(&mut handles as *mut Vec<isize> as isize),
            );
        }
        handles.into_iter().map(|h| describe(h, true)).collect()
    }

    fn child_windows(&self, parent: &WindowRef) -> Vec<WindowRef> {
        let mut handles: Vec<isize> = Vec::new();
        unsafe {
            let _ = EnumChildWindows(
                to_hwnd(parent.hwnd),
                Some(collect_hwnd),
                LPARAM(&mut handles as *mut Vec<isize> as isize),
            );
        }
        handles.into_iter().map(|h| describe(h, false)).collect()
    }

    fn bring_to_front(&self, window: &WindowRef) {
        let hwnd = to_hwnd(window.hwnd);
        unsafe {
            if IsIconic(hwnd).as_bool() {
                let _ = ShowWindow(hwnd, SW_RESTORE);
            }
            let _ = BringWindowToTop(hwnd);
            if !SetForegroundWindow(hwnd).as_bool() {
                debug!(hwnd = window.hwnd, "SetForegroundWindow refused");
            }
        }
    }

    fn set_focus(&self, window: &WindowRef) {
        if send_message(to_hwnd(window.hwnd), WM_SETFOCUS, WPARAM(0), LPARAM(0)).is_none() {
            debug!(hwnd = window.hwnd, "focus message not answered");
        }
    }

    fn press_button(&self, button: &WindowRef) {
        if send_message(to_hwnd(button.hwnd), BM_CLICK, WPARAM(0), LPARAM(0)).is_none() {
            warn!(
                hwnd = button.hwnd,
                button = %button.text,
                "click not answered, target may be hung"
            );
        }
    }

    fn post_button_click(&self, button: &WindowRef) {
        let posted =
            unsafe { PostMessageW(to_hwnd(button.hwnd), BM_CLICK, WPARAM(0), LPARAM(0)) };
        if let Err(e) = posted {
            debug!(hwnd = button.hwnd, "posting click failed: {e}");
        }
    }

    fn post_close_chord(&self, window: &WindowRef) {
        let posted = unsafe {
            PostMessageW(
                to_hwnd(window.hwnd),
                WM_SYSKEYDOWN,
                WPARAM(b'X' as usize),
                LPARAM(ALT_HELD),
            )
        };
        if let Err(e) = posted {
            debug!(hwnd = window.hwnd, "posting Alt+X failed: {e}");
        }
    }

    fn send_keys(&self, events: &[KeyEvent]) {
        send_key_events(events);
    }

    fn list_view_item_count(&self, list_view: &WindowRef) -> usize {
        match send_message(to_hwnd(list_view.hwnd), LVM_GETITEMCOUNT, WPARAM(0), LPARAM(0)) {
            Some(count) => count.max(0) as usize,
            None => {
                debug!(hwnd = list_view.hwnd, "item count not answered");
                0
            }
        }
    }

    fn read_list_view_text(
        &self,
        list_view: &WindowRef,
        row: usize,
        col: usize,
    ) -> Result<String, RobotError> {
        remote::read_cell(to_hwnd(list_view.hwnd), list_view.pid, row, col)
    }

    fn find_process(&self, exe_name: &str) -> Option<u32> {
        process::find_process_by_exe(exe_name)
    }

    fn kill_process(&self, pid: u32) -> Result<(), RobotError> {
        process::kill_process(pid)
    }

    fn launch(&self, path: &str) -> Result<u32, RobotError> {
        process::launch(path)
    }
}

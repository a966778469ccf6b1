mod supervisor_tests;

use crate::client::{
    CONFIRM_BUTTON_CLASS, CONFIRM_BUTTON_LABEL, DIALOG_CLASS, LIST_VIEW_CLASS, LOGIN_CLASS,
    LOGIN_TITLE, MAIN_CLASS, OK_BUTTON, SYSTEM_DIALOG_TITLE, USERNAME_FIELD_CLASS,
};
use crate::config::{DEFAULT_CLIENT_PATH, DEFAULT_LISTEN_ADDR};
use crate::platforms::AutomationEngine;
use crate::{KeyCode, KeyEvent, RobotError, RobotIdentity, WindowRef};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub const USERNAME: &str = "ROBOT01";
pub const LOGIN_PASSWORD: &str = "12345678";
pub const USB_KEY_PASSWORD: &str = "abcdefgh";

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_test_writer()
        .try_init();
}

pub fn identity() -> RobotIdentity {
    RobotIdentity::new(
        USERNAME,
        LOGIN_PASSWORD,
        USB_KEY_PASSWORD,
        DEFAULT_CLIENT_PATH,
        DEFAULT_LISTEN_ADDR,
        "",
    )
    .unwrap()
}

const MAIN_HWND: isize = 0x100;
const LOG_VIEW_HWND: isize = 0x101;
const SESSION_VIEW_HWND: isize = 0x102;

/// How the simulated client answers the login confirm click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginScript {
    Success,
    /// An error message box with this text shows up.
    ErrorDialog(String),
    AlreadyLoggedIn,
    /// The dialog closes and an error row lands in the log.
    LogError { time: String, message: String },
    /// The dialog never closes.
    Hang,
    /// The client exits on confirm; the next attempt succeeds.
    CrashOnce,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DialogKind {
    Login,
    Notice(String),
}

#[derive(Debug, Clone)]
struct FakeDialog {
    frame: WindowRef,
    children: Vec<WindowRef>,
    kind: DialogKind,
}

/// Everything the simulated client knows, plus a record of what the robot
/// did to it.
#[derive(Debug)]
pub struct DesktopState {
    pub username: String,
    pub main_title: String,
    pub pid: u32,
    pub running: bool,
    pub listening: bool,
    pub listen_works: bool,
    pub logged_in: bool,
    /// Whether the login dialog opens prefilled and with visible key fields.
    pub usb_key_mode: bool,
    pub security_fields: usize,
    pub list_views: usize,
    pub login_script: LoginScript,
    /// Times a listener notice pops up instead of the login dialog.
    pub notices_on_open: usize,
    /// Times a freshly launched client dies right away.
    pub crashes_after_launch: usize,
    /// Newest first: (category, time, message).
    pub log_rows: Vec<[String; 3]>,

    pub key_events: Vec<KeyEvent>,
    pub chords: Vec<char>,
    pub typed: HashMap<isize, String>,
    pub pressed: Vec<String>,
    pub alt_x_posted: usize,
    pub launches: usize,
    pub kills: usize,
    pub remote_reads: usize,
    /// Cross-process reads fail, as with a list-view that stopped answering.
    pub fail_reads: bool,
    /// Wall-clock time a listener check takes.
    pub reach_delay: Duration,

    dialogs: Vec<FakeDialog>,
    focused: Option<isize>,
    ctrl_held: bool,
    next_hwnd: isize,
}

impl DesktopState {
    fn alloc_hwnd(&mut self) -> isize {
        self.next_hwnd += 1;
        self.next_hwnd
    }

    fn window(&self, hwnd: isize, class: &str, text: &str, visible: bool) -> WindowRef {
        WindowRef {
            hwnd,
            class: class.to_string(),
            text: text.to_string(),
            visible,
            pid: self.pid,
        }
    }

    fn main_window(&self) -> WindowRef {
        self.window(MAIN_HWND, MAIN_CLASS, &self.main_title, true)
    }

    pub fn show_notice(&mut self, title: &str, content: &str) {
        let frame_hwnd = self.alloc_hwnd();
        let text_hwnd = self.alloc_hwnd();
        let button_hwnd = self.alloc_hwnd();
        let dialog = FakeDialog {
            frame: self.window(frame_hwnd, DIALOG_CLASS, title, true),
            children: vec![
                self.window(text_hwnd, "Static", content, true),
                self.window(button_hwnd, "Button", OK_BUTTON, true),
            ],
            kind: DialogKind::Notice(content.to_string()),
        };
        self.dialogs.push(dialog);
    }

    pub fn show_system_notice(&mut self, content: &str) {
        self.show_notice(SYSTEM_DIALOG_TITLE, content);
    }

    pub fn open_login_dialog(&mut self) {
        let frame_hwnd = self.alloc_hwnd();
        let mut children = Vec::new();

        let edit_hwnd = self.alloc_hwnd();
        let prefilled = if self.usb_key_mode { self.username.clone() } else { String::new() };
        children.push(self.window(edit_hwnd, USERNAME_FIELD_CLASS, &prefilled, true));

        for _ in 0..self.security_fields {
            let hwnd = self.alloc_hwnd();
            children.push(self.window(hwnd, "ATL:0F4E8D20", "", self.usb_key_mode));
        }

        let button_hwnd = self.alloc_hwnd();
        children.push(self.window(button_hwnd, CONFIRM_BUTTON_CLASS, CONFIRM_BUTTON_LABEL, true));

        self.dialogs.push(FakeDialog {
            frame: self.window(frame_hwnd, LOGIN_CLASS, LOGIN_TITLE, true),
            children,
            kind: DialogKind::Login,
        });
    }

    pub fn login_dialog_open(&self) -> bool {
        self.dialogs.iter().any(|d| d.kind == DialogKind::Login)
    }

    pub fn notices(&self) -> Vec<String> {
        self.dialogs
            .iter()
            .filter_map(|d| match &d.kind {
                DialogKind::Notice(text) => Some(text.clone()),
                DialogKind::Login => None,
            })
            .collect()
    }

    /// Text typed into each security field, in dialog order.
    pub fn typed_passwords(&self) -> Vec<String> {
        let mut fields: Vec<(&isize, &String)> = self.typed.iter().collect();
        fields.sort();
        fields.into_iter().map(|(_, text)| text.clone()).collect()
    }

    fn close_login_dialog(&mut self) {
        self.dialogs.retain(|d| d.kind != DialogKind::Login);
    }

    fn push_log(&mut self, category: &str, time: &str, message: &str) {
        self.log_rows
            .insert(0, [category.to_string(), time.to_string(), message.to_string()]);
    }

    fn on_chord(&mut self, letter: char) {
        self.chords.push(letter);
        match letter {
            'I' => {
                if self.notices_on_open > 0 {
                    self.notices_on_open -= 1;
                    self.show_system_notice("HTTP服务已启动");
                } else if !self.login_dialog_open() {
                    self.open_login_dialog();
                }
            }
            'B' => {
                if self.listen_works {
                    self.listening = true;
                    self.show_system_notice("HTTP服务已启动");
                }
            }
            'E' => {
                self.listening = false;
                self.show_system_notice("停止HTTP");
            }
            'O' => {
                if self.logged_in {
                    self.show_system_notice("确定要签退用户吗?");
                }
            }
            _ => {}
        }
    }

    fn on_confirm_login(&mut self) {
        match self.login_script.clone() {
            LoginScript::Success => {
                self.close_login_dialog();
                self.logged_in = true;
                self.push_log("信息", "09:30:00", "用户登录成功");
            }
            LoginScript::ErrorDialog(text) => self.show_notice(SYSTEM_DIALOG_TITLE, &text),
            LoginScript::AlreadyLoggedIn => {
                self.close_login_dialog();
                self.show_system_notice("该用户已经登录");
            }
            LoginScript::LogError { time, message } => {
                self.close_login_dialog();
                self.push_log("错误", &time, &message);
            }
            LoginScript::Hang => {}
            LoginScript::CrashOnce => {
                self.login_script = LoginScript::Success;
                self.die();
            }
        }
    }

    fn die(&mut self) {
        self.running = false;
        self.listening = false;
        self.logged_in = false;
        self.dialogs.clear();
    }
}

/// In-memory stand-in for the client's desktop.
pub struct FakeDesktop {
    state: Mutex<DesktopState>,
}

impl FakeDesktop {
    /// A running client: main window up, not listening, nobody logged in.
    pub fn new() -> Arc<Self> {
        let identity = identity();
        Arc::new(Self {
            state: Mutex::new(DesktopState {
                username: identity.username().to_string(),
                main_title: identity.main_title().to_string(),
                pid: 4242,
                running: true,
                listening: false,
                listen_works: true,
                logged_in: false,
                usb_key_mode: true,
                security_fields: 2,
                list_views: 2,
                login_script: LoginScript::Success,
                notices_on_open: 0,
                crashes_after_launch: 0,
                log_rows: Vec::new(),
                key_events: Vec::new(),
                chords: Vec::new(),
                typed: HashMap::new(),
                pressed: Vec::new(),
                alt_x_posted: 0,
                launches: 0,
                kills: 0,
                remote_reads: 0,
                fail_reads: false,
                reach_delay: Duration::ZERO,
                dialogs: Vec::new(),
                focused: None,
                ctrl_held: false,
                next_hwnd: 0x1000,
            }),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, DesktopState> {
        self.state.lock().unwrap()
    }

    pub fn with(self: &Arc<Self>, f: impl FnOnce(&mut DesktopState)) -> Arc<Self> {
        f(&mut *self.state());
        self.clone()
    }

    pub fn engine(self: &Arc<Self>) -> Arc<dyn AutomationEngine> {
        self.clone()
    }
}

impl AutomationEngine for FakeDesktop {
    fn top_level_windows(&self) -> Vec<WindowRef> {
        let state = self.state();
        if !state.running {
            return Vec::new();
        }
        let mut windows = vec![state.main_window()];
        windows.extend(state.dialogs.iter().map(|d| d.frame.clone()));
        windows
    }

    fn child_windows(&self, parent: &WindowRef) -> Vec<WindowRef> {
        let state = self.state();
        if !state.running {
            return Vec::new();
        }
        if parent.hwnd == MAIN_HWND {
            return [LOG_VIEW_HWND, SESSION_VIEW_HWND]
                .iter()
                .take(state.list_views)
                .map(|&hwnd| state.window(hwnd, LIST_VIEW_CLASS, "", true))
                .collect();
        }
        state
            .dialogs
            .iter()
            .find(|d| d.frame.hwnd == parent.hwnd)
            .map(|d| d.children.clone())
            .unwrap_or_default()
    }

    fn bring_to_front(&self, _window: &WindowRef) {}

    fn set_focus(&self, window: &WindowRef) {
        self.state().focused = Some(window.hwnd);
    }

    fn press_button(&self, button: &WindowRef) {
        let mut state = self.state();
        let Some(index) = state
            .dialogs
            .iter()
            .position(|d| d.children.iter().any(|c| c.hwnd == button.hwnd))
        else {
            return;
        };
        let dialog = state.dialogs.remove(index);
        state.pressed.push(button.text.clone());
        if let DialogKind::Notice(text) = &dialog.kind {
            if text.contains("确定要签退用户") {
                state.logged_in = false;
            }
        }
    }

    fn post_button_click(&self, button: &WindowRef) {
        let mut state = self.state();
        state.pressed.push(button.text.clone());
        if button.class == CONFIRM_BUTTON_CLASS && state.login_dialog_open() {
            state.on_confirm_login();
        }
    }

    fn post_close_chord(&self, window: &WindowRef) {
        let mut state = self.state();
        state.alt_x_posted += 1;
        state.dialogs.retain(|d| d.frame.hwnd != window.hwnd);
    }

    fn send_keys(&self, events: &[KeyEvent]) {
        let mut state = self.state();
        for event in events {
            state.key_events.push(*event);
            if event.key == KeyCode::CONTROL {
                state.ctrl_held = !event.up;
                continue;
            }
            if event.up {
                continue;
            }
            let Some(c) = char::from_u32(event.key.0 as u32) else {
                continue;
            };
            if state.ctrl_held {
                state.on_chord(c);
            } else if let Some(field) = state.focused {
                state.typed.entry(field).or_default().push(c);
            }
        }
    }

    fn list_view_item_count(&self, list_view: &WindowRef) -> usize {
        let state = self.state();
        match list_view.hwnd {
            LOG_VIEW_HWND => state.log_rows.len(),
            SESSION_VIEW_HWND if state.logged_in => 1,
            _ => 0,
        }
    }

    fn read_list_view_text(
        &self,
        list_view: &WindowRef,
        row: usize,
        col: usize,
    ) -> Result<String, RobotError> {
        let mut state = self.state();
        state.remote_reads += 1;
        if state.fail_reads {
            return Err(RobotError::PlatformError("list-view did not answer".to_string()));
        }
        match list_view.hwnd {
            LOG_VIEW_HWND => Ok(state
                .log_rows
                .get(row)
                .and_then(|r| r.get(col))
                .cloned()
                .unwrap_or_default()),
            SESSION_VIEW_HWND if row == 0 && col == 0 => Ok(state.username.clone()),
            SESSION_VIEW_HWND => Ok(String::new()),
            _ => Err(RobotError::PlatformError("no such list view".to_string())),
        }
    }

    fn find_process(&self, _exe_name: &str) -> Option<u32> {
        let state = self.state();
        state.running.then_some(state.pid)
    }

    fn kill_process(&self, _pid: u32) -> Result<(), RobotError> {
        let mut state = self.state();
        state.kills += 1;
        state.die();
        Ok(())
    }

    fn launch(&self, _path: &str) -> Result<u32, RobotError> {
        let mut state = self.state();
        state.launches += 1;
        state.pid += 1;
        state.running = true;
        if state.crashes_after_launch > 0 {
            state.crashes_after_launch -= 1;
            state.die();
        }
        Ok(state.pid)
    }

    fn is_reachable(&self, _addr: &str) -> bool {
        let (reachable, delay) = {
            let state = self.state();
            (state.running && state.listening, state.reach_delay)
        };
        std::thread::sleep(delay);
        reachable
    }
}

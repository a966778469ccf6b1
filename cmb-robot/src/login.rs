//! The hardware-key login flow, as an explicit state machine.
//!
//! ```text
//! OpeningDialog -> ValidatingMode -> EnteringCredentials -> AwaitingResolution
//!       ^               |
//!       +-- listener ---+   (stale main window state, reopen)
//! ```
//!
//! Every state either advances or resolves the attempt with a
//! [`LoginOutcome`] or a [`RobotError`].

use crate::client::{
    already_logged_in_notice, crash_dialogs, listener_notice, TargetClient, CONFIRM_BUTTON_CLASS,
    CONFIRM_BUTTON_LABEL, DIALOG_CLASS, LOG_LIST_VIEW, OK_BUTTON, POLL_ATTEMPTS, POLL_INTERVAL,
    SECURITY_CONTROL_PREFIX, USERNAME_FIELD_CLASS,
};
use crate::{DialogMatch, KeyCode, RobotError, WindowFilter, WindowRef};
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Pause after the dialog appears and after each password field.
pub const FORM_SETTLE: Duration = Duration::from_secs(2);

/// How long the session list-view may take to show the user.
pub const RESULT_ATTEMPTS: usize = 120;

/// Reopening the dialog because of a listener notice is bounded.
pub const MAX_DIALOG_REOPENS: usize = 5;

/// Log rows with this category mean the login was rejected.
pub const LOG_ERROR: &str = "错误";
pub const LOG_INFO: &str = "信息";

const LOG_TIME_COLUMN: usize = 1;
const LOG_MESSAGE_COLUMN: usize = 2;

/// Outcome named by an error dialog raised during login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogVerdict {
    OpenUsbKeyFailure,
    WrongUsbKeyPassword,
    WrongLoginPassword,
    EmptyUserName,
    NetworkError,
}

impl DialogVerdict {
    pub fn into_error(self) -> RobotError {
        match self {
            DialogVerdict::OpenUsbKeyFailure => RobotError::OpenUsbKeyFailure,
            DialogVerdict::WrongUsbKeyPassword => RobotError::WrongUsbKeyPassword,
            DialogVerdict::WrongLoginPassword => RobotError::WrongLoginPassword,
            DialogVerdict::EmptyUserName => RobotError::EmptyUserNameWhileLogin,
            DialogVerdict::NetworkError => RobotError::NetworkError,
        }
    }
}

/// Dialog text fragment to outcome, checked in this order on every poll.
pub const ERROR_DIALOGS: &[(&str, DialogVerdict)] = &[
    ("打开移动证书失败", DialogVerdict::OpenUsbKeyFailure),
    ("证书密码错", DialogVerdict::WrongUsbKeyPassword),
    ("登录密码错", DialogVerdict::WrongLoginPassword),
    ("用户登录名不能为空", DialogVerdict::EmptyUserName),
    ("通讯故障", DialogVerdict::NetworkError),
    ("取字段定义表文件失败", DialogVerdict::NetworkError),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The session list-view shows the user.
    LoggedIn,
    /// The client reported an existing session for the user.
    AlreadyLoggedIn,
}

#[derive(Clone, PartialEq, Eq)]
pub enum LoginState {
    OpeningDialog,
    ValidatingMode(WindowRef),
    EnteringCredentials(WindowRef),
    AwaitingResolution { dialog: WindowRef, log_rows: usize },
}

impl fmt::Debug for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginState::OpeningDialog => write!(f, "OpeningDialog"),
            LoginState::ValidatingMode(d) => write!(f, "ValidatingMode({:#x})", d.hwnd),
            LoginState::EnteringCredentials(d) => write!(f, "EnteringCredentials({:#x})", d.hwnd),
            LoginState::AwaitingResolution { dialog, log_rows } => {
                write!(f, "AwaitingResolution({:#x}, rows={log_rows})", dialog.hwnd)
            }
        }
    }
}

enum Opening {
    Opened(WindowRef),
    /// A listener notice was up; it has been dismissed.
    Interrupted,
}

/// Drives one login attempt against an already focused main window.
pub struct LoginStateMachine<'a> {
    client: &'a TargetClient,
    main: WindowRef,
}

impl<'a> LoginStateMachine<'a> {
    pub fn new(client: &'a TargetClient, main: WindowRef) -> Self {
        Self { client, main }
    }

    pub async fn run(&self) -> Result<LoginOutcome, RobotError> {
        info!(username = self.client.username(), "starting login");

        let mut state = LoginState::OpeningDialog;
        let mut reopens = 0;
        loop {
            debug!(username = self.client.username(), ?state, "login state");
            state = match state {
                LoginState::OpeningDialog => match self.open_dialog().await? {
                    Opening::Opened(dialog) => LoginState::ValidatingMode(dialog),
                    Opening::Interrupted => {
                        reopens += 1;
                        if reopens > MAX_DIALOG_REOPENS {
                            warn!(
                                username = self.client.username(),
                                reopens,
                                "login dialog kept getting interrupted"
                            );
                            return Err(RobotError::LoginWindowNotFound);
                        }
                        LoginState::OpeningDialog
                    }
                },
                LoginState::ValidatingMode(dialog) => {
                    self.validate_mode(&dialog).await?;
                    LoginState::EnteringCredentials(dialog)
                }
                LoginState::EnteringCredentials(dialog) => {
                    let log_rows = self.enter_credentials(&dialog).await?;
                    LoginState::AwaitingResolution { dialog, log_rows }
                }
                LoginState::AwaitingResolution { log_rows, .. } => {
                    return self.await_resolution(log_rows).await;
                }
            };
        }
    }

    async fn open_dialog(&self) -> Result<Opening, RobotError> {
        self.close_stale_dialogs().await;

        self.client.locator().bring_to_front(&self.main);
        self.client.input().chord(b'I').await;

        for _ in 0..POLL_ATTEMPTS {
            if self.client.dismiss(&self.main, &listener_notice()) {
                debug!(
                    username = self.client.username(),
                    "listener notice interrupted login, reopening"
                );
                sleep(FORM_SETTLE).await;
                return Ok(Opening::Interrupted);
            }

            debug!(username = self.client.username(), "looking for login dialog");
            if let Some(dialog) = self.client.login_dialog() {
                debug!(username = self.client.username(), hwnd = dialog.hwnd, "found login dialog");
                sleep(FORM_SETTLE).await;
                return Ok(Opening::Opened(dialog));
            }
            sleep(POLL_INTERVAL).await;
        }

        Err(RobotError::LoginWindowNotFound)
    }

    async fn close_stale_dialogs(&self) {
        for _ in 0..POLL_ATTEMPTS {
            let Some(stale) = self.client.login_dialog() else {
                return;
            };
            debug!(
                username = self.client.username(),
                hwnd = stale.hwnd,
                "closing stale login dialog"
            );
            self.client.engine().post_close_chord(&stale);
            sleep(FORM_SETTLE).await;
        }
    }

    async fn validate_mode(&self, dialog: &WindowRef) -> Result<(), RobotError> {
        for attempt in 1..=POLL_ATTEMPTS {
            debug!(username = self.client.username(), "validating login dialog");
            if self.is_usb_key_mode(dialog) {
                return Ok(());
            }

            for crash in crash_dialogs() {
                if self.client.dismiss(&self.main, &crash) {
                    error!(
                        username = self.client.username(),
                        title = ?crash.title,
                        "client crash dialog found"
                    );
                    return Err(RobotError::CrashWindow);
                }
            }

            debug!(
                username = self.client.username(),
                attempt,
                "login dialog not ready, is the usb key plugged in?"
            );
            sleep(POLL_INTERVAL).await;
        }

        Err(RobotError::LoginWindowNotCorrect)
    }

    /// Username prefilled and every security control visible.
    fn is_usb_key_mode(&self, dialog: &WindowRef) -> bool {
        let children = self.client.engine().child_windows(dialog);

        let username_filled = children
            .iter()
            .any(|c| c.class == USERNAME_FIELD_CLASS && c.text == self.client.username());
        if !username_filled {
            debug!(
                username = self.client.username(),
                hwnd = dialog.hwnd,
                "username field does not match"
            );
            return false;
        }

        let security = WindowFilter::class_prefix(SECURITY_CONTROL_PREFIX);
        let total = children.iter().filter(|c| security.matches(c)).count();
        let visible = children
            .iter()
            .filter(|c| security.matches(c) && c.visible)
            .count();
        if total != visible {
            debug!(
                username = self.client.username(),
                hwnd = dialog.hwnd,
                total,
                visible,
                "password fields not all visible"
            );
            return false;
        }

        true
    }

    /// Types both passwords and confirms. Returns the log row count seen
    /// before confirming.
    async fn enter_credentials(&self, dialog: &WindowRef) -> Result<usize, RobotError> {
        debug!(username = self.client.username(), "entering passwords");
        let fields = self
            .client
            .locator()
            .find_descendants(dialog, WindowFilter::class_prefix(SECURITY_CONTROL_PREFIX))
            .to_vec();
        if fields.len() != 2 {
            return Err(RobotError::BadPasswordBoxCount);
        }

        let identity = self.client.identity();
        let passwords = [identity.usb_key_password(), identity.login_password()];
        for (field, password) in fields.iter().zip(passwords) {
            self.client.engine().set_focus(field);
            for c in password.chars() {
                // Focus can be stolen between characters.
                self.client.locator().bring_to_front(dialog);
                if let Some(key) = KeyCode::from_char(c) {
                    self.client.input().tap(&[key]).await;
                }
            }
            sleep(FORM_SETTLE).await;
        }
        sleep(FORM_SETTLE).await;

        let log_rows = self
            .log_view()
            .map(|lv| self.client.reader().row_count(&lv))
            .unwrap_or(0);

        debug!(username = self.client.username(), log_rows, "confirming login");
        self.confirm(dialog)?;
        Ok(log_rows)
    }

    fn confirm(&self, dialog: &WindowRef) -> Result<(), RobotError> {
        let filter =
            WindowFilter::class(CONFIRM_BUTTON_CLASS).and(WindowFilter::text(CONFIRM_BUTTON_LABEL));
        let button = self
            .client
            .locator()
            .find_descendants(dialog, filter)
            .first()
            .ok_or(RobotError::ConfirmLoginFailure)?;

        self.client.locator().bring_to_front(dialog);
        self.client.engine().post_button_click(&button);
        Ok(())
    }

    async fn await_resolution(&self, log_rows: usize) -> Result<LoginOutcome, RobotError> {
        let mut dismissed = false;
        for _ in 0..POLL_ATTEMPTS {
            for (needle, verdict) in ERROR_DIALOGS {
                let dialog = DialogMatch::new(DIALOG_CLASS).button(OK_BUTTON).content(*needle);
                if self.client.dismiss(&self.main, &dialog) {
                    warn!(
                        username = self.client.username(),
                        text = *needle,
                        "login rejected by dialog"
                    );
                    return Err(verdict.into_error());
                }
            }

            match self.client.login_dialog() {
                None => {
                    dismissed = true;
                    break;
                }
                Some(open) => {
                    debug!(username = self.client.username(), hwnd = open.hwnd, "logging in")
                }
            }
            sleep(POLL_INTERVAL).await;
        }
        if !dismissed {
            return Err(RobotError::LoginFormDidNotDismiss);
        }

        sleep(FORM_SETTLE).await;

        if self.client.dismiss(&self.main, &already_logged_in_notice()) {
            debug!(username = self.client.username(), "user already logged in");
            return Ok(LoginOutcome::AlreadyLoggedIn);
        }

        let log_view = self.log_view();
        for _ in 0..RESULT_ATTEMPTS {
            if !self.client.is_running().await {
                warn!(username = self.client.username(), "client exited while logging in");
                return Err(RobotError::ProcessNotAlive);
            }

            if let Some(lv) = &log_view {
                self.check_log(lv, log_rows)?;
            }

            if self.client.is_logged_in() {
                info!(username = self.client.username(), "logged in");
                return Ok(LoginOutcome::LoggedIn);
            }

            debug!(
                username = self.client.username(),
                "waiting for the session list to show the user"
            );
            sleep(POLL_INTERVAL).await;
        }

        Err(RobotError::LoginTimeout)
    }

    /// Inspect the newest log row once the log has grown.
    fn check_log(&self, log_view: &WindowRef, rows_before: usize) -> Result<(), RobotError> {
        let reader = self.client.reader();
        if reader.row_count(log_view) <= rows_before {
            return Ok(());
        }

        let category = reader.cell_text(log_view, 0, 0);
        if category != LOG_ERROR && category != LOG_INFO {
            return Ok(());
        }
        let message = reader.cell_text(log_view, 0, LOG_MESSAGE_COLUMN);
        let time = reader.cell_text(log_view, 0, LOG_TIME_COLUMN);
        debug!(username = self.client.username(), %category, %time, "{message}");

        if category == LOG_ERROR {
            return Err(RobotError::LoginFailure { message, time });
        }
        Ok(())
    }

    fn log_view(&self) -> Option<WindowRef> {
        self.client.list_views(&self.main).into_iter().nth(LOG_LIST_VIEW)
    }
}

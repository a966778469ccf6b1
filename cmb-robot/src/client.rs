//! What the robot knows about the supervised client: its window taxonomy,
//! its dialog vocabulary, and how to observe its state.

use crate::config::RobotIdentity;
use crate::input::InputSynthesizer;
use crate::list_view::ListViewReader;
use crate::locator::WindowLocator;
use crate::platforms::AutomationEngine;
use crate::{DialogMatch, RobotError, WindowFilter, WindowRef};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tokio::time::sleep;
use tracing::{debug, error};

pub const MAIN_CLASS: &str = "TMainFrm";
pub const LOGIN_CLASS: &str = "TOnlineLoginFrm";
pub const LOGIN_TITLE: &str = "联机登录 (110100)";
pub const DIALOG_CLASS: &str = "#32770";
pub const SYSTEM_DIALOG_TITLE: &str = "招商银行企业银行直联系统";
pub const OK_BUTTON: &str = "确定";
pub const LIST_VIEW_CLASS: &str = "TFBListView";
pub const SECURITY_CONTROL_PREFIX: &str = "ATL:";
pub const USERNAME_FIELD_CLASS: &str = "Edit";
pub const CONFIRM_BUTTON_CLASS: &str = "TFBSpeedButton";
pub const CONFIRM_BUTTON_LABEL: &str = "登录[&L]";

/// List-views of the main window, in enumeration order.
pub const LOG_LIST_VIEW: usize = 0;
pub const SESSION_LIST_VIEW: usize = 1;

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const POLL_ATTEMPTS: usize = 30;

/// Notice shown after the HTTP listener starts.
pub fn listener_started_notice() -> DialogMatch {
    system_notice("HTTP服务已启动")
}

/// Notice shown after the HTTP listener stops.
pub fn listener_stopped_notice() -> DialogMatch {
    system_notice("停止HTTP")
}

/// Any listener notice; its presence means the main window state is stale.
pub fn listener_notice() -> DialogMatch {
    system_notice("HTTP")
}

pub fn logout_confirmation() -> DialogMatch {
    system_notice("确定要签退用户")
}

pub fn already_logged_in_notice() -> DialogMatch {
    system_notice("已经登录")
}

fn system_notice(content: &str) -> DialogMatch {
    DialogMatch::new(DIALOG_CLASS)
        .title(SYSTEM_DIALOG_TITLE)
        .button(OK_BUTTON)
        .content(content)
}

/// Host-toolkit crash dialogs, matched by caption alone.
pub fn crash_dialogs() -> [DialogMatch; 2] {
    [
        DialogMatch::new(DIALOG_CLASS)
            .title("Microsoft Visual C++ Runtime Library")
            .button(OK_BUTTON),
        DialogMatch::new(DIALOG_CLASS)
            .title("Abnormal program termination")
            .button(OK_BUTTON),
    ]
}

/// Observation and basic control of one installed client.
#[derive(Clone)]
pub struct TargetClient {
    engine: Arc<dyn AutomationEngine>,
    locator: WindowLocator,
    reader: ListViewReader,
    input: InputSynthesizer,
    identity: RobotIdentity,
}

impl TargetClient {
    pub fn new(engine: Arc<dyn AutomationEngine>, identity: RobotIdentity) -> Self {
        Self {
            locator: WindowLocator::new(engine.clone()),
            reader: ListViewReader::new(engine.clone()),
            input: InputSynthesizer::new(engine.clone()),
            engine,
            identity,
        }
    }

    pub fn engine(&self) -> &Arc<dyn AutomationEngine> {
        &self.engine
    }

    pub fn locator(&self) -> &WindowLocator {
        &self.locator
    }

    pub fn reader(&self) -> &ListViewReader {
        &self.reader
    }

    pub fn input(&self) -> &InputSynthesizer {
        &self.input
    }

    pub fn identity(&self) -> &RobotIdentity {
        &self.identity
    }

    pub fn username(&self) -> &str {
        self.identity.username()
    }

    /// Run an engine call on the blocking pool. Process scans and TCP
    /// connects can take seconds.
    async fn off_runtime<T, F>(&self, call: F) -> Result<T, RobotError>
    where
        F: FnOnce(&dyn AutomationEngine) -> T + Send + 'static,
        T: Send + 'static,
    {
        let engine = self.engine.clone();
        task::spawn_blocking(move || call(engine.as_ref()))
            .await
            .map_err(|e| RobotError::PlatformError(format!("engine task failed: {e}")))
    }

    pub async fn pid(&self) -> Option<u32> {
        let exe_name = self.identity.exe_name().to_string();
        match self.off_runtime(move |engine| engine.find_process(&exe_name)).await {
            Ok(pid) => pid,
            Err(e) => {
                error!(username = self.username(), "process lookup failed: {e}");
                None
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        self.pid().await.is_some()
    }

    pub async fn is_listening(&self) -> bool {
        let addr = self.identity.listen_addr().to_string();
        match self.off_runtime(move |engine| engine.is_reachable(&addr)).await {
            Ok(reachable) => reachable,
            Err(e) => {
                error!(username = self.username(), "listener check failed: {e}");
                false
            }
        }
    }

    pub fn main_window(&self) -> Option<WindowRef> {
        self.locator
            .find_top_level(MAIN_CLASS, self.identity.main_title())
    }

    pub fn login_dialog(&self) -> Option<WindowRef> {
        self.locator.find_top_level(LOGIN_CLASS, LOGIN_TITLE)
    }

    pub fn list_views(&self, main: &WindowRef) -> Vec<WindowRef> {
        self.locator
            .find_descendants(main, WindowFilter::class(LIST_VIEW_CLASS))
            .to_vec()
    }

    /// The second of exactly two list-views in the main window.
    pub fn session_view(&self, main: &WindowRef) -> Result<WindowRef, RobotError> {
        let mut views = self.list_views(main);
        if views.len() != 2 {
            return Err(RobotError::ListViewCount { found: views.len() });
        }
        Ok(views.swap_remove(SESSION_LIST_VIEW))
    }

    /// The session list-view shows the logged-in user in its first cell.
    pub fn is_logged_in(&self) -> bool {
        let Some(main) = self.main_window() else {
            return false;
        };
        match self.session_view(&main) {
            Ok(view) => self.reader.cell_text(&view, 0, 0) == self.username(),
            Err(e) => {
                error!(username = self.username(), "{e}");
                false
            }
        }
    }

    /// Dismiss dialogs of the client matching `dialog`.
    pub fn dismiss(&self, owner: &WindowRef, dialog: &DialogMatch) -> bool {
        self.locator.close_message_box(owner, dialog)
    }

    /// Raise the main window and let it settle before input is sent to it.
    pub async fn focus_main(&self, settle: Duration) -> Result<WindowRef, RobotError> {
        if !self.is_running().await {
            return Err(RobotError::ProcessNotAlive);
        }

        let main = self.wait_main_window().await?;
        self.locator.bring_to_front(&main);
        sleep(settle).await;
        Ok(main)
    }

    async fn wait_main_window(&self) -> Result<WindowRef, RobotError> {
        for attempt in 0..POLL_ATTEMPTS {
            if let Some(main) = self.main_window() {
                return Ok(main);
            }
            if !self.is_running().await {
                return Err(RobotError::ProcessNotAlive);
            }
            debug!(username = self.username(), attempt, "waiting for main window");
            sleep(POLL_INTERVAL).await;
        }
        Err(RobotError::MainWindowNotFound)
    }
}

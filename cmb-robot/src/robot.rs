use crate::client::{
    listener_started_notice, listener_stopped_notice, logout_confirmation, TargetClient,
    POLL_ATTEMPTS, POLL_INTERVAL,
};
use crate::config::{RobotIdentity, RobotSettings};
use crate::login::{LoginOutcome, LoginStateMachine};
use crate::platforms::AutomationEngine;
use crate::{DialogMatch, RobotError, RunMode};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Settle time after raising the main window before a chord.
pub const MAIN_WINDOW_SETTLE: Duration = Duration::from_secs(2);
/// Settle time before starting the login flow.
pub const LOGIN_SETTLE: Duration = Duration::from_secs(3);
/// Settle time after launching a fresh client.
pub const LAUNCH_SETTLE: Duration = Duration::from_secs(3);

/// Listener notices are dismissed this many times, once per second.
const NOTICE_DISMISS_ROUNDS: usize = 5;
const LOGOUT_CONFIRM_PAUSE: Duration = Duration::from_secs(2);

/// Consecutive process deaths tolerated inside one `run`.
pub const DEFAULT_MAX_LIVENESS_RESTARTS: usize = 10;

/// Drives one client installation back to listening and logged in.
pub struct Robot {
    client: TargetClient,
    max_liveness_restarts: usize,
}

impl Robot {
    pub fn new(engine: Arc<dyn AutomationEngine>, identity: RobotIdentity) -> Self {
        Self {
            client: TargetClient::new(engine, identity),
            max_liveness_restarts: DEFAULT_MAX_LIVENESS_RESTARTS,
        }
    }

    pub fn from_settings(
        engine: Arc<dyn AutomationEngine>,
        settings: &RobotSettings,
    ) -> Result<Self, RobotError> {
        Ok(Self::new(engine, RobotIdentity::from_settings(settings)?))
    }

    pub fn with_max_liveness_restarts(mut self, max: usize) -> Self {
        self.max_liveness_restarts = max;
        self
    }

    pub fn identity(&self) -> &RobotIdentity {
        self.client.identity()
    }

    pub fn client(&self) -> &TargetClient {
        &self.client
    }

    pub fn username(&self) -> &str {
        self.client.username()
    }

    pub async fn is_running(&self) -> bool {
        self.client.is_running().await
    }

    pub async fn is_listening(&self) -> bool {
        self.client.is_listening().await
    }

    pub fn is_logged_in(&self) -> bool {
        self.client.is_logged_in()
    }

    /// Start the client's HTTP listener. Returns whether it is listening
    /// afterwards; does nothing when it already is.
    pub async fn listen(&self) -> Result<bool, RobotError> {
        if self.is_listening().await {
            return Ok(true);
        }

        self.toggle_listener(b'B', &listener_started_notice()).await?;
        Ok(self.is_listening().await)
    }

    /// Stop the client's HTTP listener. Returns whether it is stopped
    /// afterwards; does nothing when it already is.
    pub async fn stop_listen(&self) -> Result<bool, RobotError> {
        if !self.is_listening().await {
            return Ok(true);
        }

        self.toggle_listener(b'E', &listener_stopped_notice()).await?;
        Ok(!self.is_listening().await)
    }

    async fn toggle_listener(&self, letter: u8, notice: &DialogMatch) -> Result<(), RobotError> {
        let main = self.client.focus_main(MAIN_WINDOW_SETTLE).await?;
        self.client.input().chord(letter).await;

        for _ in 0..NOTICE_DISMISS_ROUNDS {
            self.client.dismiss(&main, notice);
            sleep(POLL_INTERVAL).await;
        }
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), RobotError> {
        let main = self.client.focus_main(MAIN_WINDOW_SETTLE).await?;
        self.client.input().chord(b'O').await;

        for _ in 0..POLL_ATTEMPTS {
            if !self.client.dismiss(&main, &logout_confirmation()) {
                break;
            }
            debug!(username = self.username(), "confirmed logout");
            sleep(LOGOUT_CONFIRM_PAUSE).await;
        }
        Ok(())
    }

    pub async fn login(&self) -> Result<LoginOutcome, RobotError> {
        let main = self.client.focus_main(LOGIN_SETTLE).await?;
        LoginStateMachine::new(&self.client, main).run().await
    }

    /// Kill any running instance, wait for its window to go away, then
    /// launch a fresh one.
    pub async fn restart_process(&self) -> Result<(), RobotError> {
        if let Some(old_pid) = self.client.pid().await {
            debug!(username = self.username(), old_pid, "found running client");
            self.client.engine().kill_process(old_pid)?;

            for _ in 0..POLL_ATTEMPTS {
                if self.client.main_window().is_none() {
                    break;
                }
                debug!(username = self.username(), old_pid, "waiting for main window to close");
                sleep(POLL_INTERVAL).await;
            }
            debug!(username = self.username(), old_pid, "old client closed");
        }

        let pid = self.client.engine().launch(self.identity().path())?;
        sleep(LAUNCH_SETTLE).await;
        info!(username = self.username(), pid, "client started");
        Ok(())
    }

    /// Steps `run` will perform for `requested` given the current state.
    pub async fn effective_mode(&self, requested: RunMode) -> RunMode {
        let mut mode = requested;
        if !self.is_running().await {
            mode |= RunMode::RESTART;
        }
        if !self.is_listening().await {
            mode |= RunMode::RELISTEN;
        }
        mode
    }

    /// Bring the client back to listening and logged in. Returns the steps
    /// actually performed.
    ///
    /// When the client dies mid-run the whole run starts over with a
    /// freshly computed mode.
    #[instrument(skip(self), fields(username = %self.username()))]
    pub async fn run(&self, requested: RunMode) -> Result<RunMode, RobotError> {
        let mut restarts = 0;
        loop {
            match self.run_once(requested).await {
                Err(RobotError::ProcessNotAlive) => {
                    restarts += 1;
                    if restarts > self.max_liveness_restarts {
                        error!(restarts, "client keeps dying, giving up");
                        return Err(RobotError::ProcessUnstable { restarts });
                    }
                    warn!(restarts, "client died during recovery, starting over");
                }
                other => return other,
            }
        }
    }

    async fn run_once(&self, requested: RunMode) -> Result<RunMode, RobotError> {
        let mode = self.effective_mode(requested).await;
        info!(%mode, "running recovery");

        if mode.contains(RunMode::RESTART) {
            self.restart_process().await?;
        }

        if mode.contains(RunMode::RELISTEN) {
            if self.is_listening().await {
                self.stop_listen().await?;
            }
            if !self.listen().await? {
                error!("failed to start listener");
                return Err(RobotError::ListenFailure);
            }
        }

        if mode.contains(RunMode::RELOGIN) {
            if self.is_logged_in() {
                self.logout().await?;
            }
            let outcome = self.login().await?;
            info!(?outcome, "login finished");
        }

        Ok(mode)
    }
}

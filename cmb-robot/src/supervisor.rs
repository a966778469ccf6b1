//! The outer control loop: probe the gateway, count consecutive failures,
//! and drive a recovery once an anomaly is confirmed.

use crate::monitor::{HealthMonitor, ProbeOutcome};
use crate::{Robot, RobotError, RunMode};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

#[async_trait]
pub trait HealthProbe: Send {
    async fn probe(&mut self) -> ProbeOutcome;
}

#[async_trait]
pub trait Recovery: Send + Sync {
    /// Bring the client back; returns the steps performed.
    async fn recover(&self, mode: RunMode) -> Result<RunMode, RobotError>;
}

#[async_trait]
impl HealthProbe for HealthMonitor {
    async fn probe(&mut self) -> ProbeOutcome {
        HealthMonitor::probe(self).await
    }
}

#[async_trait]
impl Recovery for Robot {
    async fn recover(&self, mode: RunMode) -> Result<RunMode, RobotError> {
        self.run(mode).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Pause between healthy probes.
    pub poll_interval: Duration,
    /// Pause after each failed probe.
    pub failure_pause: Duration,
    /// Pause after every recovery attempt.
    pub recovery_cooldown: Duration,
    /// Consecutive failed probes that confirm an anomaly.
    pub failure_threshold: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            failure_pause: Duration::from_secs(10),
            recovery_cooldown: Duration::from_secs(30),
            failure_threshold: 3,
        }
    }
}

pub struct Supervisor<P, R> {
    probe: P,
    recovery: R,
    config: SupervisorConfig,
    username: String,
    failures: u32,
    mode: RunMode,
}

impl<P: HealthProbe, R: Recovery> Supervisor<P, R> {
    pub fn new(probe: P, recovery: R, config: SupervisorConfig) -> Self {
        Self {
            probe,
            recovery,
            config,
            username: String::new(),
            failures: 0,
            mode: RunMode::DEFAULT,
        }
    }

    /// Label attached to every log event.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Mode the next recovery will be asked to run.
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Supervise until a credential error makes further attempts unsafe.
    /// Returns that error; every other failure is retried forever.
    pub async fn run(&mut self) -> RobotError {
        info!(username = %self.username, "supervisor started");
        loop {
            if let Err(fatal) = self.tick().await {
                return fatal;
            }
        }
    }

    /// One probe, plus a recovery when it confirms an anomaly.
    pub async fn tick(&mut self) -> Result<(), RobotError> {
        let outcome = self.probe.probe().await;
        match outcome.connectivity {
            Ok(()) => {
                if self.failures > 0 {
                    info!(
                        username = %self.username,
                        failures = self.failures,
                        "gateway recovered on its own"
                    );
                }
                self.failures = 0;
                sleep(self.config.poll_interval).await;
                return Ok(());
            }
            Err(e) => {
                self.failures += 1;
                if self.failures == 1 {
                    warn!(username = %self.username, "gateway degraded: {e}");
                } else {
                    warn!(
                        username = %self.username,
                        failures = self.failures,
                        "gateway still degraded: {e}"
                    );
                }
                sleep(self.config.failure_pause).await;
            }
        }

        if self.failures < self.config.failure_threshold {
            sleep(self.config.poll_interval).await;
            return Ok(());
        }

        error!(
            username = %self.username,
            failures = self.failures,
            mode = %self.mode,
            "anomaly confirmed, recovering"
        );
        match self.recovery.recover(self.mode).await {
            Err(e) if e.is_credential_error() => {
                error!(username = %self.username, fatal = true, "{e}");
                return Err(e);
            }
            Err(e) => {
                error!(username = %self.username, fatal = e.is_fatal(), "recovery failed: {e}");
                self.mode = RunMode::FULL;
            }
            Ok(performed) => {
                info!(username = %self.username, mode = %performed, "recovery succeeded");
                self.mode = RunMode::DEFAULT;
            }
        }

        sleep(self.config.recovery_cooldown).await;
        self.failures = 0;
        Ok(())
    }
}

//! Supervisor failure counting, escalation and shutdown

use super::{identity, init_tracing, FakeDesktop, LoginScript};
use crate::monitor::ProbeOutcome;
use crate::{
    HealthProbe, MonitorError, Recovery, Robot, RobotError, RunMode, Supervisor, SupervisorConfig,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Replays scripted connectivity results, then stays healthy.
struct ScriptedProbe {
    script: VecDeque<bool>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    fn new(script: &[bool]) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = Self {
            script: script.iter().copied().collect(),
            calls: calls.clone(),
        };
        (probe, calls)
    }

    fn failing() -> (Self, Arc<AtomicUsize>) {
        Self::new(&[false; 64])
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn probe(&mut self) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let healthy = self.script.pop_front().unwrap_or(true);
        ProbeOutcome {
            connectivity: if healthy {
                Ok(())
            } else {
                Err(MonitorError::BadTxCount { count: 0 })
            },
            business: None,
        }
    }
}

/// Replays scripted recovery results and records the modes it was asked for.
#[derive(Clone, Default)]
struct ScriptedRecovery {
    results: Arc<Mutex<VecDeque<Result<RunMode, RobotError>>>>,
    modes: Arc<Mutex<Vec<RunMode>>>,
}

impl ScriptedRecovery {
    fn new(results: Vec<Result<RunMode, RobotError>>) -> Self {
        Self {
            results: Arc::new(Mutex::new(results.into())),
            modes: Arc::default(),
        }
    }

    fn modes(&self) -> Vec<RunMode> {
        self.modes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Recovery for ScriptedRecovery {
    async fn recover(&self, mode: RunMode) -> Result<RunMode, RobotError> {
        self.modes.lock().unwrap().push(mode);
        self.results.lock().unwrap().pop_front().unwrap_or(Ok(mode))
    }
}

#[tokio::test(start_paused = true)]
async fn test_three_failures_trigger_one_recovery() {
    init_tracing();
    let (probe, _) = ScriptedProbe::new(&[false, false, false]);
    let recovery = ScriptedRecovery::default();
    let mut supervisor = Supervisor::new(probe, recovery.clone(), SupervisorConfig::default());

    let started = Instant::now();
    for _ in 0..3 {
        supervisor.tick().await.unwrap();
    }

    assert_eq!(recovery.modes(), vec![RunMode::DEFAULT]);
    assert_eq!(supervisor.mode(), RunMode::DEFAULT);
    // 3 failure pauses, 2 polls in between, then the cooldown.
    assert_eq!(started.elapsed(), Duration::from_secs(3 * 10 + 2 + 30));

    // Counter was reset: two more failures are not enough.
    for _ in 0..2 {
        supervisor.tick().await.unwrap();
    }
    assert_eq!(recovery.modes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_success_resets_failure_count() {
    let (probe, calls) = ScriptedProbe::new(&[false, false, true, false, false, true]);
    let recovery = ScriptedRecovery::default();
    let mut supervisor = Supervisor::new(probe, recovery.clone(), SupervisorConfig::default());

    for _ in 0..6 {
        supervisor.tick().await.unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert!(recovery.modes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_recovery_escalates_to_full_restart() {
    init_tracing();
    let (probe, _) = ScriptedProbe::new(&[false; 9]);
    let recovery = ScriptedRecovery::new(vec![
        Err(RobotError::LoginTimeout),
        Err(RobotError::CrashWindow),
        Ok(RunMode::FULL),
    ]);
    let mut supervisor = Supervisor::new(probe, recovery.clone(), SupervisorConfig::default());

    for _ in 0..3 {
        supervisor.tick().await.unwrap();
    }
    assert_eq!(supervisor.mode(), RunMode::FULL);

    for _ in 0..3 {
        supervisor.tick().await.unwrap();
    }
    assert_eq!(supervisor.mode(), RunMode::FULL);

    for _ in 0..3 {
        supervisor.tick().await.unwrap();
    }
    assert_eq!(supervisor.mode(), RunMode::DEFAULT);
    assert_eq!(
        recovery.modes(),
        vec![RunMode::DEFAULT, RunMode::FULL, RunMode::FULL]
    );
}

#[tokio::test(start_paused = true)]
async fn test_credential_error_ends_supervision() {
    let (probe, calls) = ScriptedProbe::failing();
    let recovery = ScriptedRecovery::new(vec![
        Err(RobotError::NetworkError),
        Err(RobotError::WrongLoginPassword),
    ]);
    let mut supervisor = Supervisor::new(probe, recovery.clone(), SupervisorConfig::default())
        .with_username("ROBOT01");

    let fatal = supervisor.run().await;
    assert!(matches!(fatal, RobotError::WrongLoginPassword));
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(recovery.modes(), vec![RunMode::DEFAULT, RunMode::FULL]);
}

#[tokio::test(start_paused = true)]
async fn test_healthy_gateway_never_recovers() {
    let (probe, calls) = ScriptedProbe::new(&[]);
    let recovery = ScriptedRecovery::default();
    let mut supervisor = Supervisor::new(probe, recovery.clone(), SupervisorConfig::default());

    let result = tokio::time::timeout(Duration::from_secs(600), supervisor.run()).await;
    assert!(result.is_err(), "supervisor should still be running");
    assert!(calls.load(Ordering::SeqCst) >= 500);
    assert!(recovery.modes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_wrong_password_on_real_client_stops_supervisor() {
    init_tracing();
    let desktop = FakeDesktop::new().with(|s| {
        s.login_script = LoginScript::ErrorDialog("登录密码错，请重新输入".to_string());
    });
    let robot = Robot::new(desktop.engine(), identity());
    let (probe, calls) = ScriptedProbe::failing();
    let mut supervisor =
        Supervisor::new(probe, robot, SupervisorConfig::default()).with_username("ROBOT01");

    let fatal = supervisor.run().await;
    assert!(matches!(fatal, RobotError::WrongLoginPassword));
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let state = desktop.state();
    assert!(state.listening);
    assert!(!state.logged_in);
    assert_eq!(state.chords, vec!['B', 'I']);
}

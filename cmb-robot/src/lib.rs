//! Keeps the CMB direct-connect client logged in and listening
//!
//! The client has no programmatic interface, so this crate drives its GUI:
//! it finds windows by class and caption, types into security controls,
//! reads list-views living in the client's process, and restarts the
//! client when it dies. A gateway health monitor decides when that is
//! needed and a supervisor loop ties the two together.

pub mod client;
pub mod config;
pub mod errors;
pub mod input;
pub mod list_view;
pub mod locator;
pub mod login;
pub mod monitor;
pub mod platforms;
pub mod process;
pub mod robot;
pub mod run_mode;
pub mod supervisor;
#[cfg(test)]
mod tests;
pub mod types;

pub use client::TargetClient;
pub use config::{RobotIdentity, RobotSettings};
pub use errors::{MonitorError, RobotError};
pub use input::InputSynthesizer;
pub use list_view::ListViewReader;
pub use locator::{Descendants, WindowLocator};
pub use login::{LoginOutcome, LoginState, LoginStateMachine};
pub use monitor::{HealthMonitor, MonitorExpectation, ProbeOutcome};
pub use platforms::{create_engine, AutomationEngine};
pub use robot::Robot;
pub use run_mode::RunMode;
pub use supervisor::{HealthProbe, Recovery, Supervisor, SupervisorConfig};
pub use types::{DialogMatch, KeyCode, KeyEvent, WindowFilter, WindowRef};

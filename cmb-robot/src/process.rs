//! Process lookup and lifecycle for the supervised client.

use crate::RobotError;
use std::path::Path;
use std::process::Command;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::debug;

/// File name part of an executable path, accepting either separator.
pub fn exe_file_name(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

pub fn find_process_by_exe(exe_name: &str) -> Option<u32> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    system
        .processes()
        .iter()
        .find(|(_, process)| process.name().to_string_lossy().eq_ignore_ascii_case(exe_name))
        .map(|(pid, _)| pid.as_u32())
}

pub fn kill_process(pid: u32) -> Result<(), RobotError> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    match system.process(Pid::from_u32(pid)) {
        Some(process) => {
            if process.kill() {
                debug!(pid, "killed process");
                Ok(())
            } else {
                Err(RobotError::RestartFailure(format!(
                    "failed to kill process {pid}"
                )))
            }
        }
        // Already gone.
        None => Ok(()),
    }
}

/// Start `path` with its own directory as the working directory.
pub fn launch(path: &str) -> Result<u32, RobotError> {
    let mut command = Command::new(path);
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        command.current_dir(dir);
    }
    let child = command
        .spawn()
        .map_err(|e| RobotError::RestartFailure(format!("failed to start {path}: {e}")))?;
    Ok(child.id())
}

use crate::{KeyEvent, RobotError, WindowRef};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

const LISTENER_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// The raw OS primitives the robot needs from the desktop it drives.
///
/// Everything above this trait (locator, input, list-view reader, login
/// flow, orchestrator) is written against it, so a platform only has to
/// provide these calls.
pub trait AutomationEngine: Send + Sync {
    /// Top-level windows in native enumeration order.
    fn top_level_windows(&self) -> Vec<WindowRef>;

    /// Every descendant of `parent`, depth first, in native enumeration order.
    fn child_windows(&self, parent: &WindowRef) -> Vec<WindowRef>;

    /// Restore and raise a window. Best effort.
    fn bring_to_front(&self, window: &WindowRef);

    /// Send a focus notification to a control without raising its window.
    fn set_focus(&self, window: &WindowRef);

    /// Click a button and wait for the target to process it.
    fn press_button(&self, button: &WindowRef);

    /// Queue a click on a button without waiting.
    fn post_button_click(&self, button: &WindowRef);

    /// Ask a form to close itself through its Alt+X accelerator.
    fn post_close_chord(&self, window: &WindowRef);

    /// Inject a batch of keyboard events into whatever holds input focus.
    fn send_keys(&self, events: &[KeyEvent]);

    /// Number of rows currently held by a list-view control.
    fn list_view_item_count(&self, list_view: &WindowRef) -> usize;

    /// Read one cell of a list-view that lives in another process.
    fn read_list_view_text(
        &self,
        list_view: &WindowRef,
        row: usize,
        col: usize,
    ) -> Result<String, RobotError>;

    /// PID of the first process whose executable file name equals `exe_name`.
    fn find_process(&self, exe_name: &str) -> Option<u32>;

    fn kill_process(&self, pid: u32) -> Result<(), RobotError>;

    /// Start the executable detached from the robot and return its PID.
    fn launch(&self, path: &str) -> Result<u32, RobotError>;

    /// Whether something accepts TCP connections on `addr`.
    fn is_reachable(&self, addr: &str) -> bool {
        let addrs: Vec<SocketAddr> = match addr.to_socket_addrs() {
            Ok(addrs) => addrs.collect(),
            Err(_) => return false,
        };
        addrs
            .iter()
            .any(|a| TcpStream::connect_timeout(a, LISTENER_CONNECT_TIMEOUT).is_ok())
    }
}

#[cfg(target_os = "windows")]
pub mod windows;

/// Create the engine for the current platform
pub fn create_engine() -> Result<Arc<dyn AutomationEngine>, RobotError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(windows::WindowsEngine::new()))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(RobotError::UnsupportedPlatform(
            "the supervised client only runs on Windows".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    struct NoDesktop;

    impl AutomationEngine for NoDesktop {
        fn top_level_windows(&self) -> Vec<WindowRef> {
            Vec::new()
        }
        fn child_windows(&self, _parent: &WindowRef) -> Vec<WindowRef> {
            Vec::new()
        }
        fn bring_to_front(&self, _window: &WindowRef) {}
        fn set_focus(&self, _window: &WindowRef) {}
        fn press_button(&self, _button: &WindowRef) {}
        fn post_button_click(&self, _button: &WindowRef) {}
        fn post_close_chord(&self, _window: &WindowRef) {}
        fn send_keys(&self, _events: &[KeyEvent]) {}
        fn list_view_item_count(&self, _list_view: &WindowRef) -> usize {
            0
        }
        fn read_list_view_text(
            &self,
            _list_view: &WindowRef,
            _row: usize,
            _col: usize,
        ) -> Result<String, RobotError> {
            Ok(String::new())
        }
        fn find_process(&self, _exe_name: &str) -> Option<u32> {
            None
        }
        fn kill_process(&self, _pid: u32) -> Result<(), RobotError> {
            Ok(())
        }
        fn launch(&self, _path: &str) -> Result<u32, RobotError> {
            Ok(1)
        }
    }

    #[test]
    fn test_default_reachability_probe() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        assert!(NoDesktop.is_reachable(&addr));

        drop(listener);
        assert!(!NoDesktop.is_reachable("not an address"));
    }
}

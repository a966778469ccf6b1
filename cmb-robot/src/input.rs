use crate::platforms::AutomationEngine;
use crate::types::{KeyCode, KeyEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Hold time between pressing and releasing a chord.
pub const KEY_SETTLE: Duration = Duration::from_millis(100);

/// Emits hardware-level key chords into the focused window.
#[derive(Clone)]
pub struct InputSynthesizer {
    engine: Arc<dyn AutomationEngine>,
}

impl InputSynthesizer {
    pub fn new(engine: Arc<dyn AutomationEngine>) -> Self {
        Self { engine }
    }

    /// Press `keys` in order, hold, then release them in reverse order.
    ///
    /// Goes to whichever window holds focus; callers focus the target first.
    pub async fn tap(&self, keys: &[KeyCode]) {
        if keys.is_empty() {
            return;
        }
        let down: Vec<KeyEvent> = keys.iter().copied().map(KeyEvent::down).collect();
        self.engine.send_keys(&down);

        sleep(KEY_SETTLE).await;

        let up: Vec<KeyEvent> = keys.iter().rev().copied().map(KeyEvent::up).collect();
        self.engine.send_keys(&up);
    }

    /// Ctrl + letter.
    pub async fn chord(&self, letter: u8) {
        self.tap(&[KeyCode::CONTROL, KeyCode::letter(letter)]).await;
    }
}

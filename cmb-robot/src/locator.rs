use tracing::debug;

use crate::platforms::AutomationEngine;
use crate::types::{DialogMatch, WindowFilter, WindowRef};
use std::sync::Arc;

/// Resolves windows of the target application.
///
/// Absence is an empty result, never an error: the target shows and hides
/// its dialogs on its own schedule.
#[derive(Clone)]
pub struct WindowLocator {
    engine: Arc<dyn AutomationEngine>,
}

impl WindowLocator {
    pub fn new(engine: Arc<dyn AutomationEngine>) -> Self {
        Self { engine }
    }

    /// Single lookup by exact class and title.
    pub fn find_top_level(&self, class: &str, title: &str) -> Option<WindowRef> {
        self.engine
            .top_level_windows()
            .into_iter()
            .find(|w| w.class == class && w.text == title)
    }

    /// Descendants of `root` satisfying `filter`.
    ///
    /// Nothing is enumerated until the result is iterated, and every
    /// iteration walks the live window tree again.
    pub fn find_descendants(&self, root: &WindowRef, filter: WindowFilter) -> Descendants {
        Descendants {
            engine: self.engine.clone(),
            root: root.clone(),
            filter,
        }
    }

    pub fn bring_to_front(&self, window: &WindowRef) {
        self.engine.bring_to_front(window);
    }

    /// Find dialogs owned by `owner`'s process that match `dialog` and click
    /// their button. Returns whether any button was clicked.
    pub fn close_message_box(&self, owner: &WindowRef, dialog: &DialogMatch) -> bool {
        if owner.pid == 0 {
            return false;
        }

        let frames: Vec<WindowRef> = self
            .engine
            .top_level_windows()
            .into_iter()
            .filter(|w| dialog.matches_frame(w) && w.pid == owner.pid)
            .collect();

        let mut clicked = false;
        for frame in &frames {
            debug!(
                hwnd = frame.hwnd,
                title = %frame.text,
                class = %frame.class,
                "found message box"
            );

            let children = self.engine.child_windows(frame);
            let buttons: Vec<&WindowRef> = match dialog.button.as_deref() {
                Some(label) => children.iter().filter(|c| c.text == label).collect(),
                None => Vec::new(),
            };
            let content_found = match dialog.content.as_deref() {
                Some(needle) => children.iter().any(|c| c.text.contains(needle)),
                None => true,
            };

            self.engine.bring_to_front(frame);

            if !content_found {
                continue;
            }
            for button in buttons {
                debug!(
                    parent_hwnd = frame.hwnd,
                    hwnd = button.hwnd,
                    button = %button.text,
                    "clicking message box button"
                );
                self.engine.press_button(button);
                clicked = true;
            }
        }

        clicked
    }
}

/// Lazy, restartable view over a window's filtered descendants.
pub struct Descendants {
    engine: Arc<dyn AutomationEngine>,
    root: WindowRef,
    filter: WindowFilter,
}

impl Descendants {
    pub fn iter(&self) -> impl Iterator<Item = WindowRef> + '_ {
        self.engine
            .child_windows(&self.root)
            .into_iter()
            .filter(move |w| self.filter.matches(w))
    }

    pub fn first(&self) -> Option<WindowRef> {
        self.iter().next()
    }

    pub fn to_vec(&self) -> Vec<WindowRef> {
        self.iter().collect()
    }
}

impl std::fmt::Debug for Descendants {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Descendants")
            .field("root", &self.root)
            .field("filter", &self.filter)
            .finish()
    }
}

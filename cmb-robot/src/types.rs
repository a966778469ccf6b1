//! Plain data shared by the locator, input and list-view layers.

use std::fmt;

/// A window observed in the target application.
///
/// Only valid for the operation that produced it: dialogs come and go under
/// the target's control, so handles are re-resolved every time.
#[derive(Clone, PartialEq, Eq)]
pub struct WindowRef {
    pub hwnd: isize,
    pub class: String,
    /// Caption for top-level windows, control text for children.
    pub text: String,
    pub visible: bool,
    pub pid: u32,
}

impl fmt::Debug for WindowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowRef")
            .field("hwnd", &format_args!("{:#x}", self.hwnd))
            .field("class", &self.class)
            .field("text", &self.text)
            .finish()
    }
}

/// Predicate over window descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowFilter {
    Any,
    ClassEquals(String),
    ClassPrefix(String),
    TextEquals(String),
    TextContains(String),
    All(Vec<WindowFilter>),
}

impl WindowFilter {
    pub fn class(class: impl Into<String>) -> Self {
        WindowFilter::ClassEquals(class.into())
    }

    pub fn class_prefix(prefix: impl Into<String>) -> Self {
        WindowFilter::ClassPrefix(prefix.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        WindowFilter::TextEquals(text.into())
    }

    pub fn text_contains(needle: impl Into<String>) -> Self {
        WindowFilter::TextContains(needle.into())
    }

    pub fn and(self, other: WindowFilter) -> Self {
        match self {
            WindowFilter::All(mut filters) => {
                filters.push(other);
                WindowFilter::All(filters)
            }
            WindowFilter::Any => other,
            first => WindowFilter::All(vec![first, other]),
        }
    }

    pub fn matches(&self, window: &WindowRef) -> bool {
        match self {
            WindowFilter::Any => true,
            WindowFilter::ClassEquals(class) => window.class == *class,
            WindowFilter::ClassPrefix(prefix) => window.class.starts_with(prefix.as_str()),
            WindowFilter::TextEquals(text) => window.text == *text,
            WindowFilter::TextContains(needle) => window.text.contains(needle.as_str()),
            WindowFilter::All(filters) => filters.iter().all(|f| f.matches(window)),
        }
    }
}

/// Describes a modal dialog to detect and dismiss.
///
/// Structural match (class, title) first, then content: the dialog only
/// counts when one of its children contains `content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogMatch {
    pub class: String,
    /// `None` accepts any caption.
    pub title: Option<String>,
    pub button: Option<String>,
    pub content: Option<String>,
}

impl DialogMatch {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            title: None,
            button: None,
            content: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn button(mut self, label: impl Into<String>) -> Self {
        self.button = Some(label.into());
        self
    }

    pub fn content(mut self, needle: impl Into<String>) -> Self {
        self.content = Some(needle.into());
        self
    }

    /// Structural half of the match.
    pub fn matches_frame(&self, window: &WindowRef) -> bool {
        window.class == self.class
            && self
                .title
                .as_deref()
                .map_or(true, |title| window.text == title)
    }
}

/// Windows virtual-key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const CONTROL: KeyCode = KeyCode(0x11);

    /// Letters and digits share their virtual-key code with the ASCII code.
    pub const fn letter(c: u8) -> KeyCode {
        KeyCode(c.to_ascii_uppercase() as u16)
    }

    /// Key used to type one password character into a security control.
    /// The control consumes raw key codes, so the code unit is sent as-is.
    pub fn from_char(c: char) -> Option<KeyCode> {
        u16::try_from(c as u32).ok().map(KeyCode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: KeyCode,
    pub up: bool,
}

impl KeyEvent {
    pub fn down(key: KeyCode) -> Self {
        Self { key, up: false }
    }

    pub fn up(key: KeyCode) -> Self {
        Self { key, up: true }
    }
}

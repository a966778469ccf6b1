//! Win32 implementation of the automation engine
//!
//! Window lookup, messaging and keyboard injection go straight through the
//! `windows` crate; process management is shared with the rest of the crate
//! through `sysinfo`.

pub mod engine;
pub mod input;
pub mod remote;
pub mod types;

pub use engine::WindowsEngine;

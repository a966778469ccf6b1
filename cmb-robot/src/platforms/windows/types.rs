//! RAII wrappers and handle conversions for the Windows platform

use crate::RobotError;
use std::ffi::c_void;
use windows::Win32::Foundation::{CloseHandle, HANDLE, HWND, LPARAM, WPARAM};
use windows::Win32::System::Memory::{
    VirtualAllocEx, VirtualFreeEx, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE,
};
use windows::Win32::UI::WindowsAndMessaging::{SendMessageTimeoutW, SMTO_ABORTIFHUNG, SMTO_BLOCK};

/// Longest a window of the target gets to answer a sent message.
pub(crate) const MESSAGE_TIMEOUT_MS: u32 = 5_000;

/// RAII wrapper for Windows HANDLE that ensures proper cleanup
pub(crate) struct HandleGuard(pub(crate) HANDLE);

impl Drop for HandleGuard {
    fn drop(&mut self) {
        unsafe {
            if !self.0.is_invalid() {
                let _ = CloseHandle(self.0);
            }
        }
    }
}

/// Memory committed inside another process, released on drop.
///
/// Must be dropped before the process handle it was allocated through.
pub(crate) struct RemoteBuffer {
    process: HANDLE,
    ptr: *mut c_void,
    len: usize,
}

impl RemoteBuffer {
    pub(crate) fn alloc(process: &HandleGuard, len: usize) -> Result<Self, RobotError> {
        let ptr = unsafe {
            VirtualAllocEx(process.0, None, len, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE)
        };
        if ptr.is_null() {
            return Err(RobotError::PlatformError(format!(
                "VirtualAllocEx of {len} bytes failed: {}",
                windows::core::Error::from_win32()
            )));
        }
        Ok(Self {
            process: process.0,
            ptr,
            len,
        })
    }

    pub(crate) fn ptr(&self) -> *mut c_void {
        self.ptr
    }

    pub(crate) fn address(&self) -> u64 {
        self.ptr as usize as u64
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

impl Drop for RemoteBuffer {
    fn drop(&mut self) {
        unsafe {
            let _ = VirtualFreeEx(self.process, self.ptr, 0, MEM_RELEASE);
        }
    }
}

pub(crate) fn to_hwnd(raw: isize) -> HWND {
    HWND(raw as *mut c_void)
}

pub(crate) fn from_hwnd(hwnd: HWND) -> isize {
    hwnd.0 as isize
}

/// Send a message and wait for the reply, giving up on a hung or vanished
/// receiver. `None` means no answer.
pub(crate) fn send_message(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> Option<isize> {
    let mut result = 0usize;
    let answered = unsafe {
        SendMessageTimeoutW(
            hwnd,
            msg,
            wparam,
            lparam,
            SMTO_ABORTIFHUNG | SMTO_BLOCK,
            MESSAGE_TIMEOUT_MS,
            Some(&mut result as *mut usize),
        )
    };
    (answered.0 != 0).then_some(result as isize)
}
